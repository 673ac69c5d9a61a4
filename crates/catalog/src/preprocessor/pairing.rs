//! Dedup, row/column pairing, and the completeness metric (spec.md §4.3
//! "Pairing" / "Dedup" / "Completeness metric").

use super::strategy::{RawPrice, RawProduct};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub row: usize,
    pub column: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub value: Decimal,
    pub original: String,
    pub row: usize,
    pub column: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub product: ProductRecord,
    pub price: PriceRecord,
    pub confidence: f64,
}

/// Keeps the highest-confidence record per lowercase trimmed name.
pub fn dedup_products(products: Vec<RawProduct>) -> Vec<ProductRecord> {
    let mut best: HashMap<String, RawProduct> = HashMap::new();
    for p in products {
        let key = p.name.trim().to_lowercase();
        best.entry(key)
            .and_modify(|existing| {
                if p.confidence > existing.confidence {
                    *existing = p.clone();
                }
            })
            .or_insert(p);
    }
    best.into_values()
        .map(|p| ProductRecord { name: p.name, row: p.row, column: p.column, confidence: p.confidence })
        .collect()
}

/// Keeps the highest-confidence record per `row:column` key.
pub fn dedup_prices(prices: Vec<RawPrice>) -> Vec<PriceRecord> {
    let mut best: HashMap<(usize, usize), RawPrice> = HashMap::new();
    for p in prices {
        let key = (p.row, p.column);
        best.entry(key)
            .and_modify(|existing| {
                if p.confidence > existing.confidence {
                    *existing = p.clone();
                }
            })
            .or_insert(p);
    }
    best.into_values()
        .map(|p| PriceRecord { value: p.value, original: p.original, row: p.row, column: p.column, confidence: p.confidence })
        .collect()
}

/// For each product, picks the price on the same row with the nearest
/// column. Products with no same-row price remain unpaired.
pub fn pair_same_row_nearest_column(products: &[ProductRecord], prices: &[PriceRecord]) -> Vec<Pair> {
    let mut by_row: HashMap<usize, Vec<&PriceRecord>> = HashMap::new();
    for price in prices {
        by_row.entry(price.row).or_default().push(price);
    }

    let mut pairs = Vec::new();
    for product in products {
        if let Some(candidates) = by_row.get(&product.row) {
            if let Some(nearest) = candidates
                .iter()
                .min_by_key(|p| (p.column as i64 - product.column as i64).abs())
            {
                pairs.push(Pair {
                    product: product.clone(),
                    price: (*nearest).clone(),
                    confidence: product.confidence.min(nearest.confidence),
                });
            }
        }
    }
    pairs
}

/// `data_completeness = min(100, 100 * pairs/products + 2 * filled_gaps)`.
/// Each recovered gap counted exactly once (spec.md §9 open question
/// resolution — see DESIGN.md).
pub fn completeness(pairs: usize, products: usize, filled_gaps: usize) -> f64 {
    if products == 0 {
        return 0.0;
    }
    let base = 100.0 * pairs as f64 / products as f64;
    (base + 2.0 * filled_gaps as f64).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn raw_product(name: &str, row: usize, column: usize, confidence: f64) -> RawProduct {
        RawProduct { name: name.to_string(), row, column, confidence }
    }

    fn raw_price(value: i64, row: usize, column: usize, confidence: f64) -> RawPrice {
        RawPrice { value: Decimal::new(value, 0), original: value.to_string(), row, column, confidence }
    }

    #[test]
    fn dedup_products_keeps_higher_confidence() {
        let products = vec![raw_product("Rice 5kg", 0, 0, 0.7), raw_product("rice 5kg", 1, 0, 0.9)];
        let deduped = dedup_products(products);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence, 0.9);
    }

    #[test]
    fn dedup_prices_keyed_by_row_and_column() {
        let prices = vec![raw_price(100, 0, 1, 0.7), raw_price(110, 0, 1, 0.9)];
        let deduped = dedup_prices(prices);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence, 0.9);
    }

    #[test]
    fn pairing_picks_nearest_column_on_same_row() {
        let products = vec![ProductRecord { name: "Rice 5kg".to_string(), row: 0, column: 0, confidence: 0.8 }];
        let prices = vec![
            PriceRecord { value: Decimal::new(100, 0), original: "100".to_string(), row: 0, column: 5, confidence: 0.9 },
            PriceRecord { value: Decimal::new(200, 0), original: "200".to_string(), row: 0, column: 1, confidence: 0.9 },
        ];
        let pairs = pair_same_row_nearest_column(&products, &prices);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].price.column, 1);
    }

    #[test]
    fn completeness_is_capped_at_100() {
        assert_eq!(completeness(10, 10, 50), 100.0);
    }

    #[test]
    fn completeness_zero_products_is_zero() {
        assert_eq!(completeness(0, 0, 0), 0.0);
    }
}
