//! Data Adapter (C4): converts preprocessor output into canonical ingest
//! records ready for the Catalog Store (spec.md §4.4).

use crate::config::EngineConfig;
use crate::normalize::{extract_size, normalize_name};
use crate::preprocessor::pairing::{Pair, ProductRecord};
use crate::preprocessor::PreprocessResult;
use crate::store::model::PriceSource;
use crate::store::{IngestRecord, NewProductFields};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `{original, final, success_rate}` per-batch stats (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStats {
    pub original: usize,
    pub final_count: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub supplier: String,
    pub records: Vec<IngestRecord>,
    pub quality: AdapterStats,
}

/// Closed category keyword table (original_source domain vocabulary plus
/// spec.md §4.4's examples). Default category is `general`.
const CATEGORY_KEYWORDS: &[(&[&str], &str)] = &[
    (&["cola", "juice", "water", "beer", "soda", "soft drink"], "beverages"),
    (&["rice", "wheat", "oats", "flour"], "rice_grains"),
    (&["noodle", "pasta", "spaghetti", "mie"], "pasta_noodles"),
    (&["oil", "minyak", "butter", "margarine"], "cooking_oil"),
    (&["soap", "shampoo", "detergent", "sabun"], "household"),
    (&["milk", "cheese", "yogurt", "susu"], "dairy"),
];

fn classify_category(normalized_name: &str) -> String {
    for (keywords, category) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| normalized_name.contains(kw)) {
            return category.to_string();
        }
    }
    "general".to_string()
}

/// Converts a pair (or orphan product when no price was paired with it)
/// into a canonical ingest record.
fn adapt_one(
    raw_name: &str,
    price: Option<Decimal>,
    config: &EngineConfig,
    price_date: NaiveDate,
) -> Option<IngestRecord> {
    let (size, name_without_size) = extract_size(raw_name);

    // Map the extracted unit through C1's closed conversion table; an
    // unrecognized token is a soft failure (spec.md §7 `UnknownUnit`) that
    // nulls out size and unit together rather than persisting an
    // unrecognized unit alongside a size (spec.md §3 MasterProduct invariant).
    let (size_value, raw_unit) = match size {
        Some((value, unit)) => {
            if crate::unit::classify(&unit, &config.unit_base_conversions).is_ok() {
                (Some(value), Some(unit))
            } else {
                (None, None)
            }
        }
        None => (None, None),
    };

    let standard_name = normalize_name(&name_without_size, &config.stop_words);
    if standard_name.is_empty() {
        return None;
    }

    let price = price?;
    if price <= Decimal::ZERO {
        return None;
    }

    // The preprocessor has no dedicated brand column; brand resolution
    // happens later, against the normalized name, when matching runs.
    let brand: Option<String> = None;
    let category = classify_category(&standard_name);

    let unit = raw_unit.unwrap_or_default();

    Some(IngestRecord {
        fields: NewProductFields {
            standard_name,
            brand,
            category,
            size: size_value,
            unit: if unit.is_empty() { None } else { Some(unit.clone()) },
            description: None,
        },
        original_name: raw_name.to_string(),
        price,
        currency: "IDR".to_string(),
        price_date,
        unit,
        min_order_qty: 1,
        confidence_score: 1.0,
        source: PriceSource::Spreadsheet,
    })
}

fn adapt_pair(pair: &Pair, config: &EngineConfig, price_date: NaiveDate) -> Option<IngestRecord> {
    adapt_one(&pair.product.name, Some(pair.price.value), config, price_date)
        .map(|mut record| {
            record.confidence_score = pair.confidence;
            record
        })
}

fn adapt_orphan(product: &ProductRecord, config: &EngineConfig, price_date: NaiveDate) -> Option<IngestRecord> {
    // Orphan products carry no price; spec.md §4.4 rejects non-positive
    // prices, so an orphan with no paired price is always dropped. This
    // function exists to document that decision at the call site rather
    // than silently skip it in `adapt`.
    let _ = (product, config, price_date);
    None
}

/// Entry point: consumes a `PreprocessResult` and emits an `IngestBatch`
/// (spec.md §4.4).
pub fn adapt(
    result: &PreprocessResult,
    supplier: &str,
    config: &EngineConfig,
    price_date: NaiveDate,
) -> IngestBatch {
    let original = result.products.len();
    let mut records = Vec::new();

    let paired_rows: std::collections::HashSet<(usize, usize)> =
        result.pairs.iter().map(|p| (p.product.row, p.product.column)).collect();

    for pair in &result.pairs {
        if let Some(record) = adapt_pair(pair, config, price_date) {
            records.push(record);
        }
    }

    for product in &result.products {
        if paired_rows.contains(&(product.row, product.column)) {
            continue;
        }
        if let Some(record) = adapt_orphan(product, config, price_date) {
            records.push(record);
        }
    }

    let final_count = records.len();
    let success_rate = if original == 0 { 0.0 } else { final_count as f64 / original as f64 };

    debug!(supplier, original, final_count, success_rate, "adapter finished");

    IngestBatch {
        supplier: supplier.to_string(),
        records,
        quality: AdapterStats { original, final_count, success_rate },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::pairing::{Pair, PriceRecord, ProductRecord};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn sample_result() -> PreprocessResult {
        PreprocessResult {
            products: vec![ProductRecord { name: "Rice 5kg".to_string(), row: 0, column: 0, confidence: 0.8 }],
            prices: vec![PriceRecord { value: Decimal::new(100000, 0), original: "100000".to_string(), row: 0, column: 1, confidence: 0.9 }],
            pairs: vec![Pair {
                product: ProductRecord { name: "Rice 5kg".to_string(), row: 0, column: 0, confidence: 0.8 },
                price: PriceRecord { value: Decimal::new(100000, 0), original: "100000".to_string(), row: 0, column: 1, confidence: 0.9 },
                confidence: 0.8,
            }],
            strategy: crate::preprocessor::strategy::Strategy::AdaptiveScan,
            recovery_stats: crate::preprocessor::RecoveryStats { data_completeness: 100.0, filled_gaps: 0, sheets_scanned: 1 },
            error: None,
        }
    }

    #[test]
    fn adapt_extracts_size_and_classifies_category() {
        let batch = adapt(&sample_result(), "Supplier A", &EngineConfig::default(), date());
        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.fields.standard_name, "rice");
        assert_eq!(record.fields.category, "rice_grains");
        assert_eq!(record.fields.size, Some(Decimal::new(5, 0)));
        assert_eq!(record.fields.unit.as_deref(), Some("kg"));
        assert_eq!(batch.quality.success_rate, 1.0);
    }

    #[test]
    fn adapt_rejects_non_positive_price() {
        let mut result = sample_result();
        result.pairs[0].price.value = Decimal::ZERO;
        let batch = adapt(&result, "Supplier A", &EngineConfig::default(), date());
        assert!(batch.records.is_empty());
        assert_eq!(batch.quality.success_rate, 0.0);
    }

    #[test]
    fn unknown_category_defaults_to_general() {
        let mut result = sample_result();
        result.products[0].name = "Widget 5kg".to_string();
        result.pairs[0].product.name = "Widget 5kg".to_string();
        let batch = adapt(&result, "Supplier A", &EngineConfig::default(), date());
        assert_eq!(batch.records[0].fields.category, "general");
    }

    #[test]
    fn unrecognized_unit_nulls_out_size_and_unit() {
        let mut result = sample_result();
        result.products[0].name = "Rice 5xyz".to_string();
        result.pairs[0].product.name = "Rice 5xyz".to_string();
        let batch = adapt(&result, "Supplier A", &EngineConfig::default(), date());
        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.fields.size, None);
        assert_eq!(record.fields.unit, None);
    }
}
