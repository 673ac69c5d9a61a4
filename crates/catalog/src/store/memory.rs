//! In-memory `CatalogStore`, used by this crate's own tests and suitable
//! as a lightweight embedded mode. Mirrors the teacher's pattern of
//! exercising repository traits against a plain struct rather than a live
//! database in unit tests.

use super::model::{
    BulkImportReport, Category, HistoryReason, ImportError, MasterProduct, MatchType,
    PriceHistoryEntry, PriceSource, ProductAggregate, ProductMatch, ProductStatus, Supplier,
    SupplierPrice,
};
use super::{CatalogStore, IngestRecord, NewProductFields};
use crate::error::{CatalogError, Result};
use crate::unit::UnitFamily;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct State {
    products: HashMap<String, MasterProduct>,
    /// keyed by (product_id, supplier_name, price_date) for the uniqueness
    /// invariant in spec.md §3.
    prices: HashMap<(String, String, NaiveDate), SupplierPrice>,
    history: Vec<PriceHistoryEntry>,
    suppliers: HashMap<String, Supplier>,
    matches: HashMap<(String, String), ProductMatch>,
    categories: HashMap<String, Category>,
}

pub struct InMemoryCatalogStore {
    state: Mutex<State>,
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch_supplier(state: &mut State, name: &str) {
        let entry = state
            .suppliers
            .entry(name.to_string())
            .or_insert_with(|| Supplier {
                supplier_name: name.to_string(),
                status: "active".to_string(),
                reliability_score: 1.0,
                last_price_update: None,
            });
        entry.last_price_update = Some(Utc::now());
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn upsert_master_product(&self, fields: NewProductFields) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.products.values().find(|p| {
            p.standard_name == fields.standard_name && p.brand == fields.brand
        }) {
            return Ok(existing.product_id.clone());
        }

        state.categories.entry(fields.category.clone()).or_insert_with(|| Category {
            name: fields.category.clone(),
            created_at: Utc::now(),
        });

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        state.products.insert(
            id.clone(),
            MasterProduct {
                product_id: id.clone(),
                standard_name: fields.standard_name,
                brand: fields.brand,
                category: fields.category,
                size: fields.size,
                unit: fields.unit,
                description: fields.description,
                status: ProductStatus::Active,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn record_supplier_price(
        &self,
        product_id: &str,
        supplier: &str,
        price: Decimal,
        original_name: &str,
        date: NaiveDate,
        confidence: f64,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if !state.products.contains_key(product_id) {
            return Err(CatalogError::NotFound(format!("product {product_id}")));
        }

        let key = (product_id.to_string(), supplier.to_string(), date);
        let price_id = state
            .prices
            .get(&key)
            .map(|p| p.price_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let previous = state.prices.get(&key).cloned();
        let changed = previous.as_ref().map(|p| p.price != price).unwrap_or(true);

        if changed {
            let reason = if previous.is_some() {
                HistoryReason::PriceUpdate
            } else {
                HistoryReason::NewSupplier
            };
            state.history.push(PriceHistoryEntry {
                history_id: Uuid::new_v4().to_string(),
                product_id: product_id.to_string(),
                supplier_name: supplier.to_string(),
                old_price: previous.as_ref().map(|p| p.price),
                new_price: price,
                change_percentage: PriceHistoryEntry::compute_change_percentage(
                    previous.as_ref().map(|p| p.price),
                    price,
                ),
                change_date: Utc::now(),
                reason,
            });
        }

        state.prices.insert(
            key,
            SupplierPrice {
                price_id: price_id.clone(),
                product_id: product_id.to_string(),
                supplier_name: supplier.to_string(),
                original_name: original_name.to_string(),
                price,
                currency: "IDR".to_string(),
                price_date: date,
                unit: previous.map(|p| p.unit).unwrap_or_default(),
                min_order_qty: 1,
                confidence_score: confidence,
                source: PriceSource::Manual,
                last_seen: Utc::now(),
            },
        );
        Self::touch_supplier(&mut state, supplier);

        Ok(price_id)
    }

    async fn bulk_import(
        &self,
        supplier: &str,
        records: Vec<IngestRecord>,
    ) -> Result<BulkImportReport> {
        let mut report = BulkImportReport::default();

        for record in records {
            if record.fields.standard_name.trim().is_empty() || record.price <= Decimal::ZERO {
                report.errors.push(ImportError {
                    original_name: record.original_name.clone(),
                    reason: "empty name or non-positive price".to_string(),
                });
                continue;
            }

            let existed_before = {
                let state = self.state.lock().unwrap();
                state.products.values().any(|p| {
                    p.standard_name == record.fields.standard_name && p.brand == record.fields.brand
                })
            };

            let product_id = match self.upsert_master_product(record.fields.clone()).await {
                Ok(id) => id,
                Err(e) => {
                    report.errors.push(ImportError {
                        original_name: record.original_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if existed_before {
                report.updated += 1;
            } else {
                report.created += 1;
            }

            match self
                .record_supplier_price(
                    &product_id,
                    supplier,
                    record.price,
                    &record.original_name,
                    record.price_date,
                    record.confidence_score,
                )
                .await
            {
                Ok(_) => {
                    report.added_prices += 1;
                    let mut state = self.state.lock().unwrap();
                    let key = (product_id.clone(), supplier.to_string(), record.price_date);
                    if let Some(p) = state.prices.get_mut(&key) {
                        p.unit = record.unit.clone();
                        p.currency = record.currency.clone();
                        p.min_order_qty = record.min_order_qty;
                        p.source = record.source;
                    }
                }
                Err(e) => report.errors.push(ImportError {
                    original_name: record.original_name.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }

    async fn get_product(&self, id: &str) -> Result<Option<MasterProduct>> {
        Ok(self.state.lock().unwrap().products.get(id).cloned())
    }

    async fn search_products(
        &self,
        term: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MasterProduct>> {
        let term = term.to_lowercase();
        let state = self.state.lock().unwrap();
        let mut results: Vec<MasterProduct> = state
            .products
            .values()
            .filter(|p| category.map(|c| p.category == c).unwrap_or(true))
            .filter(|p| p.standard_name.to_lowercase().contains(&term))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.standard_name.cmp(&b.standard_name));
        results.truncate(limit);
        Ok(results)
    }

    async fn get_products_by_category(&self, category: &str, limit: usize) -> Result<Vec<MasterProduct>> {
        let state = self.state.lock().unwrap();
        let mut results: Vec<MasterProduct> = state
            .products
            .values()
            .filter(|p| p.category == category && p.is_active())
            .cloned()
            .collect();
        results.truncate(limit);
        Ok(results)
    }

    async fn get_current_prices(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<SupplierPrice>> {
        let cutoff = (Utc::now() - chrono::Duration::from_std(window).unwrap_or_default()).date_naive();
        let state = self.state.lock().unwrap();
        let mut prices: Vec<SupplierPrice> = state
            .prices
            .values()
            .filter(|p| p.product_id == product_id && p.price_date >= cutoff)
            .cloned()
            .collect();
        prices.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(prices)
    }

    async fn get_best_price(&self, product_id: &str) -> Result<Option<SupplierPrice>> {
        Ok(self
            .get_current_prices(product_id, Duration::from_secs(30 * 24 * 3600))
            .await?
            .into_iter()
            .min_by(|a, b| a.price.cmp(&b.price)))
    }

    async fn get_price_history(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<PriceHistoryEntry>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .iter()
            .filter(|h| h.product_id == product_id && h.change_date >= cutoff)
            .cloned()
            .collect())
    }

    async fn get_supplier_performance(&self, name: &str) -> Result<Option<Supplier>> {
        Ok(self.state.lock().unwrap().suppliers.get(name).cloned())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.state.lock().unwrap().suppliers.values().cloned().collect())
    }

    async fn get_unified_catalog(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ProductAggregate>> {
        let products: Vec<MasterProduct> = {
            let state = self.state.lock().unwrap();
            let mut products: Vec<MasterProduct> = state
                .products
                .values()
                .filter(|p| p.is_active() && category.map_or(true, |cat| p.category == cat))
                .cloned()
                .collect();
            products.truncate(limit);
            products
        };

        let mut aggregates = Vec::with_capacity(products.len());
        for product in products {
            // Default 30-day aggregate window (spec.md §4.5), matching
            // the Postgres store rather than scanning all stored prices.
            let prices = self
                .get_current_prices(&product.product_id, Duration::from_secs(30 * 24 * 3600))
                .await?;
            if prices.is_empty() {
                continue;
            }
            let best = prices.iter().min_by(|a, b| a.price.cmp(&b.price)).unwrap();
            let worst = prices.iter().max_by(|a, b| a.price.cmp(&b.price)).unwrap();
            let suppliers_count = prices
                .iter()
                .map(|p| p.supplier_name.clone())
                .collect::<std::collections::HashSet<_>>()
                .len() as i64;

            aggregates.push(ProductAggregate {
                product,
                best_price: best.price,
                worst_price: worst.price,
                best_supplier: best.supplier_name.clone(),
                suppliers_count,
            });
        }

        Ok(aggregates)
    }

    async fn get_unreviewed_matches(&self, limit: usize) -> Result<Vec<ProductMatch>> {
        let state = self.state.lock().unwrap();
        let mut matches: Vec<ProductMatch> = state
            .matches
            .values()
            .filter(|m| !m.reviewed && !matches!(m.match_type, MatchType::Rejected))
            .cloned()
            .collect();
        matches.truncate(limit);
        Ok(matches)
    }

    async fn record_match(
        &self,
        a: &str,
        b: &str,
        score: f64,
        name_similarity: f64,
        brand_similarity: f64,
        size_similarity: f64,
        match_type: MatchType,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let (ca, cb) = ProductMatch::canonical_pair(a, b);
        let key = (ca.clone(), cb.clone());
        let id = state
            .matches
            .get(&key)
            .map(|m| m.match_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        state.matches.insert(
            key,
            ProductMatch {
                match_id: id.clone(),
                product_a_id: ca,
                product_b_id: cb,
                similarity_score: score,
                name_similarity,
                brand_similarity,
                size_similarity,
                match_type,
                reviewed: false,
                approved: false,
                reviewer: None,
                reviewed_at: None,
            },
        );
        Ok(id)
    }

    async fn merge_products(&self, source_id: &str, target_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        let source_status = state
            .products
            .get(source_id)
            .map(|p| p.status)
            .ok_or_else(|| CatalogError::NotFound(format!("product {source_id}")))?;

        if matches!(source_status, ProductStatus::Merged) {
            return Err(CatalogError::MergeConflict(format!(
                "{source_id} has already been merged"
            )));
        }

        if !state.products.contains_key(target_id) {
            return Err(CatalogError::NotFound(format!("product {target_id}")));
        }

        let moved_keys: Vec<_> = state
            .prices
            .keys()
            .filter(|(pid, _, _)| pid == source_id)
            .cloned()
            .collect();

        for key in moved_keys {
            if let Some(mut price) = state.prices.remove(&key) {
                price.product_id = target_id.to_string();
                let new_key = (target_id.to_string(), key.1, key.2);
                state.prices.insert(new_key, price);
            }
        }

        for entry in state.history.iter_mut().filter(|h| h.product_id == source_id) {
            entry.product_id = target_id.to_string();
        }

        if let Some(product) = state.products.get_mut(source_id) {
            product.status = ProductStatus::Merged;
            product.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn ensure_category(&self, name: &str) -> Result<Category> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .categories
            .entry(name.to_string())
            .or_insert_with(|| Category {
                name: name.to_string(),
                created_at: Utc::now(),
            })
            .clone();
        Ok(entry)
    }

    async fn unit_family_of(&self, product_id: &str) -> Result<Option<UnitFamily>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .get(product_id)
            .and_then(|p| p.unit.as_deref())
            .and_then(|unit| {
                crate::unit::classify(unit, &crate::unit::default_unit_conversions())
                    .ok()
                    .map(|(fam, _)| fam)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str) -> NewProductFields {
        NewProductFields {
            standard_name: name.to_string(),
            brand: None,
            category: "general".to_string(),
            size: None,
            unit: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_name_and_brand() {
        let store = InMemoryCatalogStore::new();
        let id1 = store.upsert_master_product(fields("Rice")).await.unwrap();
        let id2 = store.upsert_master_product(fields("Rice")).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn merge_reparents_prices_and_marks_source_merged() {
        let store = InMemoryCatalogStore::new();
        let source = store.upsert_master_product(fields("Rice 5kg")).await.unwrap();
        let target = store.upsert_master_product(fields("Beras 5kg")).await.unwrap();

        store
            .record_supplier_price(
                &source,
                "supplier-a",
                Decimal::new(100_000, 0),
                "Rice 5kg",
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                0.9,
            )
            .await
            .unwrap();

        store.merge_products(&source, &target).await.unwrap();

        let prices = store
            .get_current_prices(&target, Duration::from_secs(3600 * 24 * 365))
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);

        let source_product = store.get_product(&source).await.unwrap().unwrap();
        assert_eq!(source_product.status, ProductStatus::Merged);
    }

    #[tokio::test]
    async fn merging_already_merged_product_is_conflict() {
        let store = InMemoryCatalogStore::new();
        let source = store.upsert_master_product(fields("A")).await.unwrap();
        let target = store.upsert_master_product(fields("B")).await.unwrap();
        let other = store.upsert_master_product(fields("C")).await.unwrap();

        store.merge_products(&source, &target).await.unwrap();
        let err = store.merge_products(&source, &other).await.unwrap_err();
        assert!(matches!(err, CatalogError::MergeConflict(_)));
    }

    #[tokio::test]
    async fn record_match_is_order_independent() {
        let store = InMemoryCatalogStore::new();
        let a = store.upsert_master_product(fields("A")).await.unwrap();
        let b = store.upsert_master_product(fields("B")).await.unwrap();

        let id1 = store
            .record_match(&a, &b, 0.9, 0.9, 1.0, 1.0, MatchType::Fuzzy)
            .await
            .unwrap();
        let id2 = store
            .record_match(&b, &a, 0.9, 0.9, 1.0, 1.0, MatchType::Fuzzy)
            .await
            .unwrap();
        assert_eq!(id1, id2);
    }
}
