//! Catalog Store data model (spec.md §3). All entities are `sqlx::FromRow`
//! + serde, following the teacher's `product::model`/`supplier::model`
//! convention of plain structs with a handful of constructors and derived
//! predicates.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Merged,
    Deprecated,
}

impl Default for ProductStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "price_source", rename_all = "snake_case")]
pub enum PriceSource {
    Spreadsheet,
    Pdf,
    Manual,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "history_reason", rename_all = "snake_case")]
pub enum HistoryReason {
    NewSupplier,
    PriceUpdate,
    Correction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Rejected,
}

/// A canonical SKU (spec.md §3 `MasterProduct`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MasterProduct {
    pub product_id: String,
    pub standard_name: String,
    pub brand: Option<String>,
    pub category: String,
    pub size: Option<Decimal>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterProduct {
    pub fn is_active(&self) -> bool {
        matches!(self.status, ProductStatus::Active)
    }
}

/// A single price observation (spec.md §3 `SupplierPrice`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierPrice {
    pub price_id: String,
    pub product_id: String,
    pub supplier_name: String,
    pub original_name: String,
    pub price: Decimal,
    pub currency: String,
    pub price_date: NaiveDate,
    pub unit: String,
    pub min_order_qty: i32,
    pub confidence_score: f64,
    pub source: PriceSource,
    pub last_seen: DateTime<Utc>,
}

/// Append-only price change log (spec.md §3 `PriceHistory`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceHistoryEntry {
    pub history_id: String,
    pub product_id: String,
    pub supplier_name: String,
    pub old_price: Option<Decimal>,
    pub new_price: Decimal,
    pub change_percentage: Option<f64>,
    pub change_date: DateTime<Utc>,
    pub reason: HistoryReason,
}

impl PriceHistoryEntry {
    pub fn compute_change_percentage(old_price: Option<Decimal>, new_price: Decimal) -> Option<f64> {
        let old = old_price?;
        if old.is_zero() {
            return None;
        }
        let change = (new_price - old) / old * Decimal::ONE_HUNDRED;
        change.to_string().parse::<f64>().ok()
    }
}

/// Aggregate per data source (spec.md §3 `Supplier`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub supplier_name: String,
    pub status: String,
    pub reliability_score: f64,
    pub last_price_update: Option<DateTime<Utc>>,
}

/// Pairwise equivalence candidate (spec.md §3 `ProductMatch`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductMatch {
    pub match_id: String,
    pub product_a_id: String,
    pub product_b_id: String,
    pub similarity_score: f64,
    pub name_similarity: f64,
    pub brand_similarity: f64,
    pub size_similarity: f64,
    pub match_type: MatchType,
    pub reviewed: bool,
    pub approved: bool,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ProductMatch {
    /// Orders `(a, b)` so the pair is stored canonicalized regardless of
    /// call order (spec.md §3 invariant, §8 `record_match(a,b) = record_match(b,a)`).
    pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

/// Tag dictionary entry; auto-created on first use.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Documented shape only (spec.md §6 "Migration artifacts"); no operation
/// in this crate produces one — that belongs to the excluded
/// migration-orchestration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps: MigrationSteps,
    pub summary: MigrationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSteps {
    pub init: bool,
    pub backup: bool,
    pub validation: bool,
    pub main: bool,
    pub post_validation: bool,
    pub report: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub files_processed: u64,
    pub products_migrated: u64,
    pub duplicates_found: u64,
    pub duration_seconds: f64,
}

/// Per-product aggregate used by `get_unified_catalog` (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub product: MasterProduct,
    pub best_price: Decimal,
    pub worst_price: Decimal,
    pub best_supplier: String,
    pub suppliers_count: i64,
}

/// Result of `bulk_import` (spec.md §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkImportReport {
    pub created: u64,
    pub updated: u64,
    pub added_prices: u64,
    pub errors: Vec<ImportError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    pub original_name: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        let (a1, b1) = ProductMatch::canonical_pair("p2", "p1");
        let (a2, b2) = ProductMatch::canonical_pair("p1", "p2");
        assert_eq!((a1, b1), (a2, b2));
    }

    #[test]
    fn change_percentage_none_for_first_observation() {
        assert_eq!(
            PriceHistoryEntry::compute_change_percentage(None, Decimal::new(100, 0)),
            None
        );
    }

    #[test]
    fn change_percentage_computes_relative_delta() {
        let pct = PriceHistoryEntry::compute_change_percentage(
            Some(Decimal::new(100, 0)),
            Decimal::new(110, 0),
        )
        .unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }
}
