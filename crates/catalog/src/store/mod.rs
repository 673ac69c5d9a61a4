//! Catalog Store (C5): durable storage and query primitives. The contract
//! lives in the `CatalogStore` trait; `postgres` and `memory` provide a
//! production and a test-double implementation, the same split the teacher
//! uses for `ProductRepository`/`CustomerRepository`.

pub mod memory;
pub mod model;
pub mod postgres;

use crate::error::Result;
use crate::unit::UnitFamily;
use async_trait::async_trait;
use chrono::NaiveDate;
use model::{
    BulkImportReport, Category, MasterProduct, MatchType, PriceHistoryEntry, ProductAggregate,
    ProductMatch, PriceSource, Supplier, SupplierPrice,
};
use rust_decimal::Decimal;
use std::time::Duration;

/// Fields needed to create or locate a `MasterProduct` by
/// `(normalized_name, brand)` (spec.md §4.5 `upsert_master_product`).
#[derive(Debug, Clone)]
pub struct NewProductFields {
    pub standard_name: String,
    pub brand: Option<String>,
    pub category: String,
    pub size: Option<Decimal>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// One row of a supplier import batch (spec.md §4.4 `IngestBatch.products[]`
/// flattened to the Store's write shape).
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub fields: NewProductFields,
    pub original_name: String,
    pub price: Decimal,
    pub currency: String,
    pub price_date: NaiveDate,
    pub unit: String,
    pub min_order_qty: i32,
    pub confidence_score: f64,
    pub source: PriceSource,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert_master_product(&self, fields: NewProductFields) -> Result<String>;

    async fn record_supplier_price(
        &self,
        product_id: &str,
        supplier: &str,
        price: Decimal,
        original_name: &str,
        date: NaiveDate,
        confidence: f64,
    ) -> Result<String>;

    async fn bulk_import(
        &self,
        supplier: &str,
        records: Vec<IngestRecord>,
    ) -> Result<BulkImportReport>;

    async fn get_product(&self, id: &str) -> Result<Option<MasterProduct>>;

    async fn search_products(
        &self,
        term: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MasterProduct>>;

    async fn get_products_by_category(&self, category: &str, limit: usize) -> Result<Vec<MasterProduct>>;

    async fn get_current_prices(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<SupplierPrice>>;

    async fn get_best_price(&self, product_id: &str) -> Result<Option<SupplierPrice>>;

    async fn get_price_history(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<PriceHistoryEntry>>;

    async fn get_supplier_performance(&self, name: &str) -> Result<Option<Supplier>>;

    async fn list_suppliers(&self) -> Result<Vec<Supplier>>;

    async fn get_unified_catalog(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ProductAggregate>>;

    async fn get_unreviewed_matches(&self, limit: usize) -> Result<Vec<ProductMatch>>;

    async fn record_match(
        &self,
        a: &str,
        b: &str,
        score: f64,
        name_similarity: f64,
        brand_similarity: f64,
        size_similarity: f64,
        match_type: MatchType,
    ) -> Result<String>;

    async fn merge_products(&self, source_id: &str, target_id: &str) -> Result<()>;

    async fn ensure_category(&self, name: &str) -> Result<Category>;

    async fn unit_family_of(&self, product_id: &str) -> Result<Option<UnitFamily>>;
}
