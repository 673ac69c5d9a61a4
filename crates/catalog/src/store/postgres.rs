//! PostgreSQL-backed `CatalogStore`. Single schema (no tenant
//! partitioning, unlike the teacher's product/supplier repositories) with
//! transactional writes via `pool.begin()`, matching spec.md §4.5's
//! "every write op runs in a single transaction with rollback on error".

use super::model::{
    BulkImportReport, Category, HistoryReason, ImportError, MasterProduct, MatchType,
    PriceHistoryEntry, PriceSource, ProductAggregate, ProductMatch, ProductStatus, Supplier,
    SupplierPrice,
};
use super::{CatalogStore, IngestRecord, NewProductFields};
use crate::error::{CatalogError, Result};
use crate::unit::UnitFamily;
use async_trait::async_trait;
use catalog_core::DatabasePool;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct PostgresCatalogStore {
    db: DatabasePool,
}

impl PostgresCatalogStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn upsert_master_product(&self, fields: NewProductFields) -> Result<String> {
        let mut tx = self.pool().begin().await?;

        self.ensure_category(&fields.category).await?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT product_id FROM master_products WHERE standard_name = $1 AND brand IS NOT DISTINCT FROM $2",
        )
        .bind(&fields.standard_name)
        .bind(&fields.brand)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((id,)) = existing {
            tx.commit().await?;
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO master_products
                (product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, $8)
            "#,
        )
        .bind(&id)
        .bind(&fields.standard_name)
        .bind(&fields.brand)
        .bind(&fields.category)
        .bind(fields.size)
        .bind(&fields.unit)
        .bind(&fields.description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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
        let mut tx = self.pool().begin().await?;

        let existing: Option<(String, Decimal, String)> = sqlx::query_as(
            "SELECT price_id, price, unit FROM supplier_prices WHERE product_id = $1 AND supplier_name = $2 AND price_date = $3",
        )
        .bind(product_id)
        .bind(supplier)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

        let (price_id, unit, old_price) = match &existing {
            Some((id, old, unit)) => (id.clone(), unit.clone(), Some(*old)),
            None => (Uuid::new_v4().to_string(), String::new(), None),
        };

        let changed = old_price.map(|old| old != price).unwrap_or(true);

        if changed {
            let reason = if old_price.is_some() {
                HistoryReason::PriceUpdate
            } else {
                HistoryReason::NewSupplier
            };
            let change_pct = PriceHistoryEntry::compute_change_percentage(old_price, price);

            sqlx::query(
                r#"
                INSERT INTO price_history
                    (history_id, product_id, supplier_name, old_price, new_price, change_percentage, change_date, reason)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(product_id)
            .bind(supplier)
            .bind(old_price)
            .bind(price)
            .bind(change_pct)
            .bind(Utc::now())
            .bind(reason)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO supplier_prices
                (price_id, product_id, supplier_name, original_name, price, currency, price_date, unit, min_order_qty, confidence_score, source, last_seen)
            VALUES ($1, $2, $3, $4, $5, 'IDR', $6, $7, 1, $8, 'manual', $9)
            ON CONFLICT (product_id, supplier_name, price_date)
            DO UPDATE SET price = EXCLUDED.price, original_name = EXCLUDED.original_name,
                confidence_score = EXCLUDED.confidence_score, last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&price_id)
        .bind(product_id)
        .bind(supplier)
        .bind(original_name)
        .bind(price)
        .bind(date)
        .bind(&unit)
        .bind(confidence)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO suppliers (supplier_name, status, reliability_score, last_price_update)
            VALUES ($1, 'active', 1.0, $2)
            ON CONFLICT (supplier_name) DO UPDATE SET last_price_update = EXCLUDED.last_price_update
            "#,
        )
        .bind(supplier)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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

            let pre_existing = self
                .get_product_by_name_brand(&record.fields.standard_name, record.fields.brand.as_deref())
                .await?
                .is_some();

            let product_id = match self.upsert_master_product(record.fields.clone()).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "failed to upsert product during bulk import");
                    report.errors.push(ImportError {
                        original_name: record.original_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if pre_existing {
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
                    let _ = sqlx::query(
                        "UPDATE supplier_prices SET unit = $1, currency = $2, min_order_qty = $3, source = $4 WHERE product_id = $5 AND supplier_name = $6 AND price_date = $7",
                    )
                    .bind(&record.unit)
                    .bind(&record.currency)
                    .bind(record.min_order_qty)
                    .bind(record.source)
                    .bind(&product_id)
                    .bind(supplier)
                    .bind(record.price_date)
                    .execute(self.pool())
                    .await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to record supplier price during bulk import");
                    report.errors.push(ImportError {
                        original_name: record.original_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(supplier, created = report.created, updated = report.updated, errors = report.errors.len(), "bulk import complete");
        Ok(report)
    }

    async fn get_product(&self, id: &str) -> Result<Option<MasterProduct>> {
        let product = sqlx::query_as::<_, MasterProduct>(
            "SELECT product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at FROM master_products WHERE product_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(product)
    }

    async fn search_products(
        &self,
        term: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MasterProduct>> {
        let pattern = format!("%{}%", term.to_lowercase());
        let products = sqlx::query_as::<_, MasterProduct>(
            r#"
            SELECT product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at
            FROM master_products
            WHERE lower(standard_name) LIKE $1
              AND ($2::text IS NULL OR category = $2)
            ORDER BY standard_name
            LIMIT $3
            "#,
        )
        .bind(pattern)
        .bind(category)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(products)
    }

    async fn get_products_by_category(&self, category: &str, limit: usize) -> Result<Vec<MasterProduct>> {
        let products = sqlx::query_as::<_, MasterProduct>(
            r#"
            SELECT product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at
            FROM master_products
            WHERE category = $1 AND status = 'active'
            LIMIT $2
            "#,
        )
        .bind(category)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(products)
    }

    async fn get_current_prices(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<SupplierPrice>> {
        let cutoff = (Utc::now() - chrono::Duration::from_std(window).unwrap_or_default()).date_naive();
        let prices = sqlx::query_as::<_, SupplierPrice>(
            r#"
            SELECT price_id, product_id, supplier_name, original_name, price, currency, price_date, unit, min_order_qty, confidence_score, source, last_seen
            FROM supplier_prices
            WHERE product_id = $1 AND price_date >= $2
            ORDER BY price ASC
            "#,
        )
        .bind(product_id)
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;
        Ok(prices)
    }

    async fn get_best_price(&self, product_id: &str) -> Result<Option<SupplierPrice>> {
        Ok(self
            .get_current_prices(product_id, Duration::from_secs(30 * 24 * 3600))
            .await?
            .into_iter()
            .next())
    }

    async fn get_price_history(
        &self,
        product_id: &str,
        window: Duration,
    ) -> Result<Vec<PriceHistoryEntry>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let history = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT history_id, product_id, supplier_name, old_price, new_price, change_percentage, change_date, reason
            FROM price_history
            WHERE product_id = $1 AND change_date >= $2
            ORDER BY change_date ASC
            "#,
        )
        .bind(product_id)
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;
        Ok(history)
    }

    async fn get_supplier_performance(&self, name: &str) -> Result<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT supplier_name, status, reliability_score, last_price_update FROM suppliers WHERE supplier_name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        Ok(supplier)
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT supplier_name, status, reliability_score, last_price_update FROM suppliers",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(suppliers)
    }

    async fn get_unified_catalog(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ProductAggregate>> {
        let products = if let Some(cat) = category {
            self.get_products_by_category(cat, limit).await?
        } else {
            sqlx::query_as::<_, MasterProduct>(
                "SELECT product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at FROM master_products WHERE status = 'active' LIMIT $1",
            )
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?
        };

        let mut aggregates = Vec::with_capacity(products.len());
        for product in products {
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
        let matches = sqlx::query_as::<_, ProductMatch>(
            r#"
            SELECT match_id, product_a_id, product_b_id, similarity_score, name_similarity, brand_similarity, size_similarity, match_type, reviewed, approved, reviewer, reviewed_at
            FROM product_matches
            WHERE reviewed = false AND match_type != 'rejected'
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
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
        let (product_a, product_b) = ProductMatch::canonical_pair(a, b);
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO product_matches
                (match_id, product_a_id, product_b_id, similarity_score, name_similarity, brand_similarity, size_similarity, match_type, reviewed, approved)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, false)
            ON CONFLICT (product_a_id, product_b_id)
            DO UPDATE SET similarity_score = EXCLUDED.similarity_score, name_similarity = EXCLUDED.name_similarity,
                brand_similarity = EXCLUDED.brand_similarity, size_similarity = EXCLUDED.size_similarity,
                match_type = EXCLUDED.match_type
            "#,
        )
        .bind(&id)
        .bind(&product_a)
        .bind(&product_b)
        .bind(score)
        .bind(name_similarity)
        .bind(brand_similarity)
        .bind(size_similarity)
        .bind(match_type)
        .execute(self.pool())
        .await?;

        let (existing_id,): (String,) = sqlx::query_as(
            "SELECT match_id FROM product_matches WHERE product_a_id = $1 AND product_b_id = $2",
        )
        .bind(&product_a)
        .bind(&product_b)
        .fetch_one(self.pool())
        .await?;

        Ok(existing_id)
    }

    async fn merge_products(&self, source_id: &str, target_id: &str) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let status: Option<(ProductStatus,)> =
            sqlx::query_as("SELECT status FROM master_products WHERE product_id = $1")
                .bind(source_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (status,) = status.ok_or_else(|| CatalogError::NotFound(format!("product {source_id}")))?;
        if matches!(status, ProductStatus::Merged) {
            return Err(CatalogError::MergeConflict(format!(
                "{source_id} has already been merged"
            )));
        }

        sqlx::query("UPDATE supplier_prices SET product_id = $1 WHERE product_id = $2")
            .bind(target_id)
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE price_history SET product_id = $1 WHERE product_id = $2")
            .bind(target_id)
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE master_products SET status = 'merged', updated_at = $1 WHERE product_id = $2")
            .bind(Utc::now())
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn ensure_category(&self, name: &str) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, created_at)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING name, created_at
            "#,
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(category)
    }

    async fn unit_family_of(&self, product_id: &str) -> Result<Option<UnitFamily>> {
        let product = self.get_product(product_id).await?;
        Ok(product.and_then(|p| p.unit).and_then(|unit| {
            crate::unit::classify(&unit, &crate::unit::default_unit_conversions())
                .ok()
                .map(|(fam, _)| fam)
        }))
    }
}

impl PostgresCatalogStore {
    async fn get_product_by_name_brand(
        &self,
        name: &str,
        brand: Option<&str>,
    ) -> Result<Option<MasterProduct>> {
        let product = sqlx::query_as::<_, MasterProduct>(
            "SELECT product_id, standard_name, brand, category, size, unit, description, status, created_at, updated_at FROM master_products WHERE standard_name = $1 AND brand IS NOT DISTINCT FROM $2",
        )
        .bind(name)
        .bind(brand)
        .fetch_optional(self.pool())
        .await?;
        Ok(product)
    }
}
