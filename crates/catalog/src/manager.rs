//! Unified Catalog Manager (C8): composes the Store, Matching Engine, and
//! Price Comparison Engine into the catalog's query surface (spec.md §4.8).

use crate::error::Result;
use crate::matching::ProductMatchingEngine;
use crate::pricing::procurement::{Recommendation, RequiredItem};
use crate::pricing::{MarketTrends, PriceComparisonEngine, PriceTrend};
use crate::store::model::MatchType;
use crate::store::CatalogStore;
use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub size: Option<Decimal>,
    pub unit: Option<String>,
    pub best_price: Decimal,
    pub best_supplier: String,
    pub worst_price: Decimal,
    pub suppliers_count: i64,
    pub savings_percentage: f64,
    pub price_trend: PriceTrend,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStats {
    pub products_reevaluated: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub auto_merged: Vec<(String, String)>,
    pub routed_for_review: Vec<(String, String)>,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub category: String,
    pub product_count: usize,
    pub top_deals: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierShare {
    pub supplier_name: String,
    pub best_price_wins: u64,
    pub market_share_percent: f64,
    pub categories_reached: usize,
}

pub struct CatalogManager {
    store: Arc<dyn CatalogStore>,
    matching: ProductMatchingEngine,
    pricing: PriceComparisonEngine,
}

impl CatalogManager {
    pub fn new(store: Arc<dyn CatalogStore>, matching: ProductMatchingEngine, pricing: PriceComparisonEngine) -> Self {
        Self { store, matching, pricing }
    }

    /// One item per product with a joined aggregate + price-analysis view,
    /// sorted by savings descending (spec.md §4.8 `generate_catalog`).
    pub async fn generate_catalog(
        &self,
        category: Option<&str>,
        min_suppliers: i64,
        include_single: bool,
    ) -> Result<Vec<CatalogItem>> {
        let aggregates = self.store.get_unified_catalog(category, 1000).await?;
        let mut items = Vec::new();

        for aggregate in aggregates {
            if aggregate.suppliers_count < min_suppliers && !(include_single && aggregate.suppliers_count == 1) {
                continue;
            }

            let analysis = match self.pricing.analyze(&aggregate.product.product_id).await? {
                Some(a) => a,
                None => continue,
            };

            items.push(CatalogItem {
                product_id: aggregate.product.product_id,
                name: aggregate.product.standard_name,
                brand: aggregate.product.brand,
                category: aggregate.product.category,
                size: aggregate.product.size,
                unit: aggregate.product.unit,
                best_price: aggregate.best_price,
                best_supplier: aggregate.best_supplier,
                worst_price: aggregate.worst_price,
                suppliers_count: aggregate.suppliers_count,
                savings_percentage: analysis.savings_potential,
                price_trend: analysis.trend,
                confidence_score: analysis.deal_confidence,
            });
        }

        items.sort_by(|a, b| b.savings_percentage.partial_cmp(&a.savings_percentage).unwrap_or(std::cmp::Ordering::Equal));
        Ok(items)
    }

    /// Convenience wrapper over `generate_catalog` (spec.md §4.8 `top_deals`).
    pub async fn top_deals(&self, limit: usize, min_savings: f64) -> Result<Vec<CatalogItem>> {
        let mut items = self.generate_catalog(None, 2, false).await?;
        items.retain(|i| i.savings_percentage >= min_savings);
        items.truncate(limit);
        Ok(items)
    }

    /// Searches the catalog by name, scoring results by `(savings, confidence)`
    /// (spec.md §4.8 `search_catalog`).
    pub async fn search_catalog(&self, term: &str, category: Option<&str>, limit: usize) -> Result<Vec<CatalogItem>> {
        let products = self.store.search_products(term, category, limit * 4).await?;
        let mut items = Vec::new();
        for product in products {
            if let Some(analysis) = self.pricing.analyze(&product.product_id).await? {
                let aggregates = self.store.get_unified_catalog(Some(&product.category), 1000).await?;
                let aggregate = aggregates.into_iter().find(|a| a.product.product_id == product.product_id);
                let Some(aggregate) = aggregate else { continue };

                items.push(CatalogItem {
                    product_id: product.product_id,
                    name: product.standard_name,
                    brand: product.brand,
                    category: product.category,
                    size: product.size,
                    unit: product.unit,
                    best_price: aggregate.best_price,
                    best_supplier: aggregate.best_supplier,
                    worst_price: aggregate.worst_price,
                    suppliers_count: aggregate.suppliers_count,
                    savings_percentage: analysis.savings_potential,
                    price_trend: analysis.trend,
                    confidence_score: analysis.deal_confidence,
                });
            }
        }
        items.sort_by(|a, b| {
            (b.savings_percentage, b.confidence_score)
                .partial_cmp(&(a.savings_percentage, a.confidence_score))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Per-category aggregates and top-5 deals (spec.md §4.8 `category_analysis`).
    pub async fn category_analysis(&self) -> Result<Vec<CategoryAnalysis>> {
        let aggregates = self.store.get_unified_catalog(None, 5000).await?;
        let mut categories: std::collections::HashMap<String, Vec<_>> = std::collections::HashMap::new();
        for aggregate in aggregates {
            categories.entry(aggregate.product.category.clone()).or_default().push(aggregate);
        }

        let mut out = Vec::new();
        for (category, group) in categories {
            let product_count = group.len();
            let top_deals = self.generate_catalog(Some(&category), 1, true).await?;
            out.push(CategoryAnalysis {
                category,
                product_count,
                top_deals: top_deals.into_iter().take(5).collect(),
            });
        }
        Ok(out)
    }

    /// Per-supplier counts of "won best price" plus market-share percent
    /// and category reach (spec.md §4.8 `supplier_market_share`).
    pub async fn supplier_market_share(&self) -> Result<Vec<SupplierShare>> {
        let suppliers = self.store.list_suppliers().await?;
        let aggregates = self.store.get_unified_catalog(None, 5000).await?;
        let total_products = aggregates.len().max(1);

        let mut shares = Vec::new();
        for supplier in suppliers {
            let mut wins = 0u64;
            let mut categories = std::collections::HashSet::new();
            for aggregate in &aggregates {
                if aggregate.best_supplier == supplier.supplier_name {
                    wins += 1;
                    categories.insert(aggregate.product.category.clone());
                }
            }
            shares.push(SupplierShare {
                supplier_name: supplier.supplier_name,
                best_price_wins: wins,
                market_share_percent: wins as f64 / total_products as f64 * 100.0,
                categories_reached: categories.len(),
            });
        }
        Ok(shares)
    }

    /// Periodic maintenance pass; currently a read-through re-evaluation
    /// since best/worst are computed live from `SupplierPrice` rows rather
    /// than cached (spec.md §4.8 `update_catalog_prices`).
    pub async fn update_catalog_prices(&self, cancel: &CancellationToken) -> Result<UpdateStats> {
        let aggregates = self.store.get_unified_catalog(None, 5000).await?;
        let mut stats = UpdateStats::default();

        for aggregate in aggregates {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(stats);
            }
            let _ = self.pricing.analyze(&aggregate.product.product_id).await?;
            stats.products_reevaluated += 1;
        }

        info!(products_reevaluated = stats.products_reevaluated, "catalog price re-evaluation complete");
        Ok(stats)
    }

    /// Consumes matcher suggestions; merges high-confidence pairs
    /// automatically, routes the rest for human review (spec.md §4.8
    /// `merge_duplicates`).
    pub async fn merge_duplicates(&self, auto_threshold: f64) -> Result<MergeReport> {
        let unreviewed = self.store.get_unreviewed_matches(500).await?;
        let mut report = MergeReport { auto_merged: Vec::new(), routed_for_review: Vec::new(), conflicts: Vec::new() };

        for candidate in unreviewed {
            if matches!(candidate.match_type, MatchType::Rejected) {
                continue;
            }
            if candidate.similarity_score >= auto_threshold {
                match self.store.merge_products(&candidate.product_a_id, &candidate.product_b_id).await {
                    Ok(()) => report.auto_merged.push((candidate.product_a_id, candidate.product_b_id)),
                    Err(e) => {
                        warn!(error = %e, "auto-merge failed, routing to review");
                        report.conflicts.push(candidate.match_id);
                    }
                }
            } else {
                report.routed_for_review.push((candidate.product_a_id, candidate.product_b_id));
            }
        }
        Ok(report)
    }

    /// Serialization surface for external callers (spec.md §4.8 `export_catalog`).
    pub async fn export_catalog(&self) -> Result<Vec<CatalogItem>> {
        self.generate_catalog(None, 2, true).await
    }

    /// Serialization surface wrapping `procurement_recommendations`
    /// (spec.md §4.8 `procurement_report`).
    pub async fn procurement_report(
        &self,
        required: &[RequiredItem],
        budget_limit: Option<Decimal>,
    ) -> Result<Vec<Recommendation>> {
        self.pricing
            .procurement_recommendations(required, budget_limit, ChronoDuration::days(7))
            .await
    }

    /// Runs matching over the whole catalog and persists candidate pairs
    /// (delegates to `ProductMatchingEngine::process_all`).
    pub async fn rebuild_match_candidates(&self, batch_size: usize, cancel: &CancellationToken) -> crate::matching::ProcessAllStats {
        self.matching.process_all(batch_size, cancel).await
    }

    /// Global market trend summary (delegates to `PriceComparisonEngine::market_trends`).
    pub async fn market_overview(&self) -> Result<MarketTrends> {
        let aggregates = self.store.get_unified_catalog(None, 5000).await?;
        self.pricing.market_trends(&aggregates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::memory::InMemoryCatalogStore;
    use crate::store::{IngestRecord, NewProductFields};
    use crate::store::model::PriceSource;
    use chrono::Utc;

    fn manager() -> CatalogManager {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalogStore::new());
        let matching = ProductMatchingEngine::new(store.clone(), EngineConfig::default());
        let pricing = PriceComparisonEngine::new(store.clone(), EngineConfig::default());
        CatalogManager::new(store, matching, pricing)
    }

    #[tokio::test]
    async fn generate_catalog_excludes_single_supplier_by_default() {
        let mgr = manager();
        let record = IngestRecord {
            fields: NewProductFields {
                standard_name: "rice".to_string(),
                brand: None,
                category: "rice_grains".to_string(),
                size: Some(Decimal::new(5, 0)),
                unit: Some("kg".to_string()),
                description: None,
            },
            original_name: "Rice 5kg".to_string(),
            price: Decimal::new(100000, 0),
            currency: "IDR".to_string(),
            price_date: Utc::now().date_naive(),
            unit: "kg".to_string(),
            min_order_qty: 1,
            confidence_score: 1.0,
            source: PriceSource::Spreadsheet,
        };
        mgr.store.bulk_import("Supplier A", vec![record]).await.unwrap();

        let catalog = mgr.generate_catalog(None, 2, false).await.unwrap();
        assert!(catalog.is_empty());

        let catalog_with_single = mgr.generate_catalog(None, 2, true).await.unwrap();
        assert_eq!(catalog_with_single.len(), 1);
        assert_eq!(catalog_with_single[0].suppliers_count, 1);
    }
}
