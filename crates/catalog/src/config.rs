//! Domain thresholds and lookup tables (spec.md §6), injected at engine
//! construction rather than read from ambient state — tests construct
//! engines with overridden tables.

use crate::normalize::{default_brand_aliases, default_stop_words};
use crate::unit::{default_unit_conversions, UnitFamily};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub price_tolerance: Decimal,
    pub trend_analysis_days: i64,
    pub fuzzy_match_threshold: f64,
    pub exact_match_threshold: f64,
    pub similarity_threshold: f64,
    pub price_window_days: i64,
    pub supplier_volatility_window_days: i64,
    pub min_deal_savings_percent: f64,
    pub recommendation_ttl_days: i64,
    pub preprocessor_max_scan_rows: usize,
    pub preprocessor_max_scan_cols: usize,
    pub unit_base_conversions: HashMap<String, (UnitFamily, Decimal)>,
    pub brand_aliases: HashMap<String, String>,
    pub stop_words: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            price_tolerance: Decimal::new(5, 2), // 0.05
            trend_analysis_days: 30,
            fuzzy_match_threshold: 0.80,
            exact_match_threshold: 0.95,
            similarity_threshold: 0.80,
            price_window_days: 30,
            supplier_volatility_window_days: 90,
            min_deal_savings_percent: 5.0,
            recommendation_ttl_days: 7,
            preprocessor_max_scan_rows: 50,
            preprocessor_max_scan_cols: 20,
            unit_base_conversions: default_unit_conversions(),
            brand_aliases: default_brand_aliases(),
            stop_words: default_stop_words(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.fuzzy_match_threshold, 0.80);
        assert_eq!(cfg.exact_match_threshold, 0.95);
        assert_eq!(cfg.preprocessor_max_scan_rows, 50);
        assert_eq!(cfg.preprocessor_max_scan_cols, 20);
    }
}
