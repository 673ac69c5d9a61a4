//! Intelligent Preprocessor (C3): turns a spreadsheet workbook into
//! `{products[], prices[], pairs[], strategy, recovery_stats}` with
//! best-effort cell classification over irregular layouts.
//!
//! No repo in the retrieval corpus parses spreadsheets; `calamine` is the
//! idiomatic Rust reader for `.xlsx`/`.xls` and is a deliberate, documented
//! addition (see DESIGN.md).

pub mod classifiers;
pub mod pairing;
pub mod pdf;
pub mod strategy;

use crate::config::EngineConfig;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use pairing::{completeness, dedup_prices, dedup_products, pair_same_row_nearest_column, Pair, PriceRecord, ProductRecord};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::{Duration, Instant};
use strategy::{extract, select_strategy, Cell, Grid, Strategy};
use tracing::{debug, warn};

const MIN_FILE_BYTES: usize = 100;
const PER_SHEET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub data_completeness: f64,
    pub filled_gaps: usize,
    pub sheets_scanned: usize,
}

/// `{products[], prices[], pairs[], strategy, recovery_stats}` (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessResult {
    pub products: Vec<ProductRecord>,
    pub prices: Vec<PriceRecord>,
    pub pairs: Vec<Pair>,
    pub strategy: Strategy,
    pub recovery_stats: RecoveryStats,
    pub error: Option<String>,
}

impl PreprocessResult {
    fn parse_failure(message: String) -> Self {
        PreprocessResult {
            products: Vec::new(),
            prices: Vec::new(),
            pairs: Vec::new(),
            strategy: Strategy::AdaptiveScan,
            recovery_stats: RecoveryStats { data_completeness: 0.0, filled_gaps: 0, sheets_scanned: 0 },
            error: Some(message),
        }
    }
}

/// Entry point: iterates every sheet in the workbook, selects a strategy
/// per sheet, extracts raw product/price candidates, then dedups and
/// pairs across the whole workbook.
///
/// File-level failures (too small, undecodable) return an empty result
/// with `completeness = 0` rather than raising, per spec.md §4.3.
pub fn process(workbook_bytes: &[u8], config: &EngineConfig) -> PreprocessResult {
    if workbook_bytes.len() < MIN_FILE_BYTES {
        return PreprocessResult::parse_failure("file smaller than minimum size".to_string());
    }

    let cursor = Cursor::new(workbook_bytes);
    let mut workbook = match open_workbook_auto_from_rs(cursor) {
        Ok(wb) => wb,
        Err(e) => return PreprocessResult::parse_failure(e.to_string()),
    };

    let mut all_products = Vec::new();
    let mut all_prices = Vec::new();
    let mut filled_gaps = 0usize;
    let mut last_strategy = Strategy::AdaptiveScan;
    let mut sheets_scanned = 0usize;

    for sheet_name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(r) => r,
            Err(e) => {
                warn!(sheet = %sheet_name, error = %e, "skipping unreadable sheet");
                continue;
            }
        };

        let grid = to_grid(&range);
        if grid.is_empty() {
            continue;
        }

        let started = Instant::now();
        let strategy = select_strategy(&grid, config.preprocessor_max_scan_rows, config.preprocessor_max_scan_cols);
        let outcome = extract(&grid, strategy);
        let strategy = if started.elapsed() > PER_SHEET_TIMEOUT { Strategy::TimedOut } else { strategy };

        debug!(sheet = %sheet_name, ?strategy, products = outcome.products.len(), prices = outcome.prices.len(), "sheet processed");

        filled_gaps += outcome.filled_gaps;
        all_products.extend(outcome.products);
        all_prices.extend(outcome.prices);
        last_strategy = strategy;
        sheets_scanned += 1;
    }

    let products = dedup_products(all_products);
    let prices = dedup_prices(all_prices);
    let pairs = pair_same_row_nearest_column(&products, &prices);
    let data_completeness = completeness(pairs.len(), products.len(), filled_gaps);

    PreprocessResult {
        products,
        prices,
        pairs,
        strategy: last_strategy,
        recovery_stats: RecoveryStats { data_completeness, filled_gaps, sheets_scanned },
        error: None,
    }
}

fn to_grid(range: &calamine::Range<Data>) -> Grid {
    let mut grid: Grid = Vec::with_capacity(range.height());
    for row in range.rows() {
        let mut out_row = Vec::with_capacity(row.len());
        for value in row {
            let (text, is_numeric) = match value {
                Data::Int(i) => (i.to_string(), true),
                Data::Float(f) => (f.to_string(), true),
                Data::String(s) => (s.clone(), false),
                Data::Bool(b) => (b.to_string(), false),
                Data::DateTime(d) => (d.to_string(), false),
                Data::DateTimeIso(s) | Data::DurationIso(s) => (s.clone(), false),
                Data::Error(_) | Data::Empty => (String::new(), false),
            };
            out_row.push(Cell { text, is_numeric });
        }
        grid.push(out_row);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_below_minimum_size_is_a_parse_failure_not_a_panic() {
        let result = process(b"too small", &EngineConfig::default());
        assert!(result.error.is_some());
        assert_eq!(result.recovery_stats.data_completeness, 0.0);
        assert!(result.products.is_empty());
    }

    #[test]
    fn garbage_bytes_above_minimum_size_are_a_parse_failure() {
        let bytes = vec![0u8; 200];
        let result = process(&bytes, &EngineConfig::default());
        assert!(result.error.is_some());
    }
}
