//! Strategy selection and per-strategy extraction (spec.md §4.3).

use super::classifiers::{is_likely_price, is_likely_product, is_price_header, is_product_header};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One worksheet cell, already rendered to text with a numeric flag
/// preserved from the source workbook (`calamine::DataType`).
#[derive(Debug, Clone)]
pub struct Cell {
    pub text: String,
    pub is_numeric: bool,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub type Grid = Vec<Vec<Cell>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    MultiColumnStructured,
    SingleColumnStructured,
    SparseContactMixed,
    IrregularRecovery,
    AdaptiveScan,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct RawProduct {
    pub name: String,
    pub row: usize,
    pub column: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct RawPrice {
    pub value: Decimal,
    pub original: String,
    pub row: usize,
    pub column: usize,
    pub confidence: f64,
}

const SECTION_MARKERS: &[&str] = &["price list", "daftar harga", "description", "nama produk", "item"];

struct SheetSample {
    data_density: f64,
    header_indicator_count: usize,
    price_column_count: usize,
    header_row: Option<usize>,
}

fn sample(grid: &Grid, max_rows: usize, max_cols: usize) -> SheetSample {
    let rows = grid.len().min(max_rows);
    let cols = grid.first().map(|r| r.len()).unwrap_or(0).min(max_cols);

    let mut filled = 0usize;
    let mut total = 0usize;
    let mut header_indicator_count = 0usize;
    let mut header_row = None;

    for (r, row) in grid.iter().take(rows).enumerate() {
        let mut row_has_product_header = false;
        let mut row_has_price_header = false;
        for cell in row.iter().take(cols) {
            total += 1;
            if !cell.is_empty() {
                filled += 1;
                if is_product_header(&cell.text) {
                    header_indicator_count += 1;
                    row_has_product_header = true;
                }
                if is_price_header(&cell.text) {
                    header_indicator_count += 1;
                    row_has_price_header = true;
                }
            }
        }
        if header_row.is_none() && row_has_product_header && row_has_price_header {
            header_row = Some(r);
        }
    }

    let price_column_count = count_price_columns(grid, rows, cols, header_row);

    SheetSample {
        data_density: if total == 0 { 0.0 } else { filled as f64 / total as f64 },
        header_indicator_count,
        price_column_count,
        header_row,
    }
}

fn count_price_columns(grid: &Grid, rows: usize, cols: usize, header_row: Option<usize>) -> usize {
    let data_start = header_row.map(|r| r + 1).unwrap_or(0);
    let mut count = 0;
    for c in 0..cols {
        let mut hits = 0;
        let mut seen = 0;
        for row in grid.iter().skip(data_start).take(rows.saturating_sub(data_start)) {
            if seen >= 10 {
                break;
            }
            if let Some(cell) = row.get(c) {
                if cell.is_empty() {
                    continue;
                }
                seen += 1;
                if is_likely_price(&cell.text, cell.is_numeric).is_some() {
                    hits += 1;
                }
            }
        }
        if hits >= 3 {
            count += 1;
        }
    }
    count
}

/// Chooses a strategy for one sheet per spec.md §4.3.
pub fn select_strategy(grid: &Grid, max_scan_rows: usize, max_scan_cols: usize) -> Strategy {
    let s = sample(grid, max_scan_rows, max_scan_cols);
    let has_headers = s.header_row.is_some();

    if has_headers && s.price_column_count >= 2 {
        Strategy::MultiColumnStructured
    } else if has_headers && s.price_column_count == 1 {
        Strategy::SingleColumnStructured
    } else if s.data_density < 0.3 {
        Strategy::SparseContactMixed
    } else if s.data_density < 0.5 && !has_headers {
        Strategy::IrregularRecovery
    } else {
        Strategy::AdaptiveScan
    }
}

/// Result of running a strategy's extraction over a sheet.
pub struct ExtractOutcome {
    pub products: Vec<RawProduct>,
    pub prices: Vec<RawPrice>,
    pub filled_gaps: usize,
}

pub fn extract(grid: &Grid, strategy: Strategy) -> ExtractOutcome {
    match strategy {
        Strategy::MultiColumnStructured | Strategy::SingleColumnStructured => {
            extract_structured(grid)
        }
        Strategy::SparseContactMixed => extract_sparse_contact_mixed(grid),
        Strategy::IrregularRecovery => extract_irregular_recovery(grid),
        Strategy::AdaptiveScan | Strategy::TimedOut => extract_adaptive_scan(grid),
    }
}

fn column_roles(grid: &Grid, header_row: Option<usize>) -> (Vec<usize>, Vec<usize>) {
    let cols = grid.first().map(|r| r.len()).unwrap_or(0);
    let mut product_cols = Vec::new();
    let mut price_cols = Vec::new();

    if let Some(hr) = header_row {
        if let Some(row) = grid.get(hr) {
            for (c, cell) in row.iter().enumerate() {
                if is_product_header(&cell.text) {
                    product_cols.push(c);
                } else if is_price_header(&cell.text) {
                    price_cols.push(c);
                }
            }
            return (product_cols, price_cols);
        }
    }

    let data_start = header_row.map(|r| r + 1).unwrap_or(0);
    for c in 0..cols {
        let mut product_hits = 0;
        let mut price_hits = 0;
        let mut seen = 0;
        for row in grid.iter().skip(data_start) {
            if seen >= 10 {
                break;
            }
            if let Some(cell) = row.get(c) {
                if cell.is_empty() {
                    continue;
                }
                seen += 1;
                if is_likely_product(&cell.text) {
                    product_hits += 1;
                }
                if is_likely_price(&cell.text, cell.is_numeric).is_some() {
                    price_hits += 1;
                }
            }
        }
        if product_hits >= 3 {
            product_cols.push(c);
        }
        if price_hits >= 3 {
            price_cols.push(c);
        }
    }
    (product_cols, price_cols)
}

fn extract_structured(grid: &Grid) -> ExtractOutcome {
    let s = sample(grid, grid.len(), grid.first().map(|r| r.len()).unwrap_or(0));
    let (product_cols, price_cols) = column_roles(grid, s.header_row);
    let data_start = s.header_row.map(|r| r + 1).unwrap_or(0);

    let mut products = Vec::new();
    let mut prices = Vec::new();
    let mut filled_gaps = 0usize;

    for (r, row) in grid.iter().enumerate().skip(data_start) {
        let mut row_has_product = false;
        let mut row_has_price = false;

        for &c in &product_cols {
            if let Some(cell) = row.get(c) {
                if !cell.is_empty() {
                    products.push(RawProduct {
                        name: cell.text.trim().to_string(),
                        row: r,
                        column: c,
                        confidence: 0.8,
                    });
                    row_has_product = true;
                }
            }
        }
        for &c in &price_cols {
            if let Some(cell) = row.get(c) {
                if let Some((value, conf)) = is_likely_price(&cell.text, cell.is_numeric) {
                    prices.push(RawPrice {
                        value,
                        original: cell.text.clone(),
                        row: r,
                        column: c,
                        confidence: conf,
                    });
                    row_has_price = true;
                }
            }
        }

        if row_has_product && !row_has_price {
            if let Some((c, value, conf)) = nearest_price_in_row(row) {
                prices.push(RawPrice {
                    value,
                    original: row[c].text.clone(),
                    row: r,
                    column: c,
                    confidence: conf,
                });
                filled_gaps += 1;
            }
        }
    }

    ExtractOutcome { products, prices, filled_gaps }
}

fn nearest_price_in_row(row: &[Cell]) -> Option<(usize, Decimal, f64)> {
    row.iter()
        .enumerate()
        .find_map(|(c, cell)| is_likely_price(&cell.text, cell.is_numeric).map(|(v, conf)| (c, v, conf)))
}

fn extract_sparse_contact_mixed(grid: &Grid) -> ExtractOutcome {
    let start = grid
        .iter()
        .position(|row| {
            row.iter().any(|cell| {
                let lower = cell.text.to_lowercase();
                SECTION_MARKERS.iter().any(|m| lower.contains(m))
            })
        })
        .or_else(|| {
            grid.iter().position(|row| {
                row.len() >= 3
                    && !row[0].is_empty()
                    && is_likely_product(&row[1].text)
                    && is_likely_price(&row[2].text, row[2].is_numeric).is_some()
            })
        })
        .unwrap_or(0);

    let section = &grid[start..];
    let mut products = Vec::new();
    let mut prices = Vec::new();

    for (offset, row) in section.iter().enumerate() {
        let r = start + offset;
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            if is_likely_product(&cell.text) {
                products.push(RawProduct {
                    name: cell.text.trim().to_string(),
                    row: r,
                    column: c,
                    confidence: 0.8,
                });
            } else if let Some((value, conf)) = is_likely_price(&cell.text, cell.is_numeric) {
                prices.push(RawPrice { value, original: cell.text.clone(), row: r, column: c, confidence: conf });
            }
        }
    }

    ExtractOutcome { products, prices, filled_gaps: 0 }
}

fn extract_irregular_recovery(grid: &Grid) -> ExtractOutcome {
    let mut products = Vec::new();
    let mut prices = Vec::new();

    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }

            let neighborhood = neighborhood_texts(grid, r, c);
            let near_product_header = neighborhood.iter().any(|t| is_product_header(t));
            let near_price_header = neighborhood.iter().any(|t| is_price_header(t));

            if near_product_header && is_likely_product(&cell.text) {
                let conf = (0.8 + 0.1).min(1.0);
                products.push(RawProduct { name: cell.text.trim().to_string(), row: r, column: c, confidence: conf });
            } else if is_likely_product(&cell.text) {
                products.push(RawProduct { name: cell.text.trim().to_string(), row: r, column: c, confidence: 0.8 });
            }

            if let Some((value, conf)) = is_likely_price(&cell.text, cell.is_numeric) {
                let boosted = if near_price_header { (conf + 0.1).min(1.0) } else { conf };
                prices.push(RawPrice { value, original: cell.text.clone(), row: r, column: c, confidence: boosted });
            }
        }
    }

    ExtractOutcome { products, prices, filled_gaps: 0 }
}

fn neighborhood_texts(grid: &Grid, r: usize, c: usize) -> Vec<String> {
    let mut out = Vec::new();
    for dr in -1i64..=1 {
        for dc in -1i64..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }
            let nr = r as i64 + dr;
            let nc = c as i64 + dc;
            if nr < 0 || nc < 0 {
                continue;
            }
            if let Some(row) = grid.get(nr as usize) {
                if let Some(cell) = row.get(nc as usize) {
                    if !cell.is_empty() {
                        out.push(cell.text.clone());
                    }
                }
            }
        }
    }
    out
}

fn extract_adaptive_scan(grid: &Grid) -> ExtractOutcome {
    let mut products = Vec::new();
    let mut prices = Vec::new();

    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            if let Some((value, conf)) = is_likely_price(&cell.text, cell.is_numeric) {
                prices.push(RawPrice { value, original: cell.text.clone(), row: r, column: c, confidence: conf });
            } else if is_likely_product(&cell.text) {
                products.push(RawProduct { name: cell.text.trim().to_string(), row: r, column: c, confidence: 0.8 });
            }
        }
    }

    ExtractOutcome { products, prices, filled_gaps: 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, is_numeric: bool) -> Cell {
        Cell { text: text.to_string(), is_numeric }
    }

    fn text_row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| cell(c, false)).collect()
    }

    #[test]
    fn header_with_two_price_columns_is_multi_column_structured() {
        let grid = vec![
            text_row(&["Product Name", "Price A", "Price B"]),
            vec![cell("Rice 5kg", false), cell("100000", true), cell("105000", true)],
            vec![cell("Oil 1l", false), cell("25000", true), cell("26000", true)],
            vec![cell("Sugar 1kg", false), cell("15000", true), cell("15500", true)],
        ];
        assert_eq!(select_strategy(&grid, 50, 20), Strategy::MultiColumnStructured);
    }

    #[test]
    fn sparse_grid_without_headers_is_sparse_contact_mixed() {
        let mut grid = Vec::new();
        for _ in 0..10 {
            grid.push(vec![cell("", false), cell("", false), cell("", false)]);
        }
        grid[0][0] = cell("Contact: +62 812", false);
        assert_eq!(select_strategy(&grid, 50, 20), Strategy::SparseContactMixed);
    }

    #[test]
    fn structured_extraction_fills_gap_from_nearest_price_column() {
        let grid = vec![
            text_row(&["Product", "Price", "Note"]),
            vec![cell("Rice 5kg", false), cell("", false), cell("100000", true)],
        ];
        let outcome = extract_structured(&grid);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.filled_gaps, 1);
        assert_eq!(outcome.prices.len(), 1);
    }
}
