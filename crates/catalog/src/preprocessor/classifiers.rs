//! Cell-level classifiers shared by every strategy in `strategy.rs`
//! (spec.md §4.3 "Cell classifiers").

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static THOUSANDS_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})*(?:[.,]\d{2})?$").unwrap());
static CURRENCY_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(rp|usd|\$)\s*[\d.,]+$").unwrap());
static PLAIN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.,]?\d*$").unwrap());
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.,]").unwrap());

const PRODUCT_HEADER_KEYWORDS: &[&str] =
    &["product", "item", "name", "barang", "produk", "description", "nama"];
const PRICE_HEADER_KEYWORDS: &[&str] = &["price", "harga", "cost", "biaya", "tarif"];
const SERVICE_TOKENS: &[&str] = &["unit", "price", "harga", "no", "qty", "description", "total"];

pub fn is_product_header(cell: &str) -> bool {
    let lower = cell.to_lowercase();
    PRODUCT_HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_price_header(cell: &str) -> bool {
    let lower = cell.to_lowercase();
    PRICE_HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Numeric cells > 10, or strings matching a price-shaped regex. Returns
/// `(is_price, extracted_value, confidence)` — confidence is 0.9 for a
/// native numeric cell, 0.7 for a regex-extracted string.
pub fn is_likely_price(raw: &str, is_numeric: bool) -> Option<(Decimal, f64)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_numeric {
        if let Ok(value) = Decimal::from_str(trimmed) {
            if value > Decimal::TEN {
                return Some((value, 0.9));
            }
        }
        return None;
    }

    if THOUSANDS_PRICE.is_match(trimmed) || CURRENCY_PREFIXED.is_match(trimmed) || PLAIN_NUMBER.is_match(trimmed) {
        let stripped = NON_DIGIT.replace_all(trimmed, "");
        let normalized = normalize_decimal_separator(&stripped);
        if let Ok(value) = Decimal::from_str(&normalized) {
            return Some((value, 0.7));
        }
    }
    None
}

/// Strings of length >= 3 with at least one alphabetic character, that
/// aren't price-shaped or a known service token.
pub fn is_likely_product(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    if !trimmed.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if is_likely_price(trimmed, false).is_some() {
        return false;
    }
    let lower = trimmed.to_lowercase();
    if SERVICE_TOKENS.contains(&lower.as_str()) {
        return false;
    }
    true
}

/// Strips thousands separators and normalizes the remaining separator to
/// a decimal point (last separator group is treated as the fraction when
/// exactly one survives truncation).
fn normalize_decimal_separator(stripped: &str) -> String {
    let has_dot = stripped.contains('.');
    let has_comma = stripped.contains(',');
    if has_dot && has_comma {
        // Whichever separator appears last is the decimal point.
        let last_dot = stripped.rfind('.').unwrap();
        let last_comma = stripped.rfind(',').unwrap();
        if last_comma > last_dot {
            stripped.replace('.', "").replace(',', ".")
        } else {
            stripped.replace(',', "")
        }
    } else if has_comma {
        stripped.replace(',', ".")
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_price_above_ten_is_likely_price() {
        let (value, conf) = is_likely_price("15000", true).unwrap();
        assert_eq!(value, Decimal::from_str("15000").unwrap());
        assert_eq!(conf, 0.9);
    }

    #[test]
    fn numeric_price_at_or_below_ten_is_rejected() {
        assert!(is_likely_price("5", true).is_none());
    }

    #[test]
    fn currency_prefixed_string_is_price() {
        let (_, conf) = is_likely_price("Rp 25.000", false).unwrap();
        assert_eq!(conf, 0.7);
    }

    #[test]
    fn product_string_is_accepted() {
        assert!(is_likely_product("Indomie Goreng"));
    }

    #[test]
    fn service_token_is_rejected_as_product() {
        assert!(!is_likely_product("qty"));
        assert!(!is_likely_product("no"));
    }

    #[test]
    fn price_shaped_string_is_not_a_product() {
        assert!(!is_likely_product("15000"));
    }
}
