//! Name/Brand Normalizer (C2): pure functions mapping raw supplier strings
//! to canonical forms used for matching.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*([a-zA-Z]+)").unwrap());

/// Stop words stripped during name normalization (spec.md §4.2).
pub fn default_stop_words() -> HashSet<String> {
    [
        "the", "and", "or", "with", "for", "premium", "original", "classic", "special", "extra",
        "super", "new", "fresh", "natural", "organic", "pure", "best", "quality", "pack",
        "bottle", "can", "jar", "box", "bag", "sachet",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Brand alias table ported from
/// `original_source/modules/product_matching_engine.py::_load_brand_aliases`.
pub fn default_brand_aliases() -> HashMap<String, String> {
    let groups: &[(&[&str], &str)] = &[
        (&["coca cola", "coca-cola", "coke", "cocacola"], "coca-cola"),
        (&["pepsi", "pepsi cola", "pepsicola"], "pepsi"),
        (&["indomie", "indo mie"], "indomie"),
        (&["maggi", "maggie"], "maggi"),
        (&["barilla"], "barilla"),
        (&["abc", "kecap abc"], "abc"),
    ];

    let mut table = HashMap::new();
    for (aliases, canonical) in groups {
        for alias in *aliases {
            table.insert(alias.to_string(), canonical.to_string());
        }
    }
    table
}

/// Lowercases, collapses non-alphanumeric runs to single spaces, drops
/// stop words, collapses whitespace. Idempotent: `normalize_name(normalize_name(s)) == normalize_name(s)`.
pub fn normalize_name(raw: &str, stop_words: &HashSet<String>) -> String {
    let lower = raw.to_lowercase();
    let spaced = NON_ALPHANUMERIC.replace_all(&lower, " ");
    let tokens: Vec<&str> = spaced
        .split_whitespace()
        .filter(|tok| !stop_words.contains(*tok))
        .collect();
    WHITESPACE.replace_all(&tokens.join(" "), " ").trim().to_string()
}

/// Lowercases, strips punctuation, resolves through the brand alias map.
/// Unknown brands pass through after the punctuation strip.
pub fn normalize_brand(raw: &str, aliases: &HashMap<String, String>) -> String {
    let lower = raw.to_lowercase();
    let stripped = NON_ALPHANUMERIC.replace_all(&lower, " ");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").to_string();
    aliases.get(&collapsed).cloned().unwrap_or(collapsed)
}

/// Scans `name` for the first `(number)(unit)` pattern and returns the
/// parsed size plus the unit token, along with the name with the matched
/// span removed. Accepts `,` or `.` as the decimal separator.
pub fn extract_size(name: &str) -> (Option<(Decimal, String)>, String) {
    match SIZE_PATTERN.find(name) {
        Some(m) => {
            let caps = SIZE_PATTERN.captures(name).unwrap();
            let number_raw = caps.get(1).unwrap().as_str().replace(',', ".");
            let unit = caps.get(2).unwrap().as_str().to_lowercase();
            let remainder = format!("{}{}", &name[..m.start()], &name[m.end()..]);
            match Decimal::from_str(&number_raw) {
                Ok(value) => (Some((value, unit)), remainder.trim().to_string()),
                Err(_) => (None, name.to_string()),
            }
        }
        None => (None, name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_strips_stopwords_and_punctuation() {
        let stop_words = default_stop_words();
        let result = normalize_name("Premium Rice, 5kg!! -- Extra Fresh", &stop_words);
        assert_eq!(result, "rice 5kg");
    }

    #[test]
    fn normalize_name_is_idempotent() {
        let stop_words = default_stop_words();
        let once = normalize_name("Coca-Cola   330ml Bottle", &stop_words);
        let twice = normalize_name(&once, &stop_words);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_brand_resolves_alias_class_confluently() {
        let aliases = default_brand_aliases();
        let a = normalize_brand("Coca Cola", &aliases);
        let b = normalize_brand("coca-cola", &aliases);
        let c = normalize_brand("Coke", &aliases);
        assert_eq!(a, "coca-cola");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn normalize_brand_passes_through_unknown() {
        let aliases = default_brand_aliases();
        assert_eq!(normalize_brand("Nestle", &aliases), "nestle");
    }

    #[test]
    fn extract_size_parses_decimal_comma() {
        let (size, remainder) = extract_size("Minyak Goreng 1,5l");
        let (value, unit) = size.unwrap();
        assert_eq!(value, Decimal::from_str("1.5").unwrap());
        assert_eq!(unit, "l");
        assert_eq!(remainder, "Minyak Goreng");
    }

    #[test]
    fn extract_size_returns_none_when_absent() {
        let (size, remainder) = extract_size("Generic Snack");
        assert!(size.is_none());
        assert_eq!(remainder, "Generic Snack");
    }
}
