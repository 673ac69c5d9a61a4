//! Unit Algebra (C1): classifies size units into weight/volume/count
//! families and converts them to the family's base unit (`g`, `ml`, `pcs`).
//!
//! The conversion table is closed — no unit outside it is recognized, and
//! lookups are case-insensitive with punctuation/whitespace trimmed.

use crate::error::CatalogError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitFamily {
    Weight,
    Volume,
    Count,
}

impl UnitFamily {
    pub fn base_unit(&self) -> &'static str {
        match self {
            UnitFamily::Weight => "g",
            UnitFamily::Volume => "ml",
            UnitFamily::Count => "pcs",
        }
    }
}

/// `unit token -> (family, multiplier to base unit)`.
///
/// Ported from `original_source`'s unit conversion table (spec.md §4.1):
/// weight in grams, volume in milliliters, count collapses to 1.
pub fn default_unit_conversions() -> HashMap<String, (UnitFamily, Decimal)> {
    let mut table = HashMap::new();

    let weight: &[(&str, &str)] = &[
        ("g", "1"),
        ("gram", "1"),
        ("grams", "1"),
        ("kg", "1000"),
        ("kilogram", "1000"),
        ("lb", "453.592"),
        ("lbs", "453.592"),
        ("pound", "453.592"),
        ("oz", "28.3495"),
    ];
    for (token, mult) in weight {
        table.insert(
            token.to_string(),
            (UnitFamily::Weight, Decimal::from_str(mult).unwrap()),
        );
    }

    let volume: &[(&str, &str)] = &[
        ("ml", "1"),
        ("milliliter", "1"),
        ("l", "1000"),
        ("liter", "1000"),
        ("litre", "1000"),
        ("fl_oz", "29.5735"),
        ("floz", "29.5735"),
        ("gallon", "3785.41"),
    ];
    for (token, mult) in volume {
        table.insert(
            token.to_string(),
            (UnitFamily::Volume, Decimal::from_str(mult).unwrap()),
        );
    }

    let count: &[&str] = &[
        "pcs", "piece", "pieces", "box", "pack", "can", "bottle", "jar", "unit",
    ];
    for token in count {
        table.insert(
            token.to_string(),
            (UnitFamily::Count, Decimal::ONE),
        );
    }

    table
}

fn canonicalize(unit: &str) -> String {
    unit.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Classifies a unit token into its family and the multiplier needed to
/// convert a value expressed in that unit into the family's base unit.
pub fn classify(
    unit: &str,
    conversions: &HashMap<String, (UnitFamily, Decimal)>,
) -> Result<(UnitFamily, Decimal), CatalogError> {
    let key = canonicalize(unit);
    conversions
        .get(&key)
        .copied()
        .ok_or_else(|| CatalogError::UnknownUnit(unit.to_string()))
}

/// Converts `value` expressed in `unit` to the family's base unit.
pub fn to_base(
    value: Decimal,
    unit: &str,
    conversions: &HashMap<String, (UnitFamily, Decimal)>,
) -> Result<Decimal, CatalogError> {
    let (_, multiplier) = classify(unit, conversions)?;
    Ok(value * multiplier)
}

/// Whether two units belong to the same family (both must be recognized).
pub fn same_family(
    a: &str,
    b: &str,
    conversions: &HashMap<String, (UnitFamily, Decimal)>,
) -> bool {
    match (classify(a, conversions), classify(b, conversions)) {
        (Ok((fam_a, _)), Ok((fam_b, _))) => fam_a == fam_b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_weight_units() {
        let table = default_unit_conversions();
        let (family, _) = classify("KG", &table).unwrap();
        assert_eq!(family, UnitFamily::Weight);
    }

    #[test]
    fn unknown_unit_errors() {
        let table = default_unit_conversions();
        assert!(matches!(
            classify("furlongs", &table),
            Err(CatalogError::UnknownUnit(_))
        ));
    }

    #[test]
    fn conversion_is_lossless_and_reversible_within_family() {
        let table = default_unit_conversions();
        let x = Decimal::from_str("5").unwrap();
        let base = to_base(x, "kg", &table).unwrap();
        let (_, multiplier) = classify("kg", &table).unwrap();
        assert_eq!(base / multiplier, x);
    }

    #[test]
    fn same_family_checks_both_sides() {
        let table = default_unit_conversions();
        assert!(same_family("kg", "g", &table));
        assert!(!same_family("kg", "ml", &table));
        assert!(!same_family("kg", "bogus", &table));
    }

    #[test]
    fn count_tokens_map_to_one() {
        let table = default_unit_conversions();
        let (family, mult) = classify("Pack", &table).unwrap();
        assert_eq!(family, UnitFamily::Count);
        assert_eq!(mult, Decimal::ONE);
    }
}
