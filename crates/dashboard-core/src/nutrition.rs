//! Nutrition lookup contract and serving-size scaling.
//!
//! The lookup service reports nutrients per 100 g; [`scale_nutrients`] turns
//! such a record into a [`FoodEntry`] for the amount actually eaten.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::models::FoodEntry;

/// Nutrient values for 100 g of a food, as returned by a lookup service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientRecord {
    pub name: String,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub fat_total_g: Option<f64>,
    #[serde(default)]
    pub fat_saturated_g: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub sodium_mg: Option<f64>,
    #[serde(default)]
    pub potassium_mg: Option<f64>,
    #[serde(default)]
    pub cholesterol_mg: Option<f64>,
    #[serde(default)]
    pub carbohydrates_total_g: Option<f64>,
    #[serde(default)]
    pub fiber_g: Option<f64>,
    #[serde(default)]
    pub sugar_g: Option<f64>,
}

/// A source of per-100 g nutrient data.
///
/// Implementations must report failure (including "no matching item") as an
/// error, never as an empty record.
pub trait NutritionLookup {
    fn lookup(&self, food_name: &str, quantity: &str) -> Result<NutrientRecord>;
}

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*(g|gr|grams?)?\s*$").expect("static regex is valid")
    })
}

/// Parse a serving quantity such as `"150g"`, `"150 g"` or `"150"` into grams.
pub fn parse_quantity(quantity: &str) -> Result<f64> {
    let lowered = quantity.to_lowercase();
    let caps = quantity_regex()
        .captures(&lowered)
        .ok_or_else(|| DashboardError::InvalidQuantity(quantity.to_string()))?;
    let grams: f64 = caps[1]
        .replace(',', ".")
        .parse()
        .map_err(|_| DashboardError::InvalidQuantity(quantity.to_string()))?;
    if grams <= 0.0 {
        return Err(DashboardError::InvalidQuantity(quantity.to_string()));
    }
    Ok(grams)
}

/// Scale a per-100 g record to `grams` eaten at `timestamp`.
pub fn scale_nutrients(
    record: &NutrientRecord,
    grams: f64,
    timestamp: DateTime<Utc>,
) -> FoodEntry {
    let factor = grams / 100.0;
    let scale = |v: Option<f64>| v.map(|x| x * factor);
    FoodEntry {
        id: None,
        timestamp,
        name: record.name.clone(),
        serving_size_g: Some(grams),
        calories: scale(record.calories),
        fat_total_g: scale(record.fat_total_g),
        fat_saturated_g: scale(record.fat_saturated_g),
        protein_g: scale(record.protein_g),
        sodium_mg: scale(record.sodium_mg),
        potassium_mg: scale(record.potassium_mg),
        cholesterol_mg: scale(record.cholesterol_mg),
        carbohydrates_total_g: scale(record.carbohydrates_total_g),
        fiber_g: scale(record.fiber_g),
        sugar_g: scale(record.sugar_g),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn apple() -> NutrientRecord {
        NutrientRecord {
            name: "apple".to_string(),
            calories: Some(53.0),
            carbohydrates_total_g: Some(14.1),
            fat_total_g: Some(0.2),
            protein_g: Some(0.3),
            sugar_g: Some(10.3),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_quantity_variants() {
        assert_eq!(parse_quantity("150g").unwrap(), 150.0);
        assert_eq!(parse_quantity("150 g").unwrap(), 150.0);
        assert_eq!(parse_quantity("80").unwrap(), 80.0);
        assert_eq!(parse_quantity("12,5 grams").unwrap(), 12.5);
        assert_eq!(parse_quantity("100G").unwrap(), 100.0);
    }

    #[test]
    fn test_parse_quantity_rejects_garbage() {
        for bad in ["", "a lot", "2 cups", "0g", "-5g"] {
            assert!(
                matches!(parse_quantity(bad), Err(DashboardError::InvalidQuantity(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_scale_nutrients_multiplies_by_grams_over_100() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let entry = scale_nutrients(&apple(), 200.0, ts);
        assert_eq!(entry.name, "apple");
        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.serving_size_g, Some(200.0));
        assert!((entry.calories.unwrap() - 106.0).abs() < 1e-9);
        assert!((entry.carbohydrates_total_g.unwrap() - 28.2).abs() < 1e-9);
        assert!(entry.fiber_g.is_none());
    }

    #[test]
    fn test_scale_nutrients_identity_at_100g() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let entry = scale_nutrients(&apple(), 100.0, ts);
        assert_eq!(entry.calories, Some(53.0));
    }
}
