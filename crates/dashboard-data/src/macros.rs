//! Macronutrient gram totals and their percentage shares per bucket.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use dashboard_core::error::{DashboardError, Result};
use serde::Serialize;
use tracing::debug;

/// Carbohydrate, fat and protein grams for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroGrams {
    pub carbohydrates: f64,
    pub fat: f64,
    pub protein: f64,
}

impl MacroGrams {
    pub fn total(&self) -> f64 {
        self.carbohydrates + self.fat + self.protein
    }
}

/// Percentage of the macro total each nutrient accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroShares {
    pub carbohydrates: f64,
    pub fat: f64,
    pub protein: f64,
}

impl MacroShares {
    /// Shares for one bucket. A zero total yields [`DashboardError::EmptyBucket`].
    pub fn from_grams(date: NaiveDate, grams: &MacroGrams) -> Result<Self> {
        let total = grams.total();
        if total <= 0.0 || !total.is_finite() {
            return Err(DashboardError::EmptyBucket(date));
        }
        Ok(Self {
            carbohydrates: grams.carbohydrates / total * 100.0,
            fat: grams.fat / total * 100.0,
            protein: grams.protein / total * 100.0,
        })
    }
}

/// Join three per-bucket gram series into one map. A bucket missing from a
/// series counts as zero grams of that nutrient.
pub fn combine(
    carbohydrates: &BTreeMap<NaiveDate, f64>,
    fat: &BTreeMap<NaiveDate, f64>,
    protein: &BTreeMap<NaiveDate, f64>,
) -> BTreeMap<NaiveDate, MacroGrams> {
    let mut out: BTreeMap<NaiveDate, MacroGrams> = BTreeMap::new();
    for (date, g) in carbohydrates {
        out.entry(*date).or_default().carbohydrates += g;
    }
    for (date, g) in fat {
        out.entry(*date).or_default().fat += g;
    }
    for (date, g) in protein {
        out.entry(*date).or_default().protein += g;
    }
    out
}

/// Shares for every bucket with a non-zero macro total.
///
/// Empty buckets are dropped from the result.
pub fn normalize(grams: &BTreeMap<NaiveDate, MacroGrams>) -> BTreeMap<NaiveDate, MacroShares> {
    let mut out = BTreeMap::new();
    for (date, g) in grams {
        match MacroShares::from_grams(*date, g) {
            Ok(shares) => {
                out.insert(*date, shares);
            }
            Err(e) => debug!("Skipping macro bucket: {}", e),
        }
    }
    out
}
