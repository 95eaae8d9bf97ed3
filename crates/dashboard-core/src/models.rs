use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// The event log a record belongs to; each kind lives in its own store table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Food,
    Bodyweight,
    Cycling,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Food, EventKind::Bodyweight, EventKind::Cycling];

    /// Name of the store table holding this kind of record.
    pub fn table(self) -> &'static str {
        match self {
            EventKind::Food => "food_eaten",
            EventKind::Bodyweight => "bodyweight",
            EventKind::Cycling => "cycling",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EventKind {
    type Err = DashboardError;

    /// Accepts either the table name (`"food_eaten"`) or the short kind name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food_eaten" | "food" => Ok(EventKind::Food),
            "bodyweight" | "weight" => Ok(EventKind::Bodyweight),
            "cycling" => Ok(EventKind::Cycling),
            other => Err(DashboardError::UnknownTable(other.to_string())),
        }
    }
}

/// One logged food item with nutrients already scaled to the eaten amount.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FoodEntry {
    /// Row id assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// When the food was eaten (UTC).
    pub timestamp: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub serving_size_g: Option<f64>,
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

/// Numeric fields of a [`FoodEntry`] that dashboards aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoodMeasure {
    Calories,
    Carbohydrates,
    Fat,
    Protein,
}

impl FoodMeasure {
    /// The measure's value on `entry`; `None` when it was not recorded.
    pub fn of(self, entry: &FoodEntry) -> Option<f64> {
        match self {
            FoodMeasure::Calories => entry.calories,
            FoodMeasure::Carbohydrates => entry.carbohydrates_total_g,
            FoodMeasure::Fat => entry.fat_total_g,
            FoodMeasure::Protein => entry.protein_g,
        }
    }

    /// Store field name of the measure.
    pub fn field(self) -> &'static str {
        match self {
            FoodMeasure::Calories => "calories",
            FoodMeasure::Carbohydrates => "carbohydrates_total_g",
            FoodMeasure::Fat => "fat_total_g",
            FoodMeasure::Protein => "protein_g",
        }
    }
}

/// A bodyweight sample. Recorded per calendar day, not per instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyweightEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    /// Bodyweight in kilograms.
    pub bodyweight: f64,
}

/// One cycling workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclingSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub calories: Option<f64>,
    /// Session length in minutes.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub name_of_session: String,
}
