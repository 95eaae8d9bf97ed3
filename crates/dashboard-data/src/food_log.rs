//! Food logging: nutrient lookup, serving scaling and persistence.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::EventKind;
use dashboard_core::nutrition::{parse_quantity, scale_nutrients, NutrientRecord, NutritionLookup};
use dashboard_core::time_utils::TimezoneHandler;
use tracing::{debug, info};

use crate::ingest::food_from_row;
use crate::store::{to_row, EventStore};

/// Nutrient table loaded from a JSON array of per-100 g records.
///
/// Names match case-insensitively after trimming.
#[derive(Debug, Clone, Default)]
pub struct LocalNutrientTable {
    foods: HashMap<String, NutrientRecord>,
}

impl LocalNutrientTable {
    pub fn new(records: impl IntoIterator<Item = NutrientRecord>) -> Self {
        Self {
            foods: records
                .into_iter()
                .map(|r| (normalize_name(&r.name), r))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DashboardError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<NutrientRecord> = serde_json::from_str(&content)?;
        debug!("Loaded {} foods from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.foods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl NutritionLookup for LocalNutrientTable {
    fn lookup(&self, food_name: &str, quantity: &str) -> Result<NutrientRecord> {
        parse_quantity(quantity)?;
        self.foods
            .get(&normalize_name(food_name))
            .cloned()
            .ok_or_else(|| DashboardError::Lookup {
                food: food_name.to_string(),
                reason: "no matching item".to_string(),
            })
    }
}

/// Logs and edits `food_eaten` rows, looking nutrients up as needed.
pub struct FoodLogger<'a, L: NutritionLookup, S: EventStore> {
    lookup: &'a L,
    store: &'a S,
    timezone: TimezoneHandler,
}

impl<'a, L: NutritionLookup, S: EventStore> FoodLogger<'a, L, S> {
    pub fn new(lookup: &'a L, store: &'a S, timezone: TimezoneHandler) -> Self {
        Self {
            lookup,
            store,
            timezone,
        }
    }

    /// Look `name` up, scale it to `quantity` and store it. Without a
    /// timestamp the entry is logged at the current instant.
    pub fn log_food(
        &self,
        name: &str,
        quantity: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let grams = parse_quantity(quantity)?;
        let record = self.lookup.lookup(name, quantity)?;
        let entry = scale_nutrients(&record, grams, timestamp.unwrap_or_else(Utc::now));
        let id = self.store.create(EventKind::Food.table(), to_row(&entry)?)?;
        info!("Logged {} g of {} as food entry {}", grams, entry.name, id);
        Ok(id)
    }

    /// Edit food entry `id`. A changed name or serving size triggers a fresh
    /// lookup so the stored nutrients match the new serving.
    pub fn modify_food(
        &self,
        id: i64,
        name: Option<&str>,
        serving_size_g: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let table = EventKind::Food.table();
        let current = food_from_row(&self.store.read_one(table, id)?, &self.timezone)?;

        let new_name = name.map(str::to_string).unwrap_or_else(|| current.name.clone());
        let new_size = serving_size_g.or(current.serving_size_g);
        let new_timestamp = timestamp.unwrap_or(current.timestamp);

        let entry = if new_name != current.name || new_size != current.serving_size_g {
            let grams =
                new_size.ok_or_else(|| DashboardError::missing_field(table, id, "serving_size_g"))?;
            let quantity = format!("{grams}g");
            let grams = parse_quantity(&quantity)?;
            let record = self.lookup.lookup(&new_name, &quantity)?;
            debug!("Re-looked up nutrients for food entry {}", id);
            scale_nutrients(&record, grams, new_timestamp)
        } else {
            let mut entry = current;
            entry.timestamp = new_timestamp;
            entry
        };

        self.store.update(table, id, to_row(&entry)?)
    }
}
