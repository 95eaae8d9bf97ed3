//! Conversion of raw store rows into typed events.
//!
//! Every field is validated here, at the store boundary: a row without a
//! required field is a [`DashboardError::MissingField`] and a measure that is
//! not a number is a [`DashboardError::DataType`]. The aggregation code only
//! ever sees well-formed records.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{BodyweightEntry, CyclingSession, EventKind, FoodEntry};
use dashboard_core::time_utils::{parse_date, TimezoneHandler};
use serde_json::Value;
use tracing::debug;

use crate::store::{row_id, EventStore, Row};

/// All records of one event kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBatch {
    Food(Vec<FoodEntry>),
    Bodyweight(Vec<BodyweightEntry>),
    Cycling(Vec<CyclingSession>),
}

impl EventBatch {
    pub fn len(&self) -> usize {
        match self {
            EventBatch::Food(v) => v.len(),
            EventBatch::Bodyweight(v) => v.len(),
            EventBatch::Cycling(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The event kind the batch holds.
    pub fn kind(&self) -> EventKind {
        match self {
            EventBatch::Food(_) => EventKind::Food,
            EventBatch::Bodyweight(_) => EventKind::Bodyweight,
            EventBatch::Cycling(_) => EventKind::Cycling,
        }
    }
}

fn mismatched_batch(requested: EventKind, got: &EventBatch) -> DashboardError {
    DashboardError::Other(anyhow!(
        "event source returned {} events when {} were requested",
        got.kind(),
        requested
    ))
}

/// Supplies a fresh snapshot of the event log for one kind.
pub trait EventSource {
    fn read_events(&self, kind: EventKind) -> Result<EventBatch>;

    fn read_food(&self) -> Result<Vec<FoodEntry>> {
        match self.read_events(EventKind::Food)? {
            EventBatch::Food(v) => Ok(v),
            other => Err(mismatched_batch(EventKind::Food, &other)),
        }
    }

    fn read_bodyweight(&self) -> Result<Vec<BodyweightEntry>> {
        match self.read_events(EventKind::Bodyweight)? {
            EventBatch::Bodyweight(v) => Ok(v),
            other => Err(mismatched_batch(EventKind::Bodyweight, &other)),
        }
    }

    fn read_cycling(&self) -> Result<Vec<CyclingSession>> {
        match self.read_events(EventKind::Cycling)? {
            EventBatch::Cycling(v) => Ok(v),
            other => Err(mismatched_batch(EventKind::Cycling, &other)),
        }
    }
}

/// [`EventSource`] reading from an [`EventStore`].
///
/// Naive timestamps in stored rows are interpreted in `timezone`.
pub struct StoreEventSource<'a, S: EventStore> {
    store: &'a S,
    timezone: TimezoneHandler,
}

impl<'a, S: EventStore> StoreEventSource<'a, S> {
    pub fn new(store: &'a S, timezone: TimezoneHandler) -> Self {
        Self { store, timezone }
    }
}

impl<S: EventStore> EventSource for StoreEventSource<'_, S> {
    fn read_events(&self, kind: EventKind) -> Result<EventBatch> {
        let rows = self.store.read_all(kind.table())?;
        debug!("Ingesting {} {} rows", rows.len(), kind);

        let tz = &self.timezone;
        let batch = match kind {
            EventKind::Food => EventBatch::Food(
                rows.iter()
                    .map(|r| food_from_row(r, tz))
                    .collect::<Result<_>>()?,
            ),
            EventKind::Bodyweight => EventBatch::Bodyweight(
                rows.iter()
                    .map(bodyweight_from_row)
                    .collect::<Result<_>>()?,
            ),
            EventKind::Cycling => EventBatch::Cycling(
                rows.iter()
                    .map(|r| cycling_from_row(r, tz))
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(batch)
    }
}

// ── Row conversion ────────────────────────────────────────────────────────────

/// Build a [`FoodEntry`] from a `food_eaten` row.
pub fn food_from_row(row: &Row, tz: &TimezoneHandler) -> Result<FoodEntry> {
    let fields = RowFields::new(row, EventKind::Food);
    Ok(FoodEntry {
        id: row_id(row),
        timestamp: fields.timestamp("timestamp", tz)?,
        name: fields.optional_str("name")?.unwrap_or_default(),
        serving_size_g: fields.optional_number("serving_size_g")?,
        calories: fields.optional_number("calories")?,
        fat_total_g: fields.optional_number("fat_total_g")?,
        fat_saturated_g: fields.optional_number("fat_saturated_g")?,
        protein_g: fields.optional_number("protein_g")?,
        sodium_mg: fields.optional_number("sodium_mg")?,
        potassium_mg: fields.optional_number("potassium_mg")?,
        cholesterol_mg: fields.optional_number("cholesterol_mg")?,
        carbohydrates_total_g: fields.optional_number("carbohydrates_total_g")?,
        fiber_g: fields.optional_number("fiber_g")?,
        sugar_g: fields.optional_number("sugar_g")?,
    })
}

/// Build a [`BodyweightEntry`] from a `bodyweight` row.
pub fn bodyweight_from_row(row: &Row) -> Result<BodyweightEntry> {
    let fields = RowFields::new(row, EventKind::Bodyweight);
    let date = fields.required_str("date")?;
    Ok(BodyweightEntry {
        id: row_id(row),
        date: parse_date(date)?,
        bodyweight: fields.required_number("bodyweight")?,
    })
}

/// Build a [`CyclingSession`] from a `cycling` row.
pub fn cycling_from_row(row: &Row, tz: &TimezoneHandler) -> Result<CyclingSession> {
    let fields = RowFields::new(row, EventKind::Cycling);
    Ok(CyclingSession {
        id: row_id(row),
        timestamp: fields.timestamp("timestamp", tz)?,
        calories: fields.optional_number("calories")?,
        duration: fields.optional_number("duration")?,
        name_of_session: fields.optional_str("name_of_session")?.unwrap_or_default(),
    })
}

/// Typed field access on a row, producing errors that name the row.
struct RowFields<'r> {
    row: &'r Row,
    kind: EventKind,
}

impl<'r> RowFields<'r> {
    fn new(row: &'r Row, kind: EventKind) -> Self {
        Self { row, kind }
    }

    fn label(&self) -> String {
        row_id(self.row)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    fn missing(&self, field: &str) -> DashboardError {
        DashboardError::missing_field(self.kind.table(), self.label(), field)
    }

    /// The value of `field`, treating JSON `null` as absent.
    fn get(&self, field: &str) -> Option<&'r Value> {
        self.row.get(field).filter(|v| !v.is_null())
    }

    fn required_str(&self, field: &str) -> Result<&'r str> {
        match self.get(field) {
            None => Err(self.missing(field)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(DashboardError::data_type(field, other)),
        }
    }

    fn optional_str(&self, field: &str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(DashboardError::data_type(field, other)),
        }
    }

    /// A numeric measure. Numeric strings such as `"82.5"` are accepted;
    /// any other string, a boolean, array or object is a type error.
    fn optional_number(&self, field: &str) -> Result<Option<f64>> {
        let value = match self.get(field) {
            None => return Ok(None),
            Some(v) => v,
        };
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(x) if x.is_finite() => Ok(Some(x)),
            _ => Err(DashboardError::data_type(field, value)),
        }
    }

    fn required_number(&self, field: &str) -> Result<f64> {
        self.optional_number(field)?
            .ok_or_else(|| self.missing(field))
    }

    fn timestamp(&self, field: &str, tz: &TimezoneHandler) -> Result<DateTime<Utc>> {
        tz.parse_timestamp(self.required_str(field)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
