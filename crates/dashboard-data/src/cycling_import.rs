//! Bulk import of cycling sessions from a CSV export.
//!
//! Expected header: `timestamp,calories,duration_in_s,name`. Durations are
//! converted from seconds to minutes on the way in.

use std::io::Read;
use std::path::Path;

use anyhow::Context as _;
use csv::ReaderBuilder;
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{CyclingSession, EventKind};
use dashboard_core::time_utils::TimezoneHandler;
use serde::Deserialize;
use tracing::info;

use crate::store::{to_row, EventStore};

#[derive(Debug, Deserialize)]
struct CsvRide {
    timestamp: String,
    calories: Option<f64>,
    duration_in_s: f64,
    #[serde(default)]
    name: String,
}

impl CsvRide {
    fn into_session(self, tz: &TimezoneHandler) -> Result<CyclingSession> {
        if !self.duration_in_s.is_finite() {
            return Err(DashboardError::data_type("duration_in_s", self.duration_in_s));
        }
        Ok(CyclingSession {
            id: None,
            timestamp: tz.parse_timestamp(&self.timestamp)?,
            calories: self.calories,
            duration: Some(self.duration_in_s / 60.0),
            name_of_session: self.name,
        })
    }
}

/// Parse every ride in `reader`. Any bad row fails the whole batch.
pub fn parse_cycling_csv<R: Read>(reader: R, tz: &TimezoneHandler) -> Result<Vec<CyclingSession>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut sessions = Vec::new();
    for (line, record) in rdr.deserialize::<CsvRide>().enumerate() {
        let ride = record
            .with_context(|| format!("cycling CSV record {}", line + 1))
            .map_err(DashboardError::Other)?;
        sessions.push(ride.into_session(tz)?);
    }
    Ok(sessions)
}

/// Import all rides from the CSV file at `path`, returning the new row ids.
///
/// Rows are only written once the whole file has parsed.
pub fn import_cycling_csv<S: EventStore>(
    store: &S,
    path: &Path,
    tz: &TimezoneHandler,
) -> Result<Vec<i64>> {
    let file = std::fs::File::open(path).map_err(|source| DashboardError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let sessions = parse_cycling_csv(file, tz)?;

    let ids = sessions
        .iter()
        .map(|session| store.create(EventKind::Cycling.table(), to_row(session)?))
        .collect::<Result<Vec<_>>>()?;

    info!("Imported {} cycling sessions from {}", ids.len(), path.display());
    Ok(ids)
}
