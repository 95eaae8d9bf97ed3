//! Row store for the event tables.
//!
//! Each table lives in `<data_dir>/<table>.jsonl`, one JSON object per line.
//! Rows carry an integer `id` assigned on creation.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::EventKind;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// One stored row: a flat JSON object.
pub type Row = Map<String, Value>;

/// Create/read/update/delete by table name and row id.
pub trait EventStore {
    /// Insert `row` and return the id assigned to it.
    fn create(&self, table: &str, row: Row) -> Result<i64>;
    /// All rows of `table`, in insertion order.
    fn read_all(&self, table: &str) -> Result<Vec<Row>>;
    fn read_one(&self, table: &str, id: i64) -> Result<Row>;
    /// Overwrite the given columns of row `id`; other columns are kept.
    fn update(&self, table: &str, id: i64, row: Row) -> Result<()>;
    fn delete(&self, table: &str, id: i64) -> Result<()>;
}

/// Serialize a typed record into a store row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(DashboardError::data_type("row", other)),
    }
}

/// Id of a stored row, if it has one.
pub fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

// ── JsonlStore ────────────────────────────────────────────────────────────────

/// File-backed [`EventStore`] keeping one `.jsonl` file per table.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the known tables that currently have a file in the data
    /// directory, sorted. Other `.jsonl` files are ignored.
    pub fn tables(&self) -> Vec<String> {
        if !self.dir.exists() {
            return Vec::new();
        }

        let mut names: Vec<String> = walkdir::WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .map(|ext| ext == "jsonl")
                        .unwrap_or(false)
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .filter(|name| EventKind::ALL.iter().any(|kind| kind.table() == name.as_str()))
            .collect();

        names.sort();
        names
    }

    /// Path of a known table's file. Unknown tables are rejected.
    fn table_path(&self, table: &str) -> Result<PathBuf> {
        let kind: EventKind = table.parse()?;
        Ok(self.dir.join(format!("{}.jsonl", kind.table())))
    }

    fn load(&self, path: &Path) -> Result<Vec<Row>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(path).map_err(|source| DashboardError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rows = Vec::new();
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed)? {
                Value::Object(map) => rows.push(map),
                other => return Err(DashboardError::data_type("row", other)),
            }
        }

        debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    /// Write all rows to a temp file, then rename it over the table file.
    fn rewrite(&self, path: &Path, rows: &[Row]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut buf = String::new();
        for row in rows {
            buf.push_str(&serde_json::to_string(row)?);
            buf.push('\n');
        }

        let tmp = path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, buf)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn not_found(table: &str, id: i64) -> DashboardError {
        DashboardError::RowNotFound {
            table: table.to_string(),
            id,
        }
    }
}

impl EventStore for JsonlStore {
    fn create(&self, table: &str, mut row: Row) -> Result<i64> {
        let path = self.table_path(table)?;
        let existing = self.load(&path)?;
        let id = existing.iter().filter_map(row_id).max().unwrap_or(0) + 1;
        row.insert("id".to_string(), Value::from(id));

        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", serde_json::to_string(&row)?)?;

        debug!("Created row {} in {}", id, table);
        Ok(id)
    }

    fn read_all(&self, table: &str) -> Result<Vec<Row>> {
        let path = self.table_path(table)?;
        self.load(&path)
    }

    fn read_one(&self, table: &str, id: i64) -> Result<Row> {
        self.read_all(table)?
            .into_iter()
            .find(|row| row_id(row) == Some(id))
            .ok_or_else(|| Self::not_found(table, id))
    }

    fn update(&self, table: &str, id: i64, row: Row) -> Result<()> {
        let path = self.table_path(table)?;
        let mut rows = self.load(&path)?;
        let target = rows
            .iter_mut()
            .find(|r| row_id(r) == Some(id))
            .ok_or_else(|| Self::not_found(table, id))?;

        for (key, value) in row {
            if key != "id" {
                target.insert(key, value);
            }
        }

        self.rewrite(&path, &rows)?;
        debug!("Updated row {} in {}", id, table);
        Ok(())
    }

    fn delete(&self, table: &str, id: i64) -> Result<()> {
        let path = self.table_path(table)?;
        let mut rows = self.load(&path)?;
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        if rows.len() == before {
            return Err(Self::not_found(table, id));
        }

        self.rewrite(&path, &rows)?;
        debug!("Deleted row {} from {}", id, table);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
