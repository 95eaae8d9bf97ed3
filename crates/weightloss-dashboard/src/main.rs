mod bootstrap;

use std::io::Write;

use anyhow::{Context, Result};
use dashboard_core::models::{BodyweightEntry, CyclingSession, EventKind};
use dashboard_core::settings::{Command, Settings};
use dashboard_core::time_utils::TimezoneHandler;
use dashboard_data::aggregator::Window;
use dashboard_data::cycling_import::import_cycling_csv;
use dashboard_data::dashboard::{build_dashboard, ChartSelection, DashboardQuery};
use dashboard_data::food_log::{FoodLogger, LocalNutrientTable};
use dashboard_data::ingest::StoreEventSource;
use dashboard_data::store::{to_row, EventStore, JsonlStore};

/// Per-100 g nutrient table read by `add-food` and `update-food`.
const NUTRIENT_TABLE: &str = "nutrients.json";

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();
    let data_dir = settings.resolved_data_dir();

    bootstrap::ensure_directories(&data_dir)?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Weightloss dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Granularity: {}, Chart: {}, Timezone: {}, Data: {}",
        settings.granularity,
        settings.chart,
        settings.timezone,
        data_dir.display()
    );

    let timezone = TimezoneHandler::new(&settings.timezone);
    let store = JsonlStore::new(&data_dir);
    let mut out = std::io::stdout().lock();

    match settings.command.clone() {
        Some(command) => run_command(command, &store, timezone, &mut out),
        None => print_dashboard(&settings, &store, timezone, &mut out),
    }
}

/// Build the selected charts and write them as pretty JSON.
fn print_dashboard(
    settings: &Settings,
    store: &JsonlStore,
    timezone: TimezoneHandler,
    out: &mut impl Write,
) -> Result<()> {
    let selection: ChartSelection = settings.chart.parse()?;
    let query = DashboardQuery {
        window: Window::new(settings.start, settings.end),
        granularity: settings.granularity(),
        timezone,
    };

    let source = StoreEventSource::new(store, timezone);
    let report = build_dashboard(&source, &query, selection)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn nutrient_table(store: &JsonlStore) -> Result<LocalNutrientTable> {
    let path = store.dir().join(NUTRIENT_TABLE);
    LocalNutrientTable::load(&path)
        .with_context(|| format!("nutrient table required at {}", path.display()))
}

/// Execute a record-management subcommand.
fn run_command(
    command: Command,
    store: &JsonlStore,
    timezone: TimezoneHandler,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::AddFood {
            name,
            quantity,
            timestamp,
        } => {
            let table = nutrient_table(store)?;
            let timestamp = timestamp
                .map(|t| timezone.parse_timestamp(&t))
                .transpose()?;
            let id = FoodLogger::new(&table, store, timezone).log_food(&name, &quantity, timestamp)?;
            writeln!(out, "Created {} row {}", EventKind::Food.table(), id)?;
        }
        Command::UpdateFood {
            id,
            name,
            serving_size,
            timestamp,
        } => {
            let table = nutrient_table(store)?;
            let timestamp = timestamp
                .map(|t| timezone.parse_timestamp(&t))
                .transpose()?;
            FoodLogger::new(&table, store, timezone).modify_food(
                id,
                name.as_deref(),
                serving_size,
                timestamp,
            )?;
            writeln!(out, "Updated {} row {}", EventKind::Food.table(), id)?;
        }
        Command::AddWeight { date, bodyweight } => {
            let entry = BodyweightEntry {
                id: None,
                date,
                bodyweight,
            };
            let id = store.create(EventKind::Bodyweight.table(), to_row(&entry)?)?;
            writeln!(out, "Created {} row {}", EventKind::Bodyweight.table(), id)?;
        }
        Command::UpdateWeight {
            id,
            date,
            bodyweight,
        } => {
            let entry = BodyweightEntry {
                id: Some(id),
                date,
                bodyweight,
            };
            store.update(EventKind::Bodyweight.table(), id, to_row(&entry)?)?;
            writeln!(out, "Updated {} row {}", EventKind::Bodyweight.table(), id)?;
        }
        Command::AddCycling {
            timestamp,
            calories,
            duration,
            name,
        } => {
            let session = CyclingSession {
                id: None,
                timestamp: timezone.parse_timestamp(&timestamp)?,
                calories: Some(calories),
                duration: Some(duration),
                name_of_session: name,
            };
            let id = store.create(EventKind::Cycling.table(), to_row(&session)?)?;
            writeln!(out, "Created {} row {}", EventKind::Cycling.table(), id)?;
        }
        Command::ImportCycling { path } => {
            let ids = import_cycling_csv(store, &path, &timezone)?;
            writeln!(
                out,
                "Imported {} rows into {}",
                ids.len(),
                EventKind::Cycling.table()
            )?;
        }
        Command::List { table: Some(table) } => {
            for row in store.read_all(&table)? {
                writeln!(out, "{}", serde_json::to_string(&row)?)?;
            }
        }
        Command::List { table: None } => {
            for table in store.tables() {
                let rows = store.read_all(&table)?.len();
                writeln!(out, "{table}\t{rows}")?;
            }
        }
        Command::Delete { table, id } => {
            store.delete(&table, id)?;
            tracing::info!("Deleted {} row {}", table, id);
            writeln!(out, "Deleted {} row {}", table, id)?;
        }
    }
    Ok(())
}
