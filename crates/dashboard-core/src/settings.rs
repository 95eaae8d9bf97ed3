use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::periods::Granularity;

const APP_DIR: &str = ".weightloss-dashboard";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Nutrition and bodyweight dashboard
#[derive(Parser, Debug, Clone)]
#[command(
    name = "weightloss-dashboard",
    about = "Nutrition and bodyweight dashboard",
    version
)]
pub struct Settings {
    /// Bucket size for the charts
    #[arg(long, default_value = "daily", value_parser = ["daily", "weekly", "monthly"])]
    pub granularity: String,

    /// First logical day to include (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last logical day to include (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Which chart data to emit
    #[arg(long, default_value = "all", value_parser = ["calories", "macros", "weight", "cycling", "all"])]
    pub chart: String,

    /// Reference timezone for day bands (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Directory holding the event tables
    #[arg(long, env = "WEIGHTLOSS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Record-management commands. Without one, chart data is printed.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log a food item, looking its nutrients up in the local nutrient table
    AddFood {
        #[arg(long)]
        name: String,
        /// Amount eaten, e.g. `150g`
        #[arg(long)]
        quantity: String,
        /// When it was eaten; defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Edit a logged food item; a new name or serving size re-looks up nutrients
    UpdateFood {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        /// New serving size in grams
        #[arg(long)]
        serving_size: Option<f64>,
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Record a bodyweight sample
    AddWeight {
        #[arg(long)]
        date: NaiveDate,
        /// Bodyweight in kilograms
        #[arg(long)]
        bodyweight: f64,
    },
    /// Replace an existing bodyweight sample
    UpdateWeight {
        id: i64,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        bodyweight: f64,
    },
    /// Record a cycling session
    AddCycling {
        /// Start time, RFC 3339 or local `YYYY-MM-DDTHH:MM`
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        calories: f64,
        /// Duration in minutes
        #[arg(long)]
        duration: f64,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Import cycling sessions from a CSV export
    /// (`timestamp,calories,duration_in_s,name`)
    ImportCycling { path: PathBuf },
    /// Print all rows of a table as JSON lines, or the stored tables when
    /// no table is given
    List { table: Option<String> },
    /// Delete a row by id
    Delete { table: String, id: i64 },
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.weightloss-dashboard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&home_dir())
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR).join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        if !is_arg_explicitly_set(&matches, "granularity") {
            if let Some(v) = last.granularity {
                settings.granularity = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "chart") {
            if let Some(v) = last.chart {
                settings.chart = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The selected granularity. A persisted value that no longer parses
    /// falls back to daily.
    pub fn granularity(&self) -> Granularity {
        self.granularity.parse().unwrap_or_default()
    }

    /// Data directory, defaulting to `~/.weightloss-dashboard/data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(APP_DIR).join("data"))
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            granularity: Some(s.granularity.clone()),
            timezone: Some(s.timezone.clone()),
            chart: Some(s.chart.clone()),
            data_dir: s.data_dir.clone(),
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        list.iter().map(|s| std::ffi::OsString::from(*s)).collect()
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            granularity: Some("weekly".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            chart: Some("macros".to_string()),
            data_dir: Some(PathBuf::from("/srv/dashboard")),
        };
        params.save_to(&path).expect("save");

        assert_eq!(LastUsedParams::load_from(&path), params);
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert_eq!(loaded, LastUsedParams::default());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["weightloss-dashboard"]);

        assert_eq!(settings.granularity, "daily");
        assert_eq!(settings.granularity(), Granularity::Daily);
        assert_eq!(settings.chart, "all");
        assert_eq!(settings.timezone, "auto");
        assert!(settings.start.is_none());
        assert!(settings.end.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(settings.command.is_none());
    }

    #[test]
    fn test_settings_cli_window() {
        let settings = Settings::parse_from([
            "weightloss-dashboard",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
            "--granularity",
            "weekly",
        ]);
        assert_eq!(settings.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(settings.end, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(settings.granularity(), Granularity::Weekly);
    }

    #[test]
    fn test_settings_rejects_unknown_granularity() {
        let result = Settings::try_parse_from(["weightloss-dashboard", "--granularity", "hourly"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_add_weight_subcommand() {
        let settings = Settings::parse_from([
            "weightloss-dashboard",
            "add-weight",
            "--date",
            "2024-02-03",
            "--bodyweight",
            "81.7",
        ]);
        assert_eq!(
            settings.command,
            Some(Command::AddWeight {
                date: NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
                bodyweight: 81.7,
            })
        );
    }

    #[test]
    fn test_settings_add_food_subcommand() {
        let settings = Settings::parse_from([
            "weightloss-dashboard",
            "add-food",
            "--name",
            "apple",
            "--quantity",
            "150g",
        ]);
        assert_eq!(
            settings.command,
            Some(Command::AddFood {
                name: "apple".to_string(),
                quantity: "150g".to_string(),
                timestamp: None,
            })
        );
    }

    #[test]
    fn test_settings_update_food_subcommand() {
        let settings = Settings::parse_from([
            "weightloss-dashboard",
            "update-food",
            "3",
            "--serving-size",
            "120",
        ]);
        assert_eq!(
            settings.command,
            Some(Command::UpdateFood {
                id: 3,
                name: None,
                serving_size: Some(120.0),
                timestamp: None,
            })
        );
    }

    #[test]
    fn test_settings_list_and_import_subcommands() {
        let settings = Settings::parse_from(["weightloss-dashboard", "list"]);
        assert_eq!(settings.command, Some(Command::List { table: None }));

        let settings = Settings::parse_from(["weightloss-dashboard", "list", "cycling"]);
        assert_eq!(
            settings.command,
            Some(Command::List {
                table: Some("cycling".to_string()),
            })
        );

        let settings =
            Settings::parse_from(["weightloss-dashboard", "import-cycling", "rides.csv"]);
        assert_eq!(
            settings.command,
            Some(Command::ImportCycling {
                path: PathBuf::from("rides.csv"),
            })
        );
    }

    #[test]
    fn test_settings_delete_subcommand() {
        let settings = Settings::parse_from(["weightloss-dashboard", "delete", "cycling", "4"]);
        assert_eq!(
            settings.command,
            Some(Command::Delete {
                table: "cycling".to_string(),
                id: 4,
            })
        );
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_granularity() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            granularity: Some("monthly".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(args(&["weightloss-dashboard"]), &config_path);
        assert_eq!(settings.granularity(), Granularity::Monthly);
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            granularity: Some("monthly".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            args(&["weightloss-dashboard", "--granularity", "weekly"]),
            &config_path,
        );
        assert_eq!(settings.granularity(), Granularity::Weekly);
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            args(&["weightloss-dashboard", "--clear"]),
            &config_path,
        );

        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            args(&["weightloss-dashboard", "--debug", "--timezone", "UTC"]),
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            args(&["weightloss-dashboard", "--chart", "weight", "--timezone", "UTC"]),
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.chart, Some("weight".to_string()));
        assert_eq!(loaded.timezone, Some("UTC".to_string()));
    }

    #[test]
    fn test_resolved_data_dir_prefers_explicit() {
        let settings = Settings::parse_from(["weightloss-dashboard", "--data-dir", "/tmp/wl"]);
        assert_eq!(settings.resolved_data_dir(), PathBuf::from("/tmp/wl"));
    }
}
