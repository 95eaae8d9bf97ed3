//! Dashboard pipeline: read events, bucket them and assemble chart data.
//!
//! Given a snapshot from an [`EventSource`] and a [`DashboardQuery`], builds a
//! [`DashboardReport`] that serializes to JSON for an external renderer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{BodyweightEntry, CyclingSession, FoodEntry, FoodMeasure};
use dashboard_core::periods::Granularity;
use dashboard_core::time_utils::{DayBand, TimezoneHandler};
use serde::Serialize;
use tracing::info;

use crate::aggregator::{
    aggregate_daily, aggregate_daily_by_band, classify, filter_by_date, rollup, rollup_bands,
    DailyBandTotals, DailyTotals, RollupPolicy, Window,
};
use crate::ingest::EventSource;
use crate::macros::{combine, normalize, MacroShares};

// ── Query ─────────────────────────────────────────────────────────────────────

/// Parameters of one dashboard request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardQuery {
    pub window: Window,
    pub granularity: Granularity,
    pub timezone: TimezoneHandler,
}

/// Which charts to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartSelection {
    Calories,
    Macros,
    Weight,
    Cycling,
    #[default]
    All,
}

impl ChartSelection {
    fn wants(self, chart: ChartSelection) -> bool {
        self == ChartSelection::All || self == chart
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartSelection::Calories => "calories",
            ChartSelection::Macros => "macros",
            ChartSelection::Weight => "weight",
            ChartSelection::Cycling => "cycling",
            ChartSelection::All => "all",
        }
    }
}

impl fmt::Display for ChartSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartSelection {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "calories" => Ok(ChartSelection::Calories),
            "macros" => Ok(ChartSelection::Macros),
            "weight" | "bodyweight" => Ok(ChartSelection::Weight),
            "cycling" => Ok(ChartSelection::Cycling),
            "all" => Ok(ChartSelection::All),
            other => Err(DashboardError::Config(format!("unknown chart: {other}"))),
        }
    }
}

// ── Bucketing per chart ───────────────────────────────────────────────────────

/// Calories per bucket and day band.
pub fn calorie_buckets(food: &[FoodEntry], query: &DashboardQuery) -> Result<DailyBandTotals> {
    let samples = classify(food, &query.timezone, |e| e.timestamp, |e| e.calories);
    let in_window = filter_by_date(&samples, query.window);
    let daily = aggregate_daily_by_band(&in_window, FoodMeasure::Calories.field())?;
    Ok(rollup_bands(&daily, query.granularity))
}

fn food_measure_buckets(
    food: &[FoodEntry],
    query: &DashboardQuery,
    measure: FoodMeasure,
) -> Result<DailyTotals> {
    let samples = classify(food, &query.timezone, |e| e.timestamp, |e| measure.of(e));
    let in_window = filter_by_date(&samples, query.window);
    let daily = aggregate_daily(&in_window, measure.field())?;
    Ok(rollup(daily, query.granularity, RollupPolicy::AdditiveRate))
}

/// Macro shares per bucket. Buckets with no macro grams are left out.
///
/// Gram sums are rolled up with the additive-rate policy before the shares
/// are taken; shares do not depend on that scale.
pub fn macro_buckets(
    food: &[FoodEntry],
    query: &DashboardQuery,
) -> Result<BTreeMap<NaiveDate, MacroShares>> {
    let carbohydrates = food_measure_buckets(food, query, FoodMeasure::Carbohydrates)?;
    let fat = food_measure_buckets(food, query, FoodMeasure::Fat)?;
    let protein = food_measure_buckets(food, query, FoodMeasure::Protein)?;
    Ok(normalize(&combine(&carbohydrates, &fat, &protein)))
}

/// Mean bodyweight per bucket. Daily buckets average same-day samples.
pub fn weight_buckets(weights: &[BodyweightEntry], query: &DashboardQuery) -> Result<DailyTotals> {
    let in_window = filter_by_date(weights, query.window);
    if let Some(bad) = in_window.iter().find(|w| !w.bodyweight.is_finite()) {
        return Err(DashboardError::data_type("bodyweight", bad.bodyweight));
    }
    Ok(rollup(
        in_window.iter().map(|w| (w.date, w.bodyweight)),
        query.granularity,
        RollupPolicy::Mean,
    ))
}

/// Cycling minutes per bucket.
pub fn cycling_buckets(sessions: &[CyclingSession], query: &DashboardQuery) -> Result<DailyTotals> {
    let samples = classify(sessions, &query.timezone, |s| s.timestamp, |s| s.duration);
    let in_window = filter_by_date(&samples, query.window);
    let daily = aggregate_daily(&in_window, "duration")?;
    Ok(rollup(daily, query.granularity, RollupPolicy::AdditiveRate))
}

// ── Chart types ───────────────────────────────────────────────────────────────

/// One named series of y-values aligned with a chart's x-axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedBarChart {
    pub title: String,
    pub x: Vec<NaiveDate>,
    pub series: Vec<Series>,
    /// Per-bucket totals rounded to one decimal, for bar annotations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub x: Vec<NaiveDate>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub x: Vec<NaiveDate>,
    pub y: Vec<f64>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Stacked calories by day band, bands in fixed order.
pub fn calorie_chart(buckets: &DailyBandTotals, granularity: Granularity) -> StackedBarChart {
    let series = DayBand::ALL
        .iter()
        .map(|band| Series {
            name: band.label().to_string(),
            values: buckets
                .values()
                .map(|bands| bands.get(band).copied().unwrap_or(0.0))
                .collect(),
        })
        .collect();

    StackedBarChart {
        title: format!("Calories per {} bucket", granularity),
        x: buckets.keys().copied().collect(),
        series,
        totals: buckets
            .values()
            .map(|bands| round1(bands.values().sum()))
            .collect(),
    }
}

/// Stacked macro shares in percent.
pub fn macro_chart(
    shares: &BTreeMap<NaiveDate, MacroShares>,
    granularity: Granularity,
) -> StackedBarChart {
    let column = |name: &str, pick: fn(&MacroShares) -> f64| Series {
        name: name.to_string(),
        values: shares.values().map(pick).collect(),
    };

    StackedBarChart {
        title: format!("Macronutrient share per {} bucket", granularity),
        x: shares.keys().copied().collect(),
        series: vec![
            column("carbohydrates", |s| s.carbohydrates),
            column("fat", |s| s.fat),
            column("protein", |s| s.protein),
        ],
        totals: Vec::new(),
    }
}

pub fn weight_chart(buckets: &DailyTotals, granularity: Granularity) -> LineChart {
    LineChart {
        title: format!("Bodyweight ({})", granularity),
        x: buckets.keys().copied().collect(),
        y: buckets.values().copied().collect(),
    }
}

pub fn cycling_chart(buckets: &DailyTotals, granularity: Granularity) -> BarChart {
    BarChart {
        title: format!("Cycling minutes per {} bucket", granularity),
        x: buckets.keys().copied().collect(),
        y: buckets.values().copied().collect(),
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Metadata produced alongside the charts.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    pub granularity: Granularity,
    pub timezone: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub food_entries: usize,
    pub bodyweight_entries: usize,
    pub cycling_sessions: usize,
}

/// Chart data for one dashboard request. Charts not selected are absent.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: DashboardMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<StackedBarChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<StackedBarChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<LineChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycling: Option<BarChart>,
}

/// Run the full pipeline over one snapshot of `source`.
///
/// Only the event kinds needed by `selection` are read. Any ingestion or
/// aggregation error aborts the whole request.
pub fn build_dashboard<S: EventSource + ?Sized>(
    source: &S,
    query: &DashboardQuery,
    selection: ChartSelection,
) -> Result<DashboardReport> {
    let granularity = query.granularity;

    let food = if selection.wants(ChartSelection::Calories) || selection.wants(ChartSelection::Macros)
    {
        source.read_food()?
    } else {
        Vec::new()
    };
    let weights = if selection.wants(ChartSelection::Weight) {
        source.read_bodyweight()?
    } else {
        Vec::new()
    };
    let sessions = if selection.wants(ChartSelection::Cycling) {
        source.read_cycling()?
    } else {
        Vec::new()
    };

    info!(
        "Building {} dashboard: {} food, {} bodyweight, {} cycling records",
        granularity,
        food.len(),
        weights.len(),
        sessions.len()
    );

    let calories = if selection.wants(ChartSelection::Calories) {
        Some(calorie_chart(&calorie_buckets(&food, query)?, granularity))
    } else {
        None
    };
    let macros = if selection.wants(ChartSelection::Macros) {
        Some(macro_chart(&macro_buckets(&food, query)?, granularity))
    } else {
        None
    };
    let weight = if selection.wants(ChartSelection::Weight) {
        Some(weight_chart(&weight_buckets(&weights, query)?, granularity))
    } else {
        None
    };
    let cycling = if selection.wants(ChartSelection::Cycling) {
        Some(cycling_chart(&cycling_buckets(&sessions, query)?, granularity))
    } else {
        None
    };

    let metadata = DashboardMetadata {
        generated_at: Utc::now().to_rfc3339(),
        granularity,
        timezone: query.timezone.tz().name().to_string(),
        start: query.window.start,
        end: query.window.end,
        food_entries: food.len(),
        bodyweight_entries: weights.len(),
        cycling_sessions: sessions.len(),
    };

    Ok(DashboardReport {
        metadata,
        calories,
        macros,
        weight,
        cycling,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
