//! Date-window filtering, bucket aggregation and weekly/monthly rollups.
//!
//! All functions are pure: they read a snapshot of samples and return new
//! maps keyed by date. `BTreeMap` keeps every output sorted by date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::BodyweightEntry;
use dashboard_core::periods::Granularity;
use dashboard_core::time_utils::{DayBand, TimezoneHandler};

/// Summed measure per date.
pub type DailyTotals = BTreeMap<NaiveDate, f64>;
/// Summed measure per band; always holds all four bands.
pub type BandTotals = BTreeMap<DayBand, f64>;
/// Per-band totals per date.
pub type DailyBandTotals = BTreeMap<NaiveDate, BandTotals>;

// ── Sample ────────────────────────────────────────────────────────────────────

/// One measure value placed on a logical date and, for timestamped events,
/// a day band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub date: NaiveDate,
    pub band: Option<DayBand>,
    /// `None` when the record did not carry the measure.
    pub value: Option<f64>,
}

/// Records that carry a calendar date for window filtering.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for Sample {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for BodyweightEntry {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Place timestamped records on their logical day and band.
///
/// `timestamp` and `value` pick the instant and the measure out of each
/// record; both the date and the band come from the same
/// [`TimezoneHandler::logical_day`] call.
pub fn classify<T>(
    records: &[T],
    tz: &TimezoneHandler,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
    value: impl Fn(&T) -> Option<f64>,
) -> Vec<Sample> {
    records
        .iter()
        .map(|record| {
            let (date, band) = tz.logical_day(timestamp(record));
            Sample {
                date,
                band: Some(band),
                value: value(record),
            }
        })
        .collect()
}

// ── Window ────────────────────────────────────────────────────────────────────

/// Inclusive date range; an absent bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Window {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Records whose date lies inside `window`, in their original order.
///
/// A window with `start > end` matches nothing.
pub fn filter_by_date<T: Dated + Clone>(records: &[T], window: Window) -> Vec<T> {
    records
        .iter()
        .filter(|r| window.contains(r.date()))
        .cloned()
        .collect()
}

// ── Bucket aggregation ────────────────────────────────────────────────────────

/// A sample's value for summation: absent counts as zero, non-finite aborts.
fn summable(field: &str, value: Option<f64>) -> Result<f64> {
    match value {
        None => Ok(0.0),
        Some(x) if x.is_finite() => Ok(x),
        Some(x) => Err(DashboardError::data_type(field, x)),
    }
}

/// Generic group-by-key summation driver.
fn aggregate_by<K: Ord>(
    samples: &[Sample],
    field: &str,
    key_fn: impl Fn(&Sample) -> Result<K>,
) -> Result<BTreeMap<K, f64>> {
    let mut map: BTreeMap<K, f64> = BTreeMap::new();
    for sample in samples {
        let value = summable(field, sample.value)?;
        *map.entry(key_fn(sample)?).or_insert(0.0) += value;
    }
    Ok(map)
}

/// Sum `field` per date.
pub fn aggregate_daily(samples: &[Sample], field: &str) -> Result<DailyTotals> {
    aggregate_by(samples, field, |s| Ok(s.date))
}

/// Sum `field` per date and band, filling absent bands with zero.
///
/// Every sample must carry a band.
pub fn aggregate_daily_by_band(samples: &[Sample], field: &str) -> Result<DailyBandTotals> {
    let sums = aggregate_by(samples, field, |s| {
        s.band
            .map(|band| (s.date, band))
            .ok_or_else(|| DashboardError::missing_field(field, s.date, "band"))
    })?;

    let mut out = DailyBandTotals::new();
    for ((date, band), total) in sums {
        *out.entry(date).or_insert_with(empty_bands).entry(band).or_insert(0.0) += total;
    }
    Ok(out)
}

fn empty_bands() -> BandTotals {
    DayBand::ALL.iter().map(|&b| (b, 0.0)).collect()
}

// ── Rollup ────────────────────────────────────────────────────────────────────

/// How values falling into one coarser bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupPolicy {
    /// Sum, then divide by the number of distinct days that had data.
    AdditiveRate,
    /// Arithmetic mean of the contributing values.
    Mean,
}

/// Combine `(date, value)` pairs into buckets of `granularity`.
///
/// Keys of the result are bucket start dates. A bucket exists only if at
/// least one pair fell into it, so neither policy divides by zero.
pub fn rollup(
    values: impl IntoIterator<Item = (NaiveDate, f64)>,
    granularity: Granularity,
    policy: RollupPolicy,
) -> DailyTotals {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize, BTreeSet<NaiveDate>)> = BTreeMap::new();
    for (date, value) in values {
        let (sum, count, days) = buckets
            .entry(granularity.bucket_start(date))
            .or_insert_with(|| (0.0, 0, BTreeSet::new()));
        *sum += value;
        *count += 1;
        days.insert(date);
    }

    buckets
        .into_iter()
        .map(|(start, (sum, count, days))| {
            let divisor = match policy {
                RollupPolicy::AdditiveRate => days.len(),
                RollupPolicy::Mean => count,
            };
            (start, sum / divisor as f64)
        })
        .collect()
}

/// Roll daily per-band totals up with the additive-rate policy.
///
/// Each band's bucket sum is divided by the number of days present in the
/// bucket, so a day contributes to the divisor once regardless of band.
pub fn rollup_bands(daily: &DailyBandTotals, granularity: Granularity) -> DailyBandTotals {
    if granularity == Granularity::Daily {
        return daily.clone();
    }

    let mut buckets: BTreeMap<NaiveDate, (BandTotals, usize)> = BTreeMap::new();
    for (date, bands) in daily {
        let (sums, days) = buckets
            .entry(granularity.bucket_start(*date))
            .or_insert_with(|| (empty_bands(), 0));
        for (band, value) in bands {
            *sums.entry(*band).or_insert(0.0) += value;
        }
        *days += 1;
    }

    buckets
        .into_iter()
        .map(|(start, (mut sums, days))| {
            for value in sums.values_mut() {
                *value /= days as f64;
            }
            (start, sums)
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_sample(d: NaiveDate, band: DayBand, value: Option<f64>) -> Sample {
        Sample {
            date: d,
            band: Some(band),
            value,
        }
    }

    // ── classify ──────────────────────────────────────────────────────────────

    #[test]
    fn test_classify_late_night_events_share_a_day() {
        let events = vec![
            (Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap(), 500.0),
            (Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap(), 300.0),
        ];
        let samples = classify(&events, &TimezoneHandler::default(), |e| e.0, |e| Some(e.1));
        let totals = aggregate_daily_by_band(&samples, "calories").unwrap();

        assert_eq!(totals.len(), 1);
        let bands = &totals[&date(2024, 1, 1)];
        assert_eq!(bands[&DayBand::Night], 800.0);
        assert_eq!(bands[&DayBand::Morning], 0.0);
    }

    // ── filter_by_date ────────────────────────────────────────────────────────

    #[test]
    fn test_filter_inclusive_bounds() {
        let samples: Vec<Sample> = (1..=5)
            .map(|d| make_sample(date(2024, 1, d), DayBand::Morning, Some(d as f64)))
            .collect();
        let window = Window::new(Some(date(2024, 1, 2)), Some(date(2024, 1, 4)));
        let kept = filter_by_date(&samples, window);

        let days: Vec<NaiveDate> = kept.iter().map(|s| s.date).collect();
        assert_eq!(days, vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]);
    }

    #[test]
    fn test_filter_start_after_end_is_empty() {
        let samples = vec![make_sample(date(2024, 1, 3), DayBand::Morning, Some(1.0))];
        let window = Window::new(Some(date(2024, 1, 5)), Some(date(2024, 1, 1)));
        assert!(filter_by_date(&samples, window).is_empty());
    }

    #[test]
    fn test_filter_unbounded_keeps_order_and_input() {
        let samples = vec![
            make_sample(date(2024, 1, 9), DayBand::Night, Some(1.0)),
            make_sample(date(2024, 1, 2), DayBand::Morning, Some(2.0)),
        ];
        let snapshot = samples.clone();
        let kept = filter_by_date(&samples, Window::default());
        assert_eq!(kept, snapshot);
        assert_eq!(samples, snapshot);
    }

    #[test]
    fn test_filter_open_ended_start_only() {
        let weights = vec![
            BodyweightEntry {
                id: None,
                date: date(2024, 1, 1),
                bodyweight: 82.0,
            },
            BodyweightEntry {
                id: None,
                date: date(2024, 2, 1),
                bodyweight: 80.0,
            },
        ];
        let kept = filter_by_date(&weights, Window::new(Some(date(2024, 1, 15)), None));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bodyweight, 80.0);
    }

    // ── aggregate_daily ───────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_daily_conserves_total() {
        let samples = vec![
            make_sample(date(2024, 1, 1), DayBand::Morning, Some(400.0)),
            make_sample(date(2024, 1, 1), DayBand::Evening, Some(700.5)),
            make_sample(date(2024, 1, 3), DayBand::Afternoon, Some(250.25)),
            make_sample(date(2024, 1, 3), DayBand::Night, None),
        ];
        let totals = aggregate_daily(&samples, "calories").unwrap();
        let bucketed: f64 = totals.values().sum();
        let raw: f64 = samples.iter().filter_map(|s| s.value).sum();

        assert!((bucketed - raw).abs() < 1e-9);
        assert_eq!(totals[&date(2024, 1, 1)], 1100.5);
    }

    #[test]
    fn test_aggregate_missing_value_counts_as_zero() {
        let samples = vec![make_sample(date(2024, 1, 1), DayBand::Morning, None)];
        let totals = aggregate_daily(&samples, "calories").unwrap();
        assert_eq!(totals[&date(2024, 1, 1)], 0.0);
    }

    #[test]
    fn test_aggregate_non_finite_value_aborts() {
        let samples = vec![
            make_sample(date(2024, 1, 1), DayBand::Morning, Some(100.0)),
            make_sample(date(2024, 1, 2), DayBand::Morning, Some(f64::NAN)),
        ];
        let err = aggregate_daily(&samples, "calories").unwrap_err();
        assert!(matches!(err, DashboardError::DataType { .. }));
    }

    #[test]
    fn test_aggregate_by_band_fills_all_bands() {
        let samples = vec![
            make_sample(date(2024, 1, 1), DayBand::Afternoon, Some(600.0)),
            make_sample(date(2024, 1, 2), DayBand::Morning, Some(300.0)),
        ];
        let totals = aggregate_daily_by_band(&samples, "calories").unwrap();

        for bands in totals.values() {
            assert_eq!(bands.len(), 4);
        }
        assert_eq!(totals[&date(2024, 1, 1)][&DayBand::Afternoon], 600.0);
        assert_eq!(totals[&date(2024, 1, 1)][&DayBand::Night], 0.0);
    }

    #[test]
    fn test_aggregate_by_band_requires_band() {
        let samples = vec![Sample {
            date: date(2024, 1, 1),
            band: None,
            value: Some(1.0),
        }];
        assert!(matches!(
            aggregate_daily_by_band(&samples, "calories"),
            Err(DashboardError::MissingField { .. })
        ));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let samples = vec![
            make_sample(date(2024, 1, 1), DayBand::Morning, Some(100.0)),
            make_sample(date(2024, 1, 2), DayBand::Night, Some(200.0)),
        ];
        let window = Window::new(Some(date(2024, 1, 1)), None);
        let first = aggregate_daily_by_band(&filter_by_date(&samples, window), "calories").unwrap();
        let second = aggregate_daily_by_band(&filter_by_date(&samples, window), "calories").unwrap();
        assert_eq!(first, second);
    }

    // ── rollup ────────────────────────────────────────────────────────────────

    #[test]
    fn test_weekly_additive_rate_divides_by_logged_days() {
        // Mon 2024-01-01 .. Sun 2024-01-07, logged on Mon, Wed and Fri only.
        let daily: DailyTotals = [
            (date(2024, 1, 1), 2000.0),
            (date(2024, 1, 3), 1800.0),
            (date(2024, 1, 5), 2200.0),
        ]
        .into_iter()
        .collect();

        let weekly = rollup(daily, Granularity::Weekly, RollupPolicy::AdditiveRate);
        assert_eq!(weekly.len(), 1);
        assert!((weekly[&date(2024, 1, 1)] - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_weekly_boundary_sample_belongs_to_week_it_starts() {
        let daily: DailyTotals = [
            (date(2024, 1, 7), 1000.0), // Sunday
            (date(2024, 1, 8), 3000.0), // Monday
        ]
        .into_iter()
        .collect();

        let weekly = rollup(daily, Granularity::Weekly, RollupPolicy::AdditiveRate);
        assert_eq!(weekly[&date(2024, 1, 1)], 1000.0);
        assert_eq!(weekly[&date(2024, 1, 8)], 3000.0);
    }

    #[test]
    fn test_monthly_additive_rate_keys_on_first_day() {
        let daily: DailyTotals = [
            (date(2024, 2, 10), 1500.0),
            (date(2024, 2, 20), 2500.0),
            (date(2024, 3, 1), 1800.0),
        ]
        .into_iter()
        .collect();

        let monthly = rollup(daily, Granularity::Monthly, RollupPolicy::AdditiveRate);
        assert_eq!(monthly[&date(2024, 2, 1)], 2000.0);
        assert_eq!(monthly[&date(2024, 3, 1)], 1800.0);
    }

    #[test]
    fn test_mean_policy_counts_every_sample() {
        // Two samples on one day: mean uses both, additive-rate sums per day.
        let samples = vec![
            (date(2024, 1, 1), 82.0),
            (date(2024, 1, 1), 81.0),
            (date(2024, 1, 4), 80.0),
        ];

        let mean = rollup(samples.clone(), Granularity::Weekly, RollupPolicy::Mean);
        assert!((mean[&date(2024, 1, 1)] - 81.0).abs() < 1e-9);

        let rate = rollup(samples, Granularity::Weekly, RollupPolicy::AdditiveRate);
        assert!((rate[&date(2024, 1, 1)] - 121.5).abs() < 1e-9);
    }

    #[test]
    fn test_daily_mean_rollup_averages_same_day_samples() {
        let samples = vec![(date(2024, 1, 1), 82.0), (date(2024, 1, 1), 81.0)];
        let daily = rollup(samples, Granularity::Daily, RollupPolicy::Mean);
        assert_eq!(daily[&date(2024, 1, 1)], 81.5);
    }

    #[test]
    fn test_rollup_empty_input_has_no_buckets() {
        let out = rollup(Vec::new(), Granularity::Monthly, RollupPolicy::Mean);
        assert!(out.is_empty());
    }

    #[test]
    fn test_rollup_bands_divides_each_band_by_days_present() {
        let samples = vec![
            make_sample(date(2024, 1, 1), DayBand::Morning, Some(600.0)),
            make_sample(date(2024, 1, 1), DayBand::Evening, Some(1400.0)),
            make_sample(date(2024, 1, 3), DayBand::Morning, Some(400.0)),
            make_sample(date(2024, 1, 3), DayBand::Night, Some(1400.0)),
        ];
        let daily = aggregate_daily_by_band(&samples, "calories").unwrap();
        let weekly = rollup_bands(&daily, Granularity::Weekly);

        let week = &weekly[&date(2024, 1, 1)];
        assert_eq!(week[&DayBand::Morning], 500.0);
        assert_eq!(week[&DayBand::Afternoon], 0.0);
        assert_eq!(week[&DayBand::Evening], 700.0);
        assert_eq!(week[&DayBand::Night], 700.0);
        let total: f64 = week.values().sum();
        assert!((total - 1900.0).abs() < 1e-9);
    }

    #[test]
    fn test_rollup_bands_daily_is_identity() {
        let samples = vec![make_sample(date(2024, 1, 1), DayBand::Morning, Some(10.0))];
        let daily = aggregate_daily_by_band(&samples, "calories").unwrap();
        assert_eq!(rollup_bands(&daily, Granularity::Daily), daily);
    }
}
