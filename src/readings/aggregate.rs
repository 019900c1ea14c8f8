//! Summation windows and bucketed time series
//!
//! Both operations are pure over a slice of raw records and skip records
//! that fail normalization one by one.

use super::normalize::{RawReading, Reading, normalize_all};
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Granularity of the statistics time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Interval {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
    /// One bucket per distinct timestamp
    Raw,
}

impl Interval {
    /// Parse a label; unknown labels mean no truncation
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "hourly" => Interval::Hourly,
            "daily" => Interval::Daily,
            "weekly" => Interval::Weekly,
            "monthly" => Interval::Monthly,
            _ => Interval::Raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Hourly => "hourly",
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
            Interval::Raw => "raw",
        }
    }

    /// Start of the bucket `ts` falls in
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Interval::Hourly => ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            Interval::Daily => start_of_day(ts),
            Interval::Weekly => start_of_day(ts)
                .checked_sub_signed(Duration::days(i64::from(
                    ts.weekday().num_days_from_monday(),
                )))
                .unwrap_or(ts),
            Interval::Monthly => start_of_day(ts).with_day(1).unwrap_or(ts),
            Interval::Raw => ts,
        }
    }
}

impl From<String> for Interval {
    fn from(label: String) -> Self {
        Interval::from_label(&label)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn start_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&ts.date_naive().and_time(NaiveTime::MIN))
}

/// Calendar-window totals as of one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summations {
    pub statistics_yesterday: f64,
    pub statistics_week: f64,
    pub statistics_month: f64,
    pub statistics_year: f64,
}

impl Summations {
    /// Sum already-normalized readings into the four windows around `now`
    ///
    /// Yesterday is `[yesterday 00:00, today 00:00)`. Week, month and year
    /// start at Monday 00:00, the 1st and January 1st and have no upper
    /// bound.
    pub fn from_readings(readings: &[Reading], now: DateTime<Utc>) -> Self {
        let today = start_of_day(now);
        let yesterday = today - Duration::days(1);
        let week_start = Interval::Weekly.bucket_start(now);
        let month_start = Interval::Monthly.bucket_start(now);
        let year_start = month_start.with_month(1).unwrap_or(month_start);

        let mut totals = Summations::default();
        for r in readings.iter().filter(|r| r.value >= 0.0) {
            if r.timestamp >= yesterday && r.timestamp < today {
                totals.statistics_yesterday += r.value;
            }
            if r.timestamp >= week_start {
                totals.statistics_week += r.value;
            }
            if r.timestamp >= month_start {
                totals.statistics_month += r.value;
            }
            if r.timestamp >= year_start {
                totals.statistics_year += r.value;
            }
        }
        totals
    }
}

/// Summation windows as of the current UTC instant
pub fn extract_summations(records: &[RawReading]) -> Summations {
    extract_summations_at(records, Utc::now())
}

/// Summation windows as of `now`
pub fn extract_summations_at(records: &[RawReading], now: DateTime<Utc>) -> Summations {
    Summations::from_readings(&normalize_all(records), now)
}

/// One time series bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticPoint {
    /// Bucket start, `YYYY-MM-DDTHH:MM:SS[.ffffff]+00:00`
    pub datetime: String,
    pub value: f64,
}

/// Group records into `interval` buckets, ascending by bucket start
pub fn build_timeseries(records: &[RawReading], interval: Interval) -> Vec<StatisticPoint> {
    bucket_readings(&normalize_all(records), interval)
}

/// Bucket already-normalized readings
pub fn bucket_readings(readings: &[Reading], interval: Interval) -> Vec<StatisticPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for r in readings.iter().filter(|r| r.value >= 0.0) {
        *buckets.entry(interval.bucket_start(r.timestamp)).or_insert(0.0) += r.value;
    }
    buckets
        .into_iter()
        .map(|(start, total)| StatisticPoint {
            datetime: isoformat(start),
            value: round3(total),
        })
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// ISO-8601 with an explicit `+00:00` offset; microseconds only when non-zero
pub fn isoformat(ts: DateTime<Utc>) -> String {
    let micros = ts.timestamp_subsec_micros();
    if micros == 0 {
        format!("{}+00:00", ts.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        format!("{}.{:06}+00:00", ts.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}
