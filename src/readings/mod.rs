//! Meter readings: ingestion and aggregation
//!
//! - `normalize`: upstream record shapes into `(timestamp, value)` pairs
//! - `aggregate`: calendar summation windows and bucketed time series

pub mod aggregate;
pub mod normalize;

pub use aggregate::{
    Interval, StatisticPoint, Summations, bucket_readings, build_timeseries, extract_summations,
    extract_summations_at,
};
pub use normalize::{RawReading, Reading, ReadingError, ReadingsPayload, normalize_all};
