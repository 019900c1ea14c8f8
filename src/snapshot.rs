//! Per-poll result structures

use crate::readings::{
    Interval, RawReading, StatisticPoint, Summations, bucket_readings, normalize_all,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metered utility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Utility {
    Water,
    Heating,
}

impl Utility {
    pub const ALL: [Utility; 2] = [Utility::Water, Utility::Heating];

    pub fn as_str(&self) -> &'static str {
        match self {
            Utility::Water => "water",
            Utility::Heating => "heating",
        }
    }

    /// Unit of the values reported for this utility
    pub fn unit(&self) -> &'static str {
        match self {
            Utility::Water => "m³",
            Utility::Heating => "MWh",
        }
    }
}

impl std::fmt::Display for Utility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates of one utility for one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilitySnapshot {
    #[serde(flatten)]
    pub summations: Summations,
    pub statistics: Vec<StatisticPoint>,
}

impl UtilitySnapshot {
    /// Aggregate raw records as of `now`
    pub fn from_records(records: &[RawReading], interval: Interval, now: DateTime<Utc>) -> Self {
        let readings = normalize_all(records);
        Self {
            summations: Summations::from_readings(&readings, now),
            statistics: bucket_readings(&readings, interval),
        }
    }

    /// Value of the most recent bucket, 0.0 without data
    pub fn latest(&self) -> f64 {
        self.statistics.last().map(|p| p.value).unwrap_or(0.0)
    }
}

/// Both utilities for one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub water: UtilitySnapshot,
    pub heating: UtilitySnapshot,
}

impl Snapshot {
    pub fn get(&self, utility: Utility) -> &UtilitySnapshot {
        match utility {
            Utility::Water => &self.water,
            Utility::Heating => &self.heating,
        }
    }
}
