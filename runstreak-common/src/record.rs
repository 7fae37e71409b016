//! Activity record model
//!
//! On disk a record is the 4-tuple
//! `[recorded_at, activity_at, distance_km, duration_sec]` with timestamps in
//! [`TIMESTAMP_FORMAT`], which sorts lexicographically in time order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Persisted timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordRow", into = "RecordRow")]
pub struct ActivityRecord {
    /// When the record was ingested (informational only)
    pub recorded_at: NaiveDateTime,
    /// When the run happened; unique within a ledger
    pub activity_at: NaiveDateTime,
    /// Distance in kilometres
    pub distance_km: f64,
    /// Moving time in seconds
    pub duration_sec: u64,
}

impl ActivityRecord {
    /// Build a record, rejecting negative or non-finite distances
    pub fn new(
        recorded_at: NaiveDateTime,
        activity_at: NaiveDateTime,
        distance_km: f64,
        duration_sec: u64,
    ) -> crate::Result<Self> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(crate::Error::InvalidInput(format!(
                "distance must be a non-negative number, got {}",
                distance_km
            )));
        }
        Ok(Self {
            recorded_at,
            activity_at,
            distance_km,
            duration_sec,
        })
    }

    /// Average pace in seconds per kilometre, if any distance was covered
    pub fn pace_sec_per_km(&self) -> Option<f64> {
        (self.distance_km > 0.0).then(|| self.duration_sec as f64 / self.distance_km)
    }
}

/// Wire shape of a record
#[derive(Serialize, Deserialize)]
struct RecordRow(
    #[serde(with = "timestamp")] NaiveDateTime,
    #[serde(with = "timestamp")] NaiveDateTime,
    f64,
    u64,
);

impl TryFrom<RecordRow> for ActivityRecord {
    type Error = crate::Error;

    fn try_from(row: RecordRow) -> crate::Result<Self> {
        ActivityRecord::new(row.0, row.1, row.2, row.3)
    }
}

impl From<ActivityRecord> for RecordRow {
    fn from(record: ActivityRecord) -> Self {
        RecordRow(
            record.recorded_at,
            record.activity_at,
            record.distance_km,
            record.duration_sec,
        )
    }
}

/// Serde adapter for [`TIMESTAMP_FORMAT`] timestamps
pub mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(de::Error::custom)
    }
}
