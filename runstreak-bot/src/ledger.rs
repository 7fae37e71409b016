//! Ledger and its durable store
//!
//! The ledger is kept sorted by `activity_at` at all times; the timestamp is
//! the dedup key, so merging a record twice is a no-op. Entry `i` of the
//! ledger corresponds to challenge day `i + 1`.

use crate::error::Result;
use chrono::NaiveDateTime;
use runstreak_common::ActivityRecord;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Ordered set of activity records keyed by `activity_at`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: BTreeMap<NaiveDateTime, ActivityRecord>,
}

impl Ledger {
    /// Empty ledger (day 0 state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record unless one with the same `activity_at` exists
    ///
    /// Returns `true` if the record was new. On a tie the stored copy wins.
    pub fn merge(&mut self, record: ActivityRecord) -> bool {
        match self.records.entry(record.activity_at) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Records in ascending `activity_at` order
    pub fn iter(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.values()
    }

    /// Record covering challenge `day` (1-based, positional)
    pub fn entry_for_day(&self, day: i64) -> Option<&ActivityRecord> {
        let index = usize::try_from(day.checked_sub(1)?).ok()?;
        self.records.values().nth(index)
    }

    /// Whether the ledger has at least `day` entries
    pub fn covers_day(&self, day: i64) -> bool {
        day >= 1 && usize::try_from(day).map_or(false, |d| self.len() >= d)
    }

    /// Sum of distances over days `1..=day`
    pub fn total_distance_through(&self, day: i64) -> f64 {
        let take = usize::try_from(day.max(0)).unwrap_or(usize::MAX);
        self.records.values().take(take).map(|r| r.distance_km).sum()
    }

    /// Sum of distances over the whole ledger
    pub fn total_distance(&self) -> f64 {
        self.records.values().map(|r| r.distance_km).sum()
    }

    /// Sum of durations over the whole ledger
    pub fn total_duration_sec(&self) -> u64 {
        self.records.values().map(|r| r.duration_sec).sum()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&ActivityRecord> {
        self.records.values().next_back()
    }
}

impl FromIterator<ActivityRecord> for Ledger {
    fn from_iter<I: IntoIterator<Item = ActivityRecord>>(iter: I) -> Self {
        let mut ledger = Ledger::new();
        for record in iter {
            ledger.merge(record);
        }
        ledger
    }
}

/// Durable ledger file
///
/// No caching: every load reads the file, so a restarted cycle always sees
/// the last successful save.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, propagating any fault
    ///
    /// A missing file is an empty ledger, not a fault.
    pub fn try_load(&self) -> Result<Ledger> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Ledger file absent, starting empty");
                return Ok(Ledger::new());
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<ActivityRecord> = serde_json::from_str(&content)?;
        Ok(records.into_iter().collect())
    }

    /// Read the ledger, degrading to empty on any fault
    pub fn load(&self) -> Ledger {
        match self.try_load() {
            Ok(ledger) => ledger,
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    "Ledger unreadable, continuing with an empty ledger: {}", e
                );
                Ledger::new()
            }
        }
    }

    /// Overwrite the ledger file atomically
    ///
    /// Writes a `.tmp` sibling and renames it over the target, so a reader
    /// sees either the old or the new file.
    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let records: Vec<&ActivityRecord> = ledger.iter().collect();
        let json = serde_json::to_string_pretty(&records)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), records = ledger.len(), "Ledger saved");
        Ok(())
    }
}
