//! Harvest coordinator
//!
//! Pulls the records the ledger does not know yet and merges them in. The
//! fetch window re-requests the last known day, and correctness rests only
//! on the `activity_at` dedup key, so re-running a harvest from the same or
//! an earlier window never produces duplicates.
//!
//! The ledger is saved once per harvest. If the source fails part-way, the
//! records merged so far are saved before the error is returned.

use crate::collaborators::ActivitySource;
use crate::error::{Error, Result};
use crate::ledger::{Ledger, LedgerStore};
use chrono::NaiveDate;
use futures::StreamExt;
use runstreak_common::{current_day, harvest_window_start, Clock};
use std::sync::Arc;
use tracing::{info, warn};

/// What a harvest did
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestOutcome {
    /// Today is before the challenge start
    NotStarted { day: i64 },
    /// Ledger already has an entry for every elapsed day
    UpToDate { day: i64, records: usize },
    /// Source was queried and the ledger saved
    Harvested {
        day: i64,
        window_start: NaiveDate,
        accepted: usize,
        duplicates: usize,
        records: usize,
    },
}

impl std::fmt::Display for HarvestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestOutcome::NotStarted { day } => write!(f, "challenge not started (day {})", day),
            HarvestOutcome::UpToDate { day, records } => {
                write!(f, "up to date on day {} ({} records)", day, records)
            }
            HarvestOutcome::Harvested {
                window_start,
                accepted,
                duplicates,
                records,
                ..
            } => write!(
                f,
                "fetched since {}: {} new, {} known, {} records total",
                window_start, accepted, duplicates, records
            ),
        }
    }
}

/// Drives the record source and merges into the ledger
pub struct HarvestCoordinator {
    store: LedgerStore,
    source: Arc<dyn ActivitySource>,
    start_day: NaiveDate,
    clock: Arc<dyn Clock>,
}

impl HarvestCoordinator {
    pub fn new(
        store: LedgerStore,
        source: Arc<dyn ActivitySource>,
        start_day: NaiveDate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            source,
            start_day,
            clock,
        }
    }

    /// Bring `ledger` up to date with the record source
    pub async fn sync(&self, ledger: &mut Ledger) -> Result<HarvestOutcome> {
        let day = current_day(self.start_day, self.clock.today());
        if day < 1 {
            return Ok(HarvestOutcome::NotStarted { day });
        }
        if ledger.covers_day(day) {
            return Ok(HarvestOutcome::UpToDate {
                day,
                records: ledger.len(),
            });
        }

        let window_start = harvest_window_start(self.start_day, ledger.len());
        info!(day, records = ledger.len(), %window_start, "Harvesting activity records");

        let mut stream = self.source.fetch(window_start).await?;
        let mut accepted = 0;
        let mut duplicates = 0;
        let mut failure = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => {
                    if ledger.merge(record) {
                        accepted += 1;
                    } else {
                        duplicates += 1;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(stream);

        self.store.save(ledger)?;

        if let Some(e) = failure {
            warn!(accepted, "Record source failed mid-harvest, partial merge saved");
            return Err(Error::Harvest {
                accepted,
                source: Box::new(e),
            });
        }

        info!(accepted, duplicates, records = ledger.len(), "Harvest complete");
        Ok(HarvestOutcome::Harvested {
            day,
            window_start,
            accepted,
            duplicates,
            records: ledger.len(),
        })
    }
}
