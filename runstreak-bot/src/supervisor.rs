//! Supervisor loop
//!
//! Runs harvest, create and publish once per interval, forever. Each cycle
//! produces a structured [`CycleResult`]; a failed stage abandons the rest
//! of that cycle and the loop retries after the next sleep. This is the only
//! place errors are absorbed.
//!
//! A cycle is never interrupted: shutdown is only honored while sleeping.

use crate::error::Error;
use crate::harvest::HarvestOutcome;
use crate::pipeline::{CreateOutcome, PublishOutcome, Streak};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, error, info};

/// Cycle stage, for failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Harvest,
    Create,
    Publish,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CycleStage::Harvest => "harvest",
            CycleStage::Create => "create",
            CycleStage::Publish => "publish",
        })
    }
}

/// Create and publish results for one day
#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub day: i64,
    pub create: CreateOutcome,
    pub publish: PublishOutcome,
}

/// Everything a successful cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub day: i64,
    pub harvest: HarvestOutcome,
    /// One entry per unpublished day, ascending
    pub days: Vec<DayReport>,
}

impl CycleReport {
    /// Days that got a new artifact this cycle
    pub fn created_days(&self) -> Vec<i64> {
        self.days
            .iter()
            .filter(|d| matches!(d.create, CreateOutcome::Created { .. }))
            .map(|d| d.day)
            .collect()
    }

    /// Days published this cycle
    pub fn published_days(&self) -> Vec<i64> {
        self.days
            .iter()
            .filter(|d| matches!(d.publish, PublishOutcome::Published { .. }))
            .map(|d| d.day)
            .collect()
    }
}

/// Why a cycle was abandoned
#[derive(Debug)]
pub enum CycleFailure {
    Stage { stage: CycleStage, error: Error },
    Panicked(String),
}

impl std::fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleFailure::Stage { stage, error } => write!(f, "{} stage failed: {}", stage, error),
            CycleFailure::Panicked(message) => write!(f, "cycle panicked: {}", message),
        }
    }
}

pub type CycleResult = std::result::Result<CycleReport, CycleFailure>;

/// Owns the pipeline and the pacing between cycles
pub struct Supervisor {
    streak: Streak,
    interval: Duration,
}

impl Supervisor {
    pub fn new(streak: Streak, interval: Duration) -> Self {
        Self { streak, interval }
    }

    pub fn streak(&self) -> &Streak {
        &self.streak
    }

    /// Run one harvest → create → publish pass
    ///
    /// Every elapsed day the ledger covers and that is not yet published is
    /// visited in ascending order, so a harvest that adds several days at
    /// once still gets a video for each of them.
    pub async fn run_cycle(&self) -> CycleResult {
        let day = self.streak.current_day();
        info!(day, "Starting cycle");

        let harvest = self
            .streak
            .update()
            .await
            .map_err(|error| CycleFailure::Stage {
                stage: CycleStage::Harvest,
                error,
            })?;

        let mut days = Vec::new();
        for pending in self.streak.unpublished_days() {
            let create = self
                .streak
                .create(Some(pending))
                .await
                .map_err(|error| CycleFailure::Stage {
                    stage: CycleStage::Create,
                    error,
                })?;
            let publish = self
                .streak
                .upload(Some(pending))
                .await
                .map_err(|error| CycleFailure::Stage {
                    stage: CycleStage::Publish,
                    error,
                })?;
            days.push(DayReport {
                day: pending,
                create,
                publish,
            });
        }

        Ok(CycleReport { day, harvest, days })
    }

    /// Run one cycle, converting a panic into a failure
    async fn guarded_cycle(&self) -> CycleResult {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(CycleFailure::Panicked(message))
            }
        }
    }

    /// Cycle until `shutdown` completes; returns the number of cycles run
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0;
        loop {
            cycles += 1;
            match self.guarded_cycle().await {
                Ok(report) => {
                    info!(
                        day = report.day,
                        created = ?report.created_days(),
                        published = ?report.published_days(),
                        "Cycle complete: {}",
                        report.harvest
                    );
                    for skipped in report.days.iter().filter(|d| {
                        matches!(d.create, CreateOutcome::Skipped { .. })
                            && matches!(d.publish, PublishOutcome::Skipped { .. })
                    }) {
                        debug!(day = skipped.day, "{}; {}", skipped.create, skipped.publish);
                    }
                }
                Err(failure) => error!("Cycle abandoned, retrying in {:?}: {}", self.interval, failure),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving supervisor loop");
                    break;
                }
            }
        }
        cycles
    }
}
