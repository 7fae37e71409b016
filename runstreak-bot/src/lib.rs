//! # runstreak-bot
//!
//! Daily running streak bot: harvests activity records into a day-indexed
//! ledger, renders one status video per challenge day from a pool of raw
//! clips, and publishes it. The [`supervisor`] repeats this once per
//! interval and survives any single stage failing.

pub mod collaborators;
pub mod error;
pub mod gate;
pub mod harvest;
pub mod ledger;
pub mod pipeline;
pub mod supervisor;

pub use error::{Error, Result, Stage};
pub use gate::{ArtifactGate, DayState, SkipReason};
pub use harvest::{HarvestCoordinator, HarvestOutcome};
pub use ledger::{Ledger, LedgerStore};
pub use pipeline::{CreateOutcome, PublishOutcome, Streak, StreakStatus};
pub use supervisor::{CycleFailure, CycleReport, CycleResult, CycleStage, DayReport, Supervisor};
