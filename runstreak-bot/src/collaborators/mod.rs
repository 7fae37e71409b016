//! External collaborators
//!
//! The core never scrapes, renders or posts by itself. It drives three narrow
//! interfaces: a record source, an artifact renderer and a publisher.
//! [`command`] implements all three by running configured programs.

use crate::error::{Error, Result, Stage};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use runstreak_common::ActivityRecord;
use std::path::{Path, PathBuf};

pub mod command;

pub use command::{CommandPublisher, CommandRenderer, CommandSource};

/// Finite, non-restartable sequence of fetched records
///
/// An `Err` item ends the harvest; re-fetching means calling
/// [`ActivitySource::fetch`] again from the start.
pub type RecordStream<'a> = BoxStream<'a, Result<ActivityRecord>>;

/// Source of activity records (the fitness site)
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// All records with `activity_at` on or after `since`, in any order
    async fn fetch(&self, since: NaiveDate) -> Result<RecordStream<'_>>;
}

/// Everything the renderer needs to build one day's artifact
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub day: i64,
    pub entry: ActivityRecord,
    /// Distance over days `1..=day`
    pub running_total_km: f64,
    /// Claimed raw clip, deleted once rendering returns
    pub material: PathBuf,
    /// Where the artifact must be written
    pub output: PathBuf,
}

/// Builds the artifact file for a day
#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<()>;

    /// Whether rendering can be attempted at all
    fn is_configured(&self) -> bool {
        true
    }
}

/// Posts an artifact to the social platform
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, artifact: &Path, caption: &str) -> Result<()>;
}

/// Stand-in for a collaborator whose command is not configured
///
/// Every call fails with [`Error::NotConfigured`], so stages that do not
/// need the collaborator still run.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub Stage);

#[async_trait]
impl ActivitySource for Unconfigured {
    async fn fetch(&self, _since: NaiveDate) -> Result<RecordStream<'_>> {
        Err(Error::NotConfigured(self.0))
    }
}

#[async_trait]
impl ArtifactRenderer for Unconfigured {
    async fn render(&self, _request: &RenderRequest) -> Result<()> {
        Err(Error::NotConfigured(self.0))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl Publisher for Unconfigured {
    async fn publish(&self, _artifact: &Path, _caption: &str) -> Result<()> {
        Err(Error::NotConfigured(self.0))
    }
}

/// Format seconds as `H:MM:SS`
pub fn format_duration(total_sec: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        total_sec / 3600,
        (total_sec % 3600) / 60,
        total_sec % 60
    )
}

/// Post text for a day's artifact
pub fn caption(day: i64, entry: &ActivityRecord, running_total_km: f64, suffix: Option<&str>) -> String {
    let mut text = format!(
        "Day {}: {:.2} km in {} (total {:.1} km)",
        day,
        entry.distance_km,
        format_duration(entry.duration_sec),
        running_total_km
    );
    if let Some(suffix) = suffix {
        text.push(' ');
        text.push_str(suffix);
    }
    text
}
