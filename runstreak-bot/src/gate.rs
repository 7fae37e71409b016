//! Artifact gate
//!
//! Decides per day whether an artifact should be created or published. The
//! gate keeps no state of its own; it observes the ledger and three places
//! on disk:
//!
//! - `<artifact_dir>/day-NNN.<ext>`: the artifact, whose presence means "created"
//! - `<artifact_dir>/day-NNN.published`: publication marker
//! - `<raw_dir>/*`: pool of raw clips; `<raw_dir>/.claimed/` holds the clip
//!   being rendered
//!
//! A claimed clip leaves the pool before rendering starts and is deleted
//! when rendering ends, successful or not. A clip is never rendered twice.

use crate::error::Result;
use crate::ledger::Ledger;
use chrono::NaiveDateTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Subdirectory of the raw pool holding claimed clips
const CLAIM_DIR: &str = ".claimed";

/// Lifecycle of one challenge day, as observed on storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    /// Ledger does not reach this day yet
    NoData,
    /// Ledger covers the day, nothing created
    LedgerReady,
    /// A clip was claimed for this day but no artifact exists
    ArtifactPending,
    ArtifactCreated,
    Published,
}

impl std::fmt::Display for DayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DayState::NoData => "no data",
            DayState::LedgerReady => "ledger ready",
            DayState::ArtifactPending => "artifact pending",
            DayState::ArtifactCreated => "artifact created",
            DayState::Published => "published",
        })
    }
}

/// Why creation or publication was skipped; a normal outcome, not a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotStarted,
    LedgerTooShort,
    AlreadyCreated,
    NoRawMaterial,
    NoArtifact,
    AlreadyPublished,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::NotStarted => "challenge not started",
            SkipReason::LedgerTooShort => "ledger does not cover the day",
            SkipReason::AlreadyCreated => "artifact already exists",
            SkipReason::NoRawMaterial => "no raw material left",
            SkipReason::NoArtifact => "no artifact to publish",
            SkipReason::AlreadyPublished => "already published",
        })
    }
}

/// Raw clip moved out of the pool for one render
///
/// The file is deleted when the claim is dropped.
#[derive(Debug)]
pub struct ClaimedMaterial {
    path: PathBuf,
}

impl ClaimedMaterial {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClaimedMaterial {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Consumed raw material"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove claimed material: {}", e),
        }
    }
}

/// Storage-observing gate over artifacts and raw material
#[derive(Debug, Clone)]
pub struct ArtifactGate {
    artifact_dir: PathBuf,
    raw_dir: PathBuf,
    extension: String,
}

impl ArtifactGate {
    pub fn new(artifact_dir: impl Into<PathBuf>, raw_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            raw_dir: raw_dir.into(),
            extension: extension.into(),
        }
    }

    fn day_stem(day: i64) -> String {
        format!("day-{:03}", day)
    }

    /// Artifact file for `day`
    pub fn artifact_path(&self, day: i64) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}", Self::day_stem(day), self.extension))
    }

    /// Scratch file the renderer writes before the artifact is committed
    pub fn partial_path(&self, day: i64) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.partial.{}", Self::day_stem(day), self.extension))
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Publication marker for `day`
    pub fn marker_path(&self, day: i64) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.published", Self::day_stem(day)))
    }

    fn claim_dir(&self) -> PathBuf {
        self.raw_dir.join(CLAIM_DIR)
    }

    pub fn artifact_exists(&self, day: i64) -> bool {
        self.artifact_path(day).is_file()
    }

    pub fn is_published(&self, day: i64) -> bool {
        self.marker_path(day).is_file()
    }

    /// Unclaimed clips in the pool, in file-name order
    pub fn available_materials(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.raw_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut materials = Vec::new();
        for entry in entries {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && entry.file_type()?.is_file() {
                materials.push(entry.path());
            }
        }
        materials.sort();
        Ok(materials)
    }

    /// Clips claimed for `day` and never cleaned up
    fn stale_claims(&self, day: i64) -> Result<Vec<PathBuf>> {
        let stem = Self::day_stem(day);
        let entries = match std::fs::read_dir(self.claim_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut claims = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.file_stem().map_or(false, |s| s.to_string_lossy() == stem) {
                claims.push(path);
            }
        }
        Ok(claims)
    }

    /// Why `day` must not be created, or `None` if creation should run
    pub fn create_blocker(&self, day: i64, ledger: &Ledger) -> Result<Option<SkipReason>> {
        if day < 1 {
            return Ok(Some(SkipReason::NotStarted));
        }
        if !ledger.covers_day(day) {
            return Ok(Some(SkipReason::LedgerTooShort));
        }
        if self.artifact_exists(day) {
            return Ok(Some(SkipReason::AlreadyCreated));
        }
        if self.available_materials()?.is_empty() {
            return Ok(Some(SkipReason::NoRawMaterial));
        }
        Ok(None)
    }

    /// True iff no artifact exists, the ledger covers `day` and a clip is available
    pub fn should_create(&self, day: i64, ledger: &Ledger) -> Result<bool> {
        Ok(self.create_blocker(day, ledger)?.is_none())
    }

    /// Why `day` must not be published, or `None` if publication should run
    pub fn publish_blocker(&self, day: i64) -> Option<SkipReason> {
        if day < 1 {
            Some(SkipReason::NotStarted)
        } else if !self.artifact_exists(day) {
            Some(SkipReason::NoArtifact)
        } else if self.is_published(day) {
            Some(SkipReason::AlreadyPublished)
        } else {
            None
        }
    }

    /// True iff the artifact exists and carries no publication marker
    pub fn should_publish(&self, day: i64) -> bool {
        self.publish_blocker(day).is_none()
    }

    /// Observed lifecycle state of `day`
    pub fn day_state(&self, day: i64, ledger: &Ledger) -> Result<DayState> {
        if day >= 1 && self.is_published(day) {
            return Ok(DayState::Published);
        }
        if day >= 1 && self.artifact_exists(day) {
            return Ok(DayState::ArtifactCreated);
        }
        if !ledger.covers_day(day) {
            return Ok(DayState::NoData);
        }
        if !self.stale_claims(day)?.is_empty() {
            return Ok(DayState::ArtifactPending);
        }
        Ok(DayState::LedgerReady)
    }

    /// Take the first clip out of the pool for `day`
    ///
    /// Any clip left claimed for the same day by an interrupted run is
    /// discarded first. Returns `None` if the pool is empty.
    pub fn claim_material(&self, day: i64) -> Result<Option<ClaimedMaterial>> {
        for stale in self.stale_claims(day)? {
            warn!(day, path = %stale.display(), "Discarding raw material left claimed by an interrupted run");
            std::fs::remove_file(&stale)?;
        }

        let Some(source) = self.available_materials()?.into_iter().next() else {
            return Ok(None);
        };

        let claim_dir = self.claim_dir();
        std::fs::create_dir_all(&claim_dir)?;
        let mut name = Self::day_stem(day);
        if let Some(ext) = source.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        let target = claim_dir.join(name);
        std::fs::rename(&source, &target)?;

        info!(day, material = %source.display(), "Claimed raw material");
        Ok(Some(ClaimedMaterial { path: target }))
    }

    /// Record that `day` was published
    pub fn mark_published(&self, day: i64, at: NaiveDateTime) -> Result<()> {
        std::fs::create_dir_all(&self.artifact_dir)?;
        let marker = self.marker_path(day);
        let tmp = marker.with_extension("published.tmp");
        std::fs::write(&tmp, format!("{}\n", at.format(runstreak_common::record::TIMESTAMP_FORMAT)))?;
        std::fs::rename(&tmp, &marker)?;
        Ok(())
    }
}
