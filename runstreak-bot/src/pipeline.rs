//! Pipeline stages
//!
//! [`Streak`] wires the ledger store, harvest coordinator, artifact gate and
//! collaborators together from a [`StreakConfig`]. Each stage reloads the
//! ledger from disk, so a stage never acts on state an earlier crash left
//! only in memory.

use crate::collaborators::{
    caption, ActivitySource, ArtifactRenderer, CommandPublisher, CommandRenderer, CommandSource,
    Publisher, RenderRequest, Unconfigured,
};
use crate::error::{Error, Result, Stage};
use crate::gate::{ArtifactGate, DayState, SkipReason};
use crate::harvest::{HarvestCoordinator, HarvestOutcome};
use crate::ledger::{Ledger, LedgerStore};
use chrono::NaiveDate;
use runstreak_common::{current_day, ActivityRecord, Clock, StreakConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the create stage
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created { day: i64, path: PathBuf },
    Skipped { day: i64, reason: SkipReason },
}

impl std::fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateOutcome::Created { day, path } => {
                write!(f, "created day {} artifact {}", day, path.display())
            }
            CreateOutcome::Skipped { day, reason } => write!(f, "day {} not created: {}", day, reason),
        }
    }
}

/// Result of the upload stage
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { day: i64, caption: String },
    Skipped { day: i64, reason: SkipReason },
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishOutcome::Published { day, caption } => {
                write!(f, "published day {}: {}", day, caption)
            }
            PublishOutcome::Skipped { day, reason } => {
                write!(f, "day {} not published: {}", day, reason)
            }
        }
    }
}

/// Snapshot for the `status` subcommand
#[derive(Debug, Clone)]
pub struct StreakStatus {
    pub today: NaiveDate,
    pub day: i64,
    pub records: usize,
    pub total_km: f64,
    pub total_duration_sec: u64,
    pub last: Option<ActivityRecord>,
    pub report_day: i64,
    pub report_state: DayState,
    pub materials_left: usize,
}

impl StreakStatus {
    /// Elapsed days the ledger has no entry for
    pub fn missing_days(&self) -> i64 {
        (self.day - self.records as i64).max(0)
    }
}

impl std::fmt::Display for StreakStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Today:          {} (day {})", self.today, self.day)?;
        writeln!(
            f,
            "Ledger:         {} runs, {:.1} km, {}",
            self.records,
            self.total_km,
            crate::collaborators::format_duration(self.total_duration_sec)
        )?;
        if let Some(last) = &self.last {
            write!(
                f,
                "Last run:       {} ({:.2} km",
                last.activity_at.format(runstreak_common::record::TIMESTAMP_FORMAT),
                last.distance_km
            )?;
            if let Some(pace) = last.pace_sec_per_km() {
                let pace = pace.round() as u64;
                write!(f, ", {}:{:02}/km", pace / 60, pace % 60)?;
            }
            writeln!(f, ")")?;
        }
        if self.missing_days() > 0 {
            writeln!(f, "Missing days:   {}", self.missing_days())?;
        }
        writeln!(f, "Report day:     {} ({})", self.report_day, self.report_state)?;
        write!(f, "Raw material:   {} clip(s) left", self.materials_left)
    }
}

/// Everything the pipeline needs, wired together
pub struct Streak {
    start_day: NaiveDate,
    store: LedgerStore,
    harvester: HarvestCoordinator,
    gate: ArtifactGate,
    renderer: Arc<dyn ArtifactRenderer>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    caption_suffix: Option<String>,
}

impl Streak {
    /// Assemble a pipeline around explicit collaborators
    pub fn new(
        config: &StreakConfig,
        source: Arc<dyn ActivitySource>,
        renderer: Arc<dyn ArtifactRenderer>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = LedgerStore::new(&config.data_file);
        let harvester = HarvestCoordinator::new(
            store.clone(),
            source,
            config.start_day,
            Arc::clone(&clock),
        );
        Self {
            start_day: config.start_day,
            store,
            harvester,
            gate: ArtifactGate::new(
                &config.artifact_dir,
                &config.raw_dir,
                config.artifact_extension.clone(),
            ),
            renderer,
            publisher,
            clock,
            caption_suffix: config.caption_suffix.clone(),
        }
    }

    /// Assemble a pipeline whose collaborators run the configured commands
    pub fn from_config(config: &StreakConfig, clock: Arc<dyn Clock>) -> Self {
        let source: Arc<dyn ActivitySource> = match &config.commands.fetch {
            Some(argv) => Arc::new(CommandSource::new(argv.clone(), Arc::clone(&clock))),
            None => Arc::new(Unconfigured(Stage::Fetch)),
        };
        let renderer: Arc<dyn ArtifactRenderer> = match &config.commands.render {
            Some(argv) => Arc::new(CommandRenderer::new(argv.clone())),
            None => Arc::new(Unconfigured(Stage::Render)),
        };
        let publisher: Arc<dyn Publisher> = match &config.commands.publish {
            Some(argv) => Arc::new(CommandPublisher::new(argv.clone())),
            None => Arc::new(Unconfigured(Stage::Publish)),
        };
        Self::new(config, source, renderer, publisher, clock)
    }

    pub fn gate(&self) -> &ArtifactGate {
        &self.gate
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Challenge day of the current wall-clock date
    pub fn current_day(&self) -> i64 {
        current_day(self.start_day, self.clock.today())
    }

    /// Latest day that is both elapsed and covered by the ledger
    pub fn report_day(&self, ledger: &Ledger) -> i64 {
        self.current_day().min(ledger.len() as i64)
    }

    /// Days `1..=report_day` that carry no publication marker, ascending
    pub fn unpublished_days(&self) -> Vec<i64> {
        let ledger = self.store.load();
        (1..=self.report_day(&ledger))
            .filter(|day| !self.gate.is_published(*day))
            .collect()
    }

    /// Harvest new records into the ledger
    pub async fn update(&self) -> Result<HarvestOutcome> {
        let mut ledger = self.store.load();
        self.harvester.sync(&mut ledger).await
    }

    /// Summarize ledger and artifact state
    pub fn status(&self) -> Result<StreakStatus> {
        let ledger = self.store.load();
        let report_day = self.report_day(&ledger);
        Ok(StreakStatus {
            today: self.clock.today(),
            day: self.current_day(),
            records: ledger.len(),
            total_km: ledger.total_distance(),
            total_duration_sec: ledger.total_duration_sec(),
            last: ledger.last().cloned(),
            report_day,
            report_state: self.gate.day_state(report_day, &ledger)?,
            materials_left: self.gate.available_materials()?.len(),
        })
    }

    /// Render the artifact for `day` (default: the report day) if the gate allows it
    ///
    /// The raw clip is consumed even if rendering fails. The renderer writes
    /// a scratch file that only becomes the artifact after success.
    pub async fn create(&self, day: Option<i64>) -> Result<CreateOutcome> {
        let ledger = self.store.load();
        let day = day.unwrap_or_else(|| self.report_day(&ledger));

        if let Some(reason) = self.gate.create_blocker(day, &ledger)? {
            info!(day, %reason, "Skipping artifact creation");
            return Ok(CreateOutcome::Skipped { day, reason });
        }
        // Checked before claiming: a missing renderer must not eat the pool
        if !self.renderer.is_configured() {
            return Err(Error::NotConfigured(Stage::Render));
        }
        let Some(entry) = ledger.entry_for_day(day).cloned() else {
            return Ok(CreateOutcome::Skipped {
                day,
                reason: SkipReason::LedgerTooShort,
            });
        };
        let Some(material) = self.gate.claim_material(day)? else {
            return Ok(CreateOutcome::Skipped {
                day,
                reason: SkipReason::NoRawMaterial,
            });
        };

        std::fs::create_dir_all(self.gate.artifact_dir())?;
        let partial = self.gate.partial_path(day);
        let request = RenderRequest {
            day,
            running_total_km: ledger.total_distance_through(day),
            entry,
            material: material.path().to_path_buf(),
            output: partial.clone(),
        };

        info!(day, material = %request.material.display(), "Rendering artifact");
        let rendered = self.renderer.render(&request).await;
        drop(material);

        if let Err(e) = rendered {
            if let Err(cleanup) = std::fs::remove_file(&partial) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), "Failed to remove partial artifact: {}", cleanup);
                }
            }
            return Err(e);
        }
        if !partial.is_file() {
            return Err(Error::MissingArtifact { day });
        }

        let path = self.gate.artifact_path(day);
        std::fs::rename(&partial, &path)?;
        info!(day, path = %path.display(), "Artifact created");
        Ok(CreateOutcome::Created { day, path })
    }

    /// Caption for `day`, falling back to the bare day when the ledger lacks it
    pub fn caption_for(&self, day: i64, ledger: &Ledger) -> String {
        let suffix = self.caption_suffix.as_deref();
        match ledger.entry_for_day(day) {
            Some(entry) => caption(day, entry, ledger.total_distance_through(day), suffix),
            None => match suffix {
                Some(suffix) => format!("Day {} {}", day, suffix),
                None => format!("Day {}", day),
            },
        }
    }

    /// Publish the artifact for `day` (default: the report day) unless already published
    pub async fn upload(&self, day: Option<i64>) -> Result<PublishOutcome> {
        let ledger = self.store.load();
        let day = day.unwrap_or_else(|| self.report_day(&ledger));

        if let Some(reason) = self.gate.publish_blocker(day) {
            info!(day, %reason, "Skipping publication");
            return Ok(PublishOutcome::Skipped { day, reason });
        }

        let caption = self.caption_for(day, &ledger);
        let artifact = self.gate.artifact_path(day);
        info!(day, artifact = %artifact.display(), "Publishing artifact");
        self.publisher.publish(&artifact, &caption).await?;
        self.gate.mark_published(day, self.clock.now())?;

        info!(day, "Artifact published");
        Ok(PublishOutcome::Published { day, caption })
    }
}
