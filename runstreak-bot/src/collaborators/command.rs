//! Collaborators backed by external programs
//!
//! Each adapter runs a configured argv. Parameters travel in `RUNSTREAK_*`
//! environment variables so the programs can be plain shell scripts.
//!
//! The fetch program prints one JSON object per line on stdout:
//!
//! ```text
//! {"activity_at": "2024-01-05 07:12:00", "distance_km": 5.2, "duration_sec": 1800}
//! ```
//!
//! A non-zero exit status is a failure. For fetch, lines printed before the
//! failure are still delivered, then the failure ends the stream.

use super::{ActivitySource, ArtifactRenderer, Publisher, RecordStream, RenderRequest};
use crate::error::{Error, Result, Stage};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use runstreak_common::record::timestamp;
use runstreak_common::{ActivityRecord, Clock};
use serde::Deserialize;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr excerpt carried into an error message
const STDERR_EXCERPT: usize = 500;

/// One line of fetch output
#[derive(Debug, Deserialize)]
struct FetchedActivity {
    #[serde(with = "timestamp")]
    activity_at: NaiveDateTime,
    distance_km: f64,
    duration_sec: u64,
}

/// Parse a fetch output line, stamping it with the ingestion time
fn parse_line(line: &str, recorded_at: NaiveDateTime) -> Result<ActivityRecord> {
    let fetched: FetchedActivity = serde_json::from_str(line).map_err(|e| {
        Error::collaborator(Stage::Fetch, format!("bad record line '{}': {}", line, e))
    })?;
    Ok(ActivityRecord::new(
        recorded_at,
        fetched.activity_at,
        fetched.distance_km,
        fetched.duration_sec,
    )?)
}

fn build_command(argv: &[String], stage: Stage) -> Result<Command> {
    let (program, args) = argv.split_first().ok_or(Error::NotConfigured(stage))?;
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    Ok(command)
}

/// Turn a finished process into a stage result
fn check_output(stage: Stage, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let excerpt: String = stderr
        .chars()
        .skip(stderr.chars().count().saturating_sub(STDERR_EXCERPT))
        .collect();
    Err(Error::collaborator(
        stage,
        format!("exited with {}: {}", output.status, excerpt),
    ))
}

/// Record source running the configured fetch program
pub struct CommandSource {
    argv: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl CommandSource {
    pub fn new(argv: Vec<String>, clock: Arc<dyn Clock>) -> Self {
        Self { argv, clock }
    }
}

#[async_trait]
impl ActivitySource for CommandSource {
    async fn fetch(&self, since: NaiveDate) -> Result<RecordStream<'_>> {
        let mut command = build_command(&self.argv, Stage::Fetch)?;
        command
            .env("RUNSTREAK_SINCE", since.format("%Y-%m-%d").to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!(program = %self.argv[0], %since, "Spawning fetch command");
        let mut child = command
            .spawn()
            .map_err(|e| Error::collaborator(Stage::Fetch, format!("cannot start {}: {}", self.argv[0], e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::collaborator(Stage::Fetch, "stdout not captured"))?;

        let clock = Arc::clone(&self.clock);
        let stream = async_stream::stream! {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parse_line(line, clock.now()) {
                            Ok(record) => yield Ok(record),
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(Error::from(e));
                        return;
                    }
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    yield Err(Error::collaborator(Stage::Fetch, format!("exited with {}", status)));
                }
                Err(e) => yield Err(Error::from(e)),
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Renderer running the configured render program
pub struct CommandRenderer {
    argv: Vec<String>,
}

impl CommandRenderer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl ArtifactRenderer for CommandRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<()> {
        let mut command = build_command(&self.argv, Stage::Render)?;
        command
            .env("RUNSTREAK_DAY", request.day.to_string())
            .env("RUNSTREAK_DISTANCE_KM", format!("{:.2}", request.entry.distance_km))
            .env("RUNSTREAK_DURATION_SEC", request.entry.duration_sec.to_string())
            .env("RUNSTREAK_TOTAL_KM", format!("{:.2}", request.running_total_km))
            .env("RUNSTREAK_MATERIAL", &request.material)
            .env("RUNSTREAK_OUTPUT", &request.output)
            .stdin(Stdio::null());

        debug!(day = request.day, output = %request.output.display(), "Running render command");
        let output = command
            .output()
            .await
            .map_err(|e| Error::collaborator(Stage::Render, format!("cannot start {}: {}", self.argv[0], e)))?;
        check_output(Stage::Render, &output)
    }
}

/// Publisher running the configured publish program
pub struct CommandPublisher {
    argv: Vec<String>,
}

impl CommandPublisher {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(&self, artifact: &Path, caption: &str) -> Result<()> {
        let mut command = build_command(&self.argv, Stage::Publish)?;
        command
            .env("RUNSTREAK_ARTIFACT", artifact)
            .env("RUNSTREAK_CAPTION", caption)
            .stdin(Stdio::null());

        debug!(artifact = %artifact.display(), "Running publish command");
        let output = command
            .output()
            .await
            .map_err(|e| Error::collaborator(Stage::Publish, format!("cannot start {}: {}", self.argv[0], e)))?;
        if !output.stdout.is_empty() {
            warn!(
                "publish command output: {}",
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        check_output(Stage::Publish, &output)
    }
}
