//! Test helpers for runstreak-bot integration tests
//!
//! Provides in-memory collaborators and a throwaway on-disk workspace:
//! - FakeSource: scripted fetch results, optionally failing mid-stream
//! - FakeRenderer: writes a small file per render, can be told to fail
//! - FakePublisher: records posts, can be told to fail
//! - Workspace: temp dir with config, ledger, artifact and raw dirs

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime};
use futures::stream;
use runstreak_bot::collaborators::{
    ActivitySource, ArtifactRenderer, Publisher, RecordStream, RenderRequest,
};
use runstreak_bot::{Error, Ledger, Result, Stage, Streak};
use runstreak_common::{ActivityRecord, FixedClock, StreakConfig};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Run on challenge `day` (1-based) at `hour`
pub fn run_on(start: NaiveDate, day: u64, hour: u32, km: f64) -> ActivityRecord {
    let at: NaiveDateTime = start
        .checked_add_days(Days::new(day - 1))
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap();
    ActivityRecord::new(at, at, km, (km * 360.0) as u64).unwrap()
}

/// Ledger with one run per day for days `1..=days`
pub fn ledger_of(start: NaiveDate, days: u64) -> Ledger {
    (1..=days).map(|d| run_on(start, d, 7, d as f64)).collect()
}

/// One scripted fetch call
#[derive(Debug, Clone, Default)]
pub struct FetchScript {
    pub records: Vec<ActivityRecord>,
    /// Fail with a transport error after yielding this many records
    pub fail_after: Option<usize>,
}

impl FetchScript {
    pub fn ok(records: Vec<ActivityRecord>) -> Self {
        Self {
            records,
            fail_after: None,
        }
    }

    pub fn failing_after(records: Vec<ActivityRecord>, yielded: usize) -> Self {
        Self {
            records,
            fail_after: Some(yielded),
        }
    }
}

/// Record source replaying scripts, one per fetch call
///
/// Records before the requested date are filtered out, like the real site.
/// Once the scripts run out, the last one is repeated.
#[derive(Default)]
pub struct FakeSource {
    scripts: Mutex<VecDeque<FetchScript>>,
    last: Mutex<FetchScript>,
    pub calls: Mutex<Vec<NaiveDate>>,
}

impl FakeSource {
    pub fn new(scripts: Vec<FetchScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn fetch(&self, since: NaiveDate) -> Result<RecordStream<'_>> {
        self.calls.lock().unwrap().push(since);
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.pop_front() {
                Some(script) => {
                    *self.last.lock().unwrap() = script.clone();
                    script
                }
                None => self.last.lock().unwrap().clone(),
            }
        };

        let mut items: Vec<Result<ActivityRecord>> = script
            .records
            .into_iter()
            .filter(|r| r.activity_at.date() >= since)
            .map(Ok)
            .collect();
        if let Some(yielded) = script.fail_after {
            items.truncate(yielded);
            items.push(Err(Error::collaborator(Stage::Fetch, "session dropped")));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// How the fake renderer behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Write,
    Fail,
    WriteNothing,
    Panic,
}

pub struct FakeRenderer {
    mode: Mutex<RenderMode>,
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new(mode: RenderMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: RenderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn renders(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactRenderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        assert!(request.material.is_file(), "claimed material must exist while rendering");
        let mode = *self.mode.lock().unwrap();
        match mode {
            RenderMode::Write => {
                std::fs::write(&request.output, format!("video for day {}", request.day))?;
                Ok(())
            }
            RenderMode::Fail => {
                std::fs::write(&request.output, b"half a video")?;
                Err(Error::collaborator(Stage::Render, "encoder crashed"))
            }
            RenderMode::WriteNothing => Ok(()),
            RenderMode::Panic => panic!("renderer blew up"),
        }
    }
}

#[derive(Default)]
pub struct FakePublisher {
    fail: AtomicBool,
    pub posts: Mutex<Vec<(PathBuf, String)>>,
}

impl FakePublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<(PathBuf, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, artifact: &Path, caption: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::collaborator(Stage::Publish, "upload rejected"));
        }
        self.posts
            .lock()
            .unwrap()
            .push((artifact.to_path_buf(), caption.to_string()));
        Ok(())
    }
}

/// Temp directory laid out like a real deployment
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub config: StreakConfig,
}

impl Workspace {
    pub fn new(start: NaiveDate) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            "start_day = \"{}\"\ninterval_secs = 3600\ncaption_suffix = \"#streak\"\n",
            start
        );
        let config = StreakConfig::from_toml_str(&toml, dir.path()).unwrap();
        std::fs::create_dir_all(&config.raw_dir).unwrap();
        Self { dir, config }
    }

    pub fn add_material(&self, name: &str) {
        std::fs::write(self.config.raw_dir.join(name), b"raw clip").unwrap();
    }

    pub fn material_count(&self) -> usize {
        std::fs::read_dir(&self.config.raw_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().unwrap().is_file())
            .count()
    }

    pub fn streak(
        &self,
        today: NaiveDate,
        source: Arc<FakeSource>,
        renderer: Arc<FakeRenderer>,
        publisher: Arc<FakePublisher>,
    ) -> Streak {
        Streak::new(
            &self.config,
            source,
            renderer,
            publisher,
            Arc::new(FixedClock::on(today)),
        )
    }
}
