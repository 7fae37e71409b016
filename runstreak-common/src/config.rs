//! Configuration loading and config file resolution
//!
//! The bootstrap TOML file is read once at startup into a [`StreakConfig`],
//! which is then handed explicitly to every component.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `RUNSTREAK_CONFIG` environment variable
//! 3. `runstreak.toml` in the current directory
//! 4. `<user config dir>/runstreak/config.toml`

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RUNSTREAK_CONFIG";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "runstreak.toml";

/// Raw TOML file contents before validation
#[derive(Debug, Clone, Deserialize)]
struct TomlConfig {
    start_day: Option<String>,

    #[serde(default = "default_data_file")]
    data_file: PathBuf,

    #[serde(default = "default_artifact_dir")]
    artifact_dir: PathBuf,

    #[serde(default = "default_raw_dir")]
    raw_dir: PathBuf,

    #[serde(default = "default_artifact_extension")]
    artifact_extension: String,

    #[serde(default = "default_interval_secs")]
    interval_secs: u64,

    #[serde(default)]
    caption_suffix: Option<String>,

    #[serde(default)]
    logging: LoggingConfig,

    #[serde(default)]
    commands: CommandsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// External commands standing in for the fetch, render and publish stages
///
/// Each is an argv array; the first element is the program.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    #[serde(default)]
    pub fetch: Option<Vec<String>>,
    #[serde(default)]
    pub render: Option<Vec<String>>,
    #[serde(default)]
    pub publish: Option<Vec<String>>,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("videos")
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("raw")
}

fn default_artifact_extension() -> String {
    "mp4".to_string()
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct StreakConfig {
    /// Day 1 of the challenge
    pub start_day: NaiveDate,
    /// Ledger file
    pub data_file: PathBuf,
    /// Directory holding one artifact per day
    pub artifact_dir: PathBuf,
    /// Pool of unconsumed raw clips
    pub raw_dir: PathBuf,
    /// Artifact file extension, without the dot
    pub artifact_extension: String,
    /// Pause between supervisor cycles
    pub interval: Duration,
    /// Text appended to every caption
    pub caption_suffix: Option<String>,
    pub logging: LoggingConfig,
    pub commands: CommandsConfig,
}

impl StreakConfig {
    /// Parse and validate a config file
    ///
    /// Relative paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base)
    }

    /// Parse and validate TOML text, resolving relative paths against `base`
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self> {
        let raw: TomlConfig = toml::from_str(content)?;

        let start_day = raw
            .start_day
            .ok_or_else(|| Error::Config("Missing required setting 'start_day'".to_string()))?;
        let start_day = NaiveDate::parse_from_str(start_day.trim(), "%Y-%m-%d").map_err(|e| {
            Error::Config(format!(
                "Invalid start_day '{}' (expected YYYY-MM-DD): {}",
                start_day, e
            ))
        })?;

        if raw.interval_secs == 0 {
            return Err(Error::Config("interval_secs must be greater than 0".to_string()));
        }

        let artifact_extension = raw.artifact_extension.trim_start_matches('.').to_string();
        if artifact_extension.is_empty() {
            return Err(Error::Config("artifact_extension must not be empty".to_string()));
        }

        for (name, argv) in [
            ("fetch", &raw.commands.fetch),
            ("render", &raw.commands.render),
            ("publish", &raw.commands.publish),
        ] {
            if matches!(argv, Some(argv) if argv.is_empty()) {
                return Err(Error::Config(format!("commands.{} must not be empty", name)));
            }
        }

        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let mut logging = raw.logging;
        logging.file = logging.file.map(resolve);

        Ok(Self {
            start_day,
            data_file: resolve(raw.data_file),
            artifact_dir: resolve(raw.artifact_dir),
            raw_dir: resolve(raw.raw_dir),
            artifact_extension,
            interval: Duration::from_secs(raw.interval_secs),
            caption_suffix: raw.caption_suffix.filter(|s| !s.trim().is_empty()),
            logging,
            commands: raw.commands,
        })
    }
}

/// Locate the config file following the resolution priority
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(local);
    }

    // Priority 4: Per-user config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("runstreak").join("config.toml")) {
        debug!("Checking user config file {}", user_config.display());
        if user_config.is_file() {
            return Ok(user_config);
        }
    }

    Err(Error::Config(format!(
        "No config file found (pass --config, set {} or create {})",
        CONFIG_ENV_VAR, LOCAL_CONFIG_FILE
    )))
}
