//! Error types for runstreak-bot
//!
//! Inner components return these and never swallow faults; only the
//! supervisor loop absorbs them.

use thiserror::Error;

/// Pipeline stage that talks to the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Render,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Render => "render",
            Stage::Publish => "publish",
        })
    }
}

/// Main error type for runstreak-bot
#[derive(Error, Debug)]
pub enum Error {
    /// Shared runstreak error (config, record validation...)
    #[error(transparent)]
    Common(#[from] runstreak_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record source failed mid-stream; `accepted` records were merged and saved first
    #[error("Harvest interrupted after {accepted} new record(s): {source}")]
    Harvest {
        accepted: usize,
        #[source]
        source: Box<Error>,
    },

    /// External fetch/render/publish collaborator failed
    #[error("{stage} failed: {message}")]
    Collaborator { stage: Stage, message: String },

    /// Collaborator is not configured
    #[error("No {0} command configured")]
    NotConfigured(Stage),

    /// Renderer reported success but produced nothing
    #[error("Artifact for day {day} missing after render")]
    MissingArtifact { day: i64 },
}

impl Error {
    /// Shorthand for a collaborator failure
    pub fn collaborator(stage: Stage, message: impl Into<String>) -> Self {
        Error::Collaborator {
            stage,
            message: message.into(),
        }
    }
}

/// Convenience Result type using runstreak-bot Error
pub type Result<T> = std::result::Result<T, Error>;
