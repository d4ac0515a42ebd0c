//! Error types for Newsdesk.
//!
//! Library crates use [`NewsdeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::SyncStage;

/// Top-level error type for all Newsdesk operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsdeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure not yet attributed to a stage.
    #[error("network error: {0}")]
    Network(String),

    /// HTML/JSON parsing or field extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A source's listing could not be retrieved or understood.
    /// Fatal to that source for the current run.
    #[error("discovery failed for {source_name}: {message}")]
    Discovery {
        source_name: String,
        message: String,
    },

    /// Fetching one item's detail failed. The item is dropped.
    #[error("fetch failed for {id}: {message}")]
    Fetch { id: String, message: String },

    /// Summarization failed (timeout, quota, malformed output).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad config value, incomplete item, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A fatal error annotated with the source and pipeline stage it came from.
    #[error("{source_name} failed while {stage}: {source}")]
    Stage {
        source_name: String,
        stage: SyncStage,
        #[source]
        source: Box<NewsdeskError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsdeskError>;

impl NewsdeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn discovery(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Discovery {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    pub fn fetch(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            id: id.into(),
            message: msg.into(),
        }
    }

    /// Attach source and stage context to a fatal error.
    pub fn at_stage(self, source_name: impl Into<String>, stage: SyncStage) -> Self {
        Self::Stage {
            source_name: source_name.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// The pipeline stage this error was raised in, if it carries one.
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
