use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Phase;

/// Conditions that stop a run. Per-file problems never end up here; they are
/// collected as `MoveFailure` records instead.
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("destination {path:?} cannot be created or written: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pool directory {path:?} cannot be read: {source}")]
    PoolUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{phase} phase aborted with {failures} unresolved failed move(s)")]
    PhaseAborted { phase: Phase, failures: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize config")]
    Serialize(#[from] serde_json::Error),

    #[error("config file {0:?} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("no per-user config directory is available on this platform")]
    NoConfigDir,

    #[error("ratio target must be strictly between 0 and 1, got {0}")]
    InvalidRatio(f64),

    #[error("at least one category is required")]
    NoCategories,

    #[error("category {0:?} is listed more than once")]
    DuplicateCategory(String),

    #[error("{0:?} is not a plain directory name")]
    InvalidName(String),

    #[error("pool directories must have distinct names, {0:?} is used twice")]
    DuplicatePoolDir(String),
}

/// Everything the binary can fail with
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error("failed to set up logging: {0}")]
    Logging(#[source] io::Error),

    #[error("failed to render report")]
    Report(#[from] serde_json::Error),
}
