//! Error types shared across the bot's layers.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the on-disk backup store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Backup store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt backup file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode backup: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by the remote platform API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected platform response: {0}")]
    Decode(String),

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Platform rejected the request: {0}")]
    Rejected(String),
}

impl ApiError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Failures that abort a backup or restore before any per-item work happens.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl BackupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }
}

/// Malformed input arriving from the interactive front end.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InteractionError {
    #[error("Unknown restore option: {0}")]
    UnknownOption(String),

    #[error("Unknown component id: {0}")]
    UnknownComponent(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
}
