use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Read(String),
    #[error("failed to parse settings: {0}")]
    Parse(String),
    #[error("invalid setting {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("cannot determine the user's home directory")]
    NoHomeDir,
}

/// Failures of the named-pipe ingestion point. All of these are fatal at
/// startup; runtime read errors are logged by the listener instead.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to remove stale file at {path}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create pipe at {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open pipe at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to serialize preferences")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move preferences into place at {path}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("notification backend failed")]
    Backend {
        #[source]
        source: notify_rust::error::Error,
    },
}

/// Why a wire line produced no [`crate::types::Command`]. Callers drop these
/// silently; the pipe is one-way and fire-and-forget.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseError {
    #[error("message is not a control literal, notification object, or legacy identifier")]
    Unrecognized,
}
