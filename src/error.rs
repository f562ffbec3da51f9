// src/error.rs
//
// Error types shared across the byte source, framer and settings layers.
// Only TransportError ends a session; DecodeError is absorbed per line.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::serial::framer::TextEncoding;

/// Failure reported by a byte source. Every variant is terminal for the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device disconnected")]
    Disconnected,
}

/// A terminated line whose bytes are not valid text in the session encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{len} byte line is not valid {encoding}")]
    InvalidText { encoding: TextEncoding, len: usize },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Failure to set up or finish a capture session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
