// ABOUTME: Top-level error types for sshmux.
// ABOUTME: Configuration loading failures plus session errors surfaced by the CLI.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("set either SSHMUX_PASSWORD or SSHMUX_PASSWORD_FILE, not both")]
    ConflictingSecrets,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
