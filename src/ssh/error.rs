// ABOUTME: Errors raised while driving the external ssh binary.
// ABOUTME: Covers spawn failures, timeouts, socket paths and credential setup.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::askpass::CredentialError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ssh binary not found: {program}")]
    NotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh timed out after {0:?}")]
    Timeout(Duration),

    #[error(
        "control socket path {} is {len} bytes, over the {limit} byte limit; configure a shorter SSHMUX_SESSION_DIR",
        .path.display()
    )]
    ControlPathTooLong {
        path: PathBuf,
        len: usize,
        limit: usize,
    },

    #[error("health probe exited with status {exit_code}: {output}")]
    ProbeFailed { exit_code: i32, output: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn spawn(program: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound {
                program: program.to_string(),
            }
        } else {
            Error::Spawn {
                program: program.to_string(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
