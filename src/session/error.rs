// ABOUTME: Caller-facing session errors with SNAFU pattern.
// ABOUTME: Every failure maps onto one of four kinds: validation, config, timeout, execution.

use serde::Serialize;
use snafu::Snafu;
use std::fmt;

use super::table::CapacityError;
use super::validate::ValidationError;
use crate::config::TargetError;
use crate::ssh;
use crate::types::SessionId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("{source}"))]
    InvalidInput { source: ValidationError },

    #[snafu(display("{source}"))]
    InvalidTarget { source: TargetError },

    #[snafu(display("{source}"))]
    Capacity { source: CapacityError },

    #[snafu(display("unknown or expired session: {session_id}"))]
    UnknownSession { session_id: SessionId },

    #[snafu(display(
        "failed to open session to {destination}: ssh exited with status {exit_code}: {stderr}"
    ))]
    HandshakeFailed {
        destination: String,
        exit_code: i32,
        stderr: String,
    },

    #[snafu(display(
        "failed to open session to {destination}: handshake marker missing from ssh output"
    ))]
    HandshakeIncomplete { destination: String },

    #[snafu(display("session directory unusable: {source}"))]
    SessionDir { source: std::io::Error },

    #[snafu(display("{source}"))]
    Ssh { source: ssh::Error },
}

/// Error kind reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Malformed input, disallowed host or capacity exhausted.
    Validation,
    /// Environment problem: missing binary, bad credentials setup, unusable paths.
    Config,
    /// A bounded ssh invocation ran out of time.
    Timeout,
    /// Unknown session or a failed handshake.
    Execution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Config => "config",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Execution => "execution",
        })
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidInput { .. }
            | SessionError::InvalidTarget { .. }
            | SessionError::Capacity { .. } => ErrorKind::Validation,
            SessionError::UnknownSession { .. }
            | SessionError::HandshakeFailed { .. }
            | SessionError::HandshakeIncomplete { .. } => ErrorKind::Execution,
            SessionError::SessionDir { .. } => ErrorKind::Config,
            SessionError::Ssh { source } => match source {
                ssh::Error::NotFound { .. }
                | ssh::Error::Spawn { .. }
                | ssh::Error::ControlPathTooLong { .. }
                | ssh::Error::Credential(_) => ErrorKind::Config,
                ssh::Error::Timeout(_) => ErrorKind::Timeout,
                ssh::Error::ProbeFailed { .. } | ssh::Error::Io(_) => ErrorKind::Execution,
            },
        }
    }
}

impl From<ssh::Error> for SessionError {
    fn from(source: ssh::Error) -> Self {
        SessionError::Ssh { source }
    }
}

impl From<ValidationError> for SessionError {
    fn from(source: ValidationError) -> Self {
        SessionError::InvalidInput { source }
    }
}

impl From<ssh::CredentialError> for SessionError {
    fn from(source: ssh::CredentialError) -> Self {
        SessionError::Ssh {
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
