// ABOUTME: Successful results of the session operations.
// ABOUTME: Serialised as the `ok: true` payloads of tool responses.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ssh::AuthMode;
use crate::types::{Hostname, SessionId, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenOutcome {
    pub session_id: SessionId,
    pub host: Hostname,
    pub user: Option<Username>,
    pub port: Option<u16>,
    pub working_directory: Option<String>,
    pub auth_mode: AuthMode,
}

/// A completed remote command. A non-zero `exit_code` is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecOutcome {
    pub session_id: SessionId,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub truncated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseOutcome {
    pub session_id: SessionId,
    pub closed: bool,
    /// Set when `-O exit` failed; local state was reclaimed regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub host: Hostname,
    pub user: Option<Username>,
    pub port: Option<u16>,
    pub working_directory: Option<String>,
    pub auth_mode: AuthMode,
    pub opened_at: DateTime<Utc>,
    pub idle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub command: String,
    pub version: String,
    pub active_sessions: usize,
}
