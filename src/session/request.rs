// ABOUTME: Arguments accepted by the session operations.
// ABOUTME: Deserialised straight from tool-call payloads.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Kept wide so out-of-range values surface as validation errors.
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl OpenRequest {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecRequest {
    pub session_id: String,
    pub command: String,
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl ExecRequest {
    pub fn new(session_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            command: command.into(),
            working_directory: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseRequest {
    pub session_id: String,
}
