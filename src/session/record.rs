// ABOUTME: The record kept for each live session.
// ABOUTME: Holds the resolved target, control socket path, timestamps and the exec lock.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Target;
use crate::ssh::AuthMode;
use crate::types::SessionId;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub target: Target,
    /// Default remote directory for commands that do not name one.
    pub working_directory: Option<String>,
    pub control_path: PathBuf,
    pub auth_mode: AuthMode,
    pub created_at: Instant,
    pub last_used_at: Instant,
    /// Wall-clock open time, for reporting only.
    pub opened_at: DateTime<Utc>,
    /// Serialises exec calls on this channel.
    pub exec_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionRecord {
    pub fn new(
        id: SessionId,
        target: Target,
        working_directory: Option<String>,
        control_path: PathBuf,
        auth_mode: AuthMode,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            target,
            working_directory,
            control_path,
            auth_mode,
            created_at: now,
            last_used_at: now,
            opened_at: Utc::now(),
            exec_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at)
    }

    /// A command is running on this channel.
    pub fn is_busy(&self) -> bool {
        self.exec_lock.try_lock().is_err()
    }
}
