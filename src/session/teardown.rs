// ABOUTME: Best-effort shutdown of one ControlMaster and its socket file.
// ABOUTME: Shared by close, idle expiry, shutdown and abandoned opens.

use futures::future::join_all;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::record::SessionRecord;
use crate::config::{Settings, Target};
use crate::ssh::{self, SshCommand};
use crate::types::SessionId;

#[derive(Debug, Clone)]
pub(crate) struct Teardown {
    settings: Arc<Settings>,
    session_id: SessionId,
    target: Target,
    control_path: PathBuf,
}

impl Teardown {
    pub(crate) fn new(
        settings: Arc<Settings>,
        session_id: SessionId,
        target: Target,
        control_path: PathBuf,
    ) -> Self {
        Self {
            settings,
            session_id,
            target,
            control_path,
        }
    }

    pub(crate) fn for_record(settings: Arc<Settings>, record: SessionRecord) -> Self {
        Self::new(settings, record.id, record.target, record.control_path)
    }

    /// Send `-O exit` and remove the socket. Returns the failure, if any; never errors.
    pub(crate) async fn run(self) -> Option<String> {
        let command = SshCommand::exit_master(&self.settings, &self.target, &self.control_path);
        let failure = match ssh::process::run(
            &command,
            None,
            self.settings.teardown_timeout,
            self.settings.max_output_chars,
        )
        .await
        {
            Ok(output) if output.success() => None,
            Ok(output) => Some(format!(
                "ssh -O exit exited with status {}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = &failure {
            warn!(session_id = %self.session_id, error = %reason, "control master teardown failed");
        }
        remove_artifact(&self.control_path);
        failure
    }

    /// Tear down only if a master got as far as creating its socket.
    pub(crate) async fn run_if_bound(self) {
        if self.control_path.exists() {
            self.run().await;
        }
    }

    pub(crate) fn remove_artifact(&self) {
        remove_artifact(&self.control_path);
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed control socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove control socket"),
    }
}

/// Teardowns spawned from `Drop`, awaited before the manager shuts down.
#[derive(Debug, Clone, Default)]
pub(crate) struct Detached {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Detached {
    fn push(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    pub(crate) async fn wait(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "waiting for abandoned opens to tear down");
        }
        join_all(tasks).await;
    }
}

/// Cleans up a master whose open was abandoned before the session was recorded.
pub(crate) struct PendingChannel {
    teardown: Option<Teardown>,
    detached: Detached,
}

impl PendingChannel {
    pub(crate) fn new(teardown: Teardown, detached: Detached) -> Self {
        Self {
            teardown: Some(teardown),
            detached,
        }
    }

    /// The session was committed; the table owns the master now.
    pub(crate) fn disarm(mut self) {
        self.teardown = None;
    }

    pub(crate) async fn discard(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown.run_if_bound().await;
        }
    }
}

impl Drop for PendingChannel {
    fn drop(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => self.detached.push(handle.spawn(teardown.run_if_bound())),
            Err(_) => teardown.remove_artifact(),
        }
    }
}
