// ABOUTME: Session lifecycle: open, exec, close, idle expiry and shutdown.
// ABOUTME: Owns the session table and directory; every operation is bounded in time.

use futures::future::join_all;
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::dir::SessionDir;
use super::error::{
    CapacitySnafu, HandshakeFailedSnafu, HandshakeIncompleteSnafu, InvalidTargetSnafu, Result,
    SessionDirSnafu, UnknownSessionSnafu,
};
use super::outcome::{
    CloseOutcome, ExecOutcome, HealthReport, OpenOutcome, SessionInfo, SessionList,
};
use super::record::SessionRecord;
use super::request::{ExecRequest, OpenRequest};
use super::table::SessionTable;
use super::teardown::{Detached, PendingChannel, Teardown};
use super::validate::{self, ValidationError};
use crate::config::Settings;
use crate::ssh::{self, AuthMode, Credentials, HANDSHAKE_MARKER, SshCommand, compose_remote};
use crate::types::SessionId;

/// Explicitly constructed owner of all session state.
#[derive(Debug)]
pub struct SessionManager {
    settings: Arc<Settings>,
    table: SessionTable,
    dir: SessionDir,
    detached: Detached,
}

impl SessionManager {
    pub fn new(settings: Settings) -> Result<Self> {
        let dir = SessionDir::new(settings.session_dir.as_deref()).context(SessionDirSnafu)?;
        debug!(dir = %dir.path().display(), "session directory ready");
        Ok(Self {
            settings: Arc::new(settings),
            table: SessionTable::new(),
            dir,
            detached: Detached::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn active_sessions(&self) -> usize {
        self.table.len()
    }

    /// Start a ControlMaster connection and record it as a new session.
    pub async fn open_session(&self, request: OpenRequest) -> Result<OpenOutcome> {
        let target = self
            .settings
            .resolve_target(
                request.host.as_deref(),
                request.user.as_deref(),
                request.port,
            )
            .context(InvalidTargetSnafu)?;
        let working_directory = validate::working_directory(request.working_directory.as_deref())?;
        let credentials = Credentials::prepare(&self.settings, self.dir.path())?;

        self.reap_idle().await;

        let reservation = self
            .table
            .reserve(self.settings.max_sessions)
            .context(CapacitySnafu)?;
        let id = reservation.id().clone();
        let control_path = self.dir.control_path(&id)?;
        let auth_mode = AuthMode::for_settings(&self.settings);

        let command = SshCommand::open_master(
            &self.settings,
            &target,
            &control_path,
            auth_mode == AuthMode::Password,
        );
        let pending = PendingChannel::new(
            Teardown::new(
                Arc::clone(&self.settings),
                id.clone(),
                target.clone(),
                control_path.clone(),
            ),
            self.detached.clone(),
        );

        let output = match ssh::process::run(
            &command,
            credentials.as_ref(),
            self.settings.handshake_timeout(),
            self.settings.max_output_chars,
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                pending.discard().await;
                return Err(e.into());
            }
        };
        drop(credentials);

        let destination = target.destination();
        if !output.success() {
            pending.discard().await;
            return HandshakeFailedSnafu {
                destination,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            }
            .fail();
        }
        if !output.stdout.contains(HANDSHAKE_MARKER) {
            pending.discard().await;
            return HandshakeIncompleteSnafu { destination }.fail();
        }

        let record = SessionRecord::new(
            id.clone(),
            target.clone(),
            working_directory.clone(),
            control_path,
            auth_mode,
        );
        self.table.commit(reservation, record);
        pending.disarm();
        info!(session_id = %id, destination = %destination, %auth_mode, "session opened");

        Ok(OpenOutcome {
            session_id: id,
            host: target.host,
            user: target.user,
            port: target.port,
            working_directory,
            auth_mode,
        })
    }

    /// Run one bounded command over an existing session.
    pub async fn session_exec(&self, request: ExecRequest) -> Result<ExecOutcome> {
        let id = SessionId::parse(&request.session_id).map_err(ValidationError::from)?;
        let command = validate::command(&request.command, self.settings.max_command_chars)?;
        let override_dir = validate::working_directory(request.working_directory.as_deref())?;

        self.reap_idle().await;

        let record = self.table.get(&id).context(UnknownSessionSnafu {
            session_id: id.clone(),
        })?;
        let _turn = Arc::clone(&record.exec_lock).lock_owned().await;
        // Closed or expired while queued behind another exec.
        if self.table.get(&id).is_none() {
            return UnknownSessionSnafu { session_id: id }.fail();
        }

        let credentials = match record.auth_mode {
            AuthMode::Password => Credentials::prepare(&self.settings, self.dir.path())?,
            AuthMode::Key => None,
        };
        let remote = compose_remote(
            &command,
            override_dir
                .as_deref()
                .or(record.working_directory.as_deref()),
        );
        let ssh = SshCommand::exec_remote(
            &self.settings,
            &record.target,
            &record.control_path,
            &remote,
        );
        let output = ssh::process::run(
            &ssh,
            credentials.as_ref(),
            self.settings.command_timeout,
            self.settings.max_output_chars,
        )
        .await?;

        self.table.touch(&id, Instant::now());
        debug!(session_id = %id, exit_code = output.exit_code, "command finished");

        Ok(ExecOutcome {
            session_id: id,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            truncated: output.truncated,
            duration_ms: u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Remove a session and stop its master. Closing an absent session is not an error.
    pub async fn close_session(&self, session_id: &str) -> Result<CloseOutcome> {
        let id = SessionId::parse(session_id).map_err(ValidationError::from)?;
        let Some(record) = self.table.remove(&id) else {
            return Ok(CloseOutcome {
                session_id: id,
                closed: false,
                teardown_error: None,
            });
        };
        let teardown_error = self.teardown(record).await;
        info!(session_id = %id, "session closed");
        Ok(CloseOutcome {
            session_id: id,
            closed: true,
            teardown_error,
        })
    }

    /// Close every session idle for at least the configured threshold.
    pub async fn reap_idle(&self) -> Vec<SessionId> {
        let expired = self
            .table
            .sweep(self.settings.idle_timeout, Instant::now());
        if expired.is_empty() {
            return Vec::new();
        }
        let ids: Vec<SessionId> = expired.iter().map(|r| r.id.clone()).collect();
        for id in &ids {
            warn!(session_id = %id, idle_timeout = ?self.settings.idle_timeout, "session expired");
        }
        join_all(expired.into_iter().map(|record| self.teardown(record))).await;
        ids
    }

    /// Snapshot of live sessions, oldest first.
    pub fn list_sessions(&self) -> SessionList {
        let now = Instant::now();
        let mut records = self.table.list();
        records.sort_by_key(|r| r.opened_at);
        let sessions = records
            .into_iter()
            .map(|r| SessionInfo {
                idle_ms: u64::try_from(r.idle_for(now).as_millis()).unwrap_or(u64::MAX),
                session_id: r.id,
                host: r.target.host,
                user: r.target.user,
                port: r.target.port,
                working_directory: r.working_directory,
                auth_mode: r.auth_mode,
                opened_at: r.opened_at,
            })
            .collect();
        SessionList { sessions }
    }

    pub async fn health_check(&self) -> Result<HealthReport> {
        let probe = ssh::probe(&self.settings).await?;
        Ok(HealthReport {
            status: "ok",
            command: probe.command,
            version: probe.version,
            active_sessions: self.table.len(),
        })
    }

    /// Close every remaining session, including masters left by cancelled opens.
    /// Returns how many recorded sessions were closed.
    pub async fn shutdown(&self) -> usize {
        let records = self.table.drain();
        let count = records.len();
        if count > 0 {
            info!(count, "closing remaining sessions");
        }
        join_all(records.into_iter().map(|record| self.teardown(record))).await;
        self.detached.wait().await;
        count
    }

    async fn teardown(&self, record: SessionRecord) -> Option<String> {
        Teardown::for_record(Arc::clone(&self.settings), record)
            .run()
            .await
    }
}
