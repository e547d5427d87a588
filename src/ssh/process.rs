// ABOUTME: Bounded execution of one ssh process in its own process group.
// ABOUTME: Captures capped stdout/stderr and kills the whole group on timeout or cancellation.

use command_group::{AsyncCommandGroup, AsyncGroupChild};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::askpass::Credentials;
use super::command::SshCommand;
use super::error::{Error, Result};

/// How long to keep reading pipes after the process exits.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8192;

/// Result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit status; signal deaths are reported as 128 + signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream was cut.
    pub truncated: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Kills the process group unless disarmed, so a dropped future never leaves ssh running.
struct GroupGuard {
    child: AsyncGroupChild,
    armed: bool,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.child.start_kill();
        }
    }
}

/// Spawn `command`, wait at most `timeout`, and capture output capped at
/// `max_output_chars` characters per stream.
pub async fn run(
    command: &SshCommand,
    credentials: Option<&Credentials>,
    timeout: Duration,
    max_output_chars: usize,
) -> Result<ProcessOutput> {
    let started = Instant::now();
    let mut cmd = command.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(credentials) = credentials {
        credentials.apply(&mut cmd);
    }

    debug!(argv = %command, timeout = ?timeout, "spawning ssh");
    let child = cmd
        .group_spawn()
        .map_err(|e| Error::spawn(command.program(), e))?;
    let mut guard = GroupGuard { child, armed: true };

    let byte_cap = max_output_chars.saturating_mul(4).saturating_add(4);
    let stdout = guard
        .child
        .inner()
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout pipe was not captured"))?;
    let stderr = guard
        .child
        .inner()
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr pipe was not captured"))?;
    let mut stdout_task = tokio::spawn(read_capped(stdout, byte_cap));
    let mut stderr_task = tokio::spawn(read_capped(stderr, byte_cap));

    let status = match tokio::time::timeout(timeout, guard.child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(argv = %command, timeout = ?timeout, "ssh timed out, killing process group");
            if let Err(e) = guard.child.kill().await {
                debug!(error = %e, "process group already gone");
            }
            guard.armed = false;
            stdout_task.abort();
            stderr_task.abort();
            return Err(Error::Timeout(timeout));
        }
    };
    guard.armed = false;

    let (stdout, stdout_cut) = collect(&mut stdout_task, "stdout").await?;
    let (stderr, stderr_cut) = collect(&mut stderr_task, "stderr").await?;
    let (stdout, stdout_truncated) = truncate(&stdout, max_output_chars, stdout_cut);
    let (stderr, stderr_truncated) = truncate(&stderr, max_output_chars, stderr_cut);

    Ok(ProcessOutput {
        exit_code: exit_code(status),
        stdout,
        stderr,
        truncated: stdout_truncated || stderr_truncated,
        elapsed: started.elapsed(),
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

/// Read everything, keeping at most `cap` bytes. Returns whether bytes were dropped.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut overflowed = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(buf.len());
        if n > room {
            overflowed = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok((buf, overflowed))
}

/// Await a reader task, giving up after a grace period. A detached ssh master
/// that inherited the pipe would otherwise hold it open.
async fn collect(
    task: &mut JoinHandle<std::io::Result<(Vec<u8>, bool)>>,
    stream: &'static str,
) -> Result<(Vec<u8>, bool)> {
    match tokio::time::timeout(DRAIN_GRACE, &mut *task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join)) => Err(std::io::Error::other(join).into()),
        Err(_) => {
            warn!(stream, "output pipe still open after exit, discarding");
            task.abort();
            Ok((Vec::new(), false))
        }
    }
}

/// Cut `bytes` to `max_chars` characters, appending a marker when anything was dropped.
pub fn truncate(bytes: &[u8], max_chars: usize, overflowed: bool) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (
            format!("{}\n...[truncated to {max_chars} chars]", &text[..cut]),
            true,
        ),
        None if overflowed => (
            format!("{text}\n...[truncated to {max_chars} chars]"),
            true,
        ),
        None => (text.into_owned(), false),
    }
}
