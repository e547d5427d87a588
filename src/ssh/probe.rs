// ABOUTME: Health probe for the configured ssh binary.
// ABOUTME: Resolves it on PATH and runs the version arguments under the command timeout.

use serde::Serialize;
use tracing::debug;

use super::command::SshCommand;
use super::error::{Error, Result};
use super::process;
use crate::config::Settings;

/// Successful probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Absolute path of the resolved binary.
    pub command: String,
    /// Trimmed combined output of the version probe.
    pub version: String,
}

pub async fn probe(settings: &Settings) -> Result<ProbeReport> {
    let resolved = which::which(&settings.command).map_err(|e| {
        debug!(command = %settings.command, error = %e, "ssh binary lookup failed");
        Error::NotFound {
            program: settings.command.clone(),
        }
    })?;

    let command = SshCommand::version_probe(settings);
    let output = process::run(
        &command,
        None,
        settings.command_timeout,
        settings.max_output_chars,
    )
    .await?;

    // OpenSSH prints its version on stderr.
    let combined = format!("{}{}", output.stdout, output.stderr);
    let combined = combined.trim().to_string();
    if !output.success() {
        return Err(Error::ProbeFailed {
            exit_code: output.exit_code,
            output: combined,
        });
    }

    Ok(ProbeReport {
        command: resolved.display().to_string(),
        version: combined,
    })
}
