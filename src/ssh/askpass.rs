// ABOUTME: Credential provider: key/agent auth or one-shot askpass password injection.
// ABOUTME: The helper script lives only as long as the ssh invocation that needs it.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;

use crate::config::{Secret, Settings};

/// Child-only variable the helper script reads the secret from.
pub const SECRET_ENV: &str = "SSHMUX_ASKPASS_SECRET";

const HELPER_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$SSHMUX_ASKPASS_SECRET\"\n";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("set either SSHMUX_PASSWORD or SSHMUX_PASSWORD_FILE, not both")]
    Conflict,

    #[error("failed to read SSHMUX_PASSWORD_FILE {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SSHMUX_PASSWORD_FILE {} is empty", .0.display())]
    EmptyFile(PathBuf),

    #[error("SSHMUX_PASSWORD_FILE {} contains carriage-return characters", .0.display())]
    CarriageReturn(PathBuf),

    #[error("failed to create askpass helper: {0}")]
    Helper(#[source] std::io::Error),
}

/// How a session authenticates. Fixed when the session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Key,
    Password,
}

impl AuthMode {
    pub fn for_settings(settings: &Settings) -> Self {
        if settings.password.is_some() || settings.password_file.is_some() {
            AuthMode::Password
        } else {
            AuthMode::Key
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Key => f.write_str("key"),
            AuthMode::Password => f.write_str("password"),
        }
    }
}

/// Read the configured secret. The file is read on every call so rotation is picked up.
pub fn resolve_secret(settings: &Settings) -> Result<Option<Secret>, CredentialError> {
    match (&settings.password, &settings.password_file) {
        (Some(_), Some(_)) => Err(CredentialError::Conflict),
        (Some(secret), None) => Ok(Some(secret.clone())),
        (None, Some(path)) => read_secret_file(path).map(Some),
        (None, None) => Ok(None),
    }
}

fn read_secret_file(path: &Path) -> Result<Secret, CredentialError> {
    let raw = zeroize::Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
        CredentialError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    })?);
    if raw.contains('\r') {
        return Err(CredentialError::CarriageReturn(path.to_path_buf()));
    }
    let value = raw.trim_end_matches('\n');
    if value.is_empty() {
        return Err(CredentialError::EmptyFile(path.to_path_buf()));
    }
    Ok(Secret::new(value))
}

/// Owns the helper script on disk; the file is deleted when this is dropped.
#[derive(Debug)]
pub struct AskpassGuard {
    path: TempPath,
}

impl AskpassGuard {
    /// Write a 0700 helper into `dir`. The file handle is closed before returning
    /// so ssh can exec the script without hitting ETXTBSY.
    pub fn create(dir: &Path) -> Result<Self, CredentialError> {
        let mut file = tempfile::Builder::new()
            .prefix("askpass-")
            .suffix(".sh")
            .tempfile_in(dir)
            .map_err(CredentialError::Helper)?;
        file.write_all(HELPER_SCRIPT.as_bytes())
            .and_then(|()| file.flush())
            .map_err(CredentialError::Helper)?;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))
            .map_err(CredentialError::Helper)?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Everything one password-mode ssh invocation needs.
#[derive(Debug)]
pub struct Credentials {
    secret: Secret,
    helper: AskpassGuard,
}

impl Credentials {
    /// Resolve the secret and stage a helper for a single invocation.
    /// Returns `None` in key mode.
    pub fn prepare(settings: &Settings, dir: &Path) -> Result<Option<Self>, CredentialError> {
        let Some(secret) = resolve_secret(settings)? else {
            return Ok(None);
        };
        let helper = AskpassGuard::create(dir)?;
        Ok(Some(Self { secret, helper }))
    }

    pub fn helper_path(&self) -> &Path {
        self.helper.path()
    }

    /// Set the askpass environment on the child only.
    pub(crate) fn apply(&self, command: &mut tokio::process::Command) {
        command
            .env("SSH_ASKPASS", self.helper.path())
            .env("SSH_ASKPASS_REQUIRE", "force")
            .env(SECRET_ENV, self.secret.expose());
        if std::env::var_os("DISPLAY").is_none() {
            command.env("DISPLAY", ":0");
        }
    }
}
