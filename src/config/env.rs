// ABOUTME: Builds Settings from SSHMUX_* environment variables.
// ABOUTME: Each variable is optional; blank values fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use super::{Secret, Settings};
use crate::error::{Error, Result};
use crate::types::{Hostname, Username};

pub const ENV_COMMAND: &str = "SSHMUX_COMMAND";
pub const ENV_BASE_ARGS: &str = "SSHMUX_BASE_ARGS";
pub const ENV_TIMEOUT: &str = "SSHMUX_TIMEOUT_SECONDS";
pub const ENV_CONNECT_TIMEOUT: &str = "SSHMUX_CONNECT_TIMEOUT_SECONDS";
pub const ENV_TEARDOWN_TIMEOUT: &str = "SSHMUX_TEARDOWN_TIMEOUT_SECONDS";
pub const ENV_ALLOWED_HOSTS: &str = "SSHMUX_ALLOWED_HOSTS";
pub const ENV_DEFAULT_HOST: &str = "SSHMUX_DEFAULT_HOST";
pub const ENV_DEFAULT_USER: &str = "SSHMUX_DEFAULT_USER";
pub const ENV_DEFAULT_PORT: &str = "SSHMUX_DEFAULT_PORT";
pub const ENV_MAX_COMMAND_CHARS: &str = "SSHMUX_MAX_COMMAND_CHARS";
pub const ENV_MAX_OUTPUT_CHARS: &str = "SSHMUX_MAX_OUTPUT_CHARS";
pub const ENV_HEALTH_CHECK_ARGS: &str = "SSHMUX_HEALTH_CHECK_ARGS";
pub const ENV_PASSWORD: &str = "SSHMUX_PASSWORD";
pub const ENV_PASSWORD_FILE: &str = "SSHMUX_PASSWORD_FILE";
pub const ENV_IDLE_TIMEOUT: &str = "SSHMUX_SESSION_IDLE_TIMEOUT_SECONDS";
pub const ENV_MAX_SESSIONS: &str = "SSHMUX_MAX_SESSIONS";
pub const ENV_SESSION_DIR: &str = "SSHMUX_SESSION_DIR";

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(raw) = get(ENV_COMMAND) {
            settings.command = single_line(ENV_COMMAND, raw.trim())?.to_string();
        }
        if let Some(raw) = get(ENV_BASE_ARGS) {
            settings.base_args = shell_args(ENV_BASE_ARGS, &raw)?;
        }
        if let Some(raw) = get(ENV_TIMEOUT) {
            settings.command_timeout = seconds(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = get(ENV_CONNECT_TIMEOUT) {
            settings.connect_timeout = Some(seconds(ENV_CONNECT_TIMEOUT, &raw)?);
        }
        if let Some(raw) = get(ENV_TEARDOWN_TIMEOUT) {
            settings.teardown_timeout = seconds(ENV_TEARDOWN_TIMEOUT, &raw)?;
        }
        if let Some(raw) = get(ENV_ALLOWED_HOSTS) {
            settings.allowed_hosts = raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| {
                    Hostname::for_field(item, ENV_ALLOWED_HOSTS).map_err(|_| {
                        Error::invalid(
                            ENV_ALLOWED_HOSTS,
                            format!("invalid host entry '{item}'"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(raw) = get(ENV_DEFAULT_HOST) {
            settings.default_host = Some(
                Hostname::for_field(&raw, ENV_DEFAULT_HOST)
                    .map_err(|e| Error::InvalidConfig(e.to_string()))?,
            );
        }
        if let Some(raw) = get(ENV_DEFAULT_USER) {
            settings.default_user = Some(
                Username::for_field(&raw, ENV_DEFAULT_USER)
                    .map_err(|e| Error::InvalidConfig(e.to_string()))?,
            );
        }
        if let Some(raw) = get(ENV_DEFAULT_PORT) {
            settings.default_port = Some(port(ENV_DEFAULT_PORT, &raw)?);
        }
        if let Some(raw) = get(ENV_MAX_COMMAND_CHARS) {
            settings.max_command_chars = positive(ENV_MAX_COMMAND_CHARS, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_OUTPUT_CHARS) {
            settings.max_output_chars = positive(ENV_MAX_OUTPUT_CHARS, &raw)?;
        }
        if let Some(raw) = get(ENV_HEALTH_CHECK_ARGS) {
            settings.health_check_args = shell_args(ENV_HEALTH_CHECK_ARGS, &raw)?;
        }
        // Secrets keep their inner whitespace; only trailing newlines are dropped.
        if let Some(raw) = lookup(ENV_PASSWORD) {
            if raw.contains('\r') {
                return Err(Error::invalid(
                    ENV_PASSWORD,
                    "cannot contain carriage-return characters",
                ));
            }
            let value = raw.trim_end_matches('\n');
            if !value.is_empty() {
                settings.password = Some(Secret::new(value));
            }
        }
        if let Some(raw) = get(ENV_PASSWORD_FILE) {
            settings.password_file = Some(path(ENV_PASSWORD_FILE, &raw)?);
        }
        if let Some(raw) = get(ENV_IDLE_TIMEOUT) {
            settings.idle_timeout = seconds(ENV_IDLE_TIMEOUT, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_SESSIONS) {
            settings.max_sessions = positive(ENV_MAX_SESSIONS, &raw)?;
        }
        if let Some(raw) = get(ENV_SESSION_DIR) {
            settings.session_dir = Some(path(ENV_SESSION_DIR, &raw)?);
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn single_line<'a>(key: &'static str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\n', '\r']) {
        return Err(Error::invalid(key, "cannot contain newline characters"));
    }
    Ok(value)
}

fn shell_args(key: &'static str, raw: &str) -> Result<Vec<String>> {
    shlex::split(raw.trim()).ok_or_else(|| Error::invalid(key, "unbalanced quoting"))
}

fn positive(key: &'static str, raw: &str) -> Result<usize> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::invalid(key, "must be a positive integer"))?;
    if value == 0 {
        return Err(Error::invalid(key, "must be greater than zero"));
    }
    usize::try_from(value).map_err(|_| Error::invalid(key, "is too large"))
}

fn seconds(key: &'static str, raw: &str) -> Result<Duration> {
    positive(key, raw).map(|secs| Duration::from_secs(secs as u64))
}

fn port(key: &'static str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::invalid(key, "must be between 1 and 65535"))
}

fn path(key: &'static str, raw: &str) -> Result<PathBuf> {
    single_line(key, raw.trim()).map(PathBuf::from)
}
