// ABOUTME: Runtime settings for sshmux: limits, timeouts, defaults and credentials.
// ABOUTME: Loaded from SSHMUX_* environment variables or a YAML file.

mod deserialize;
mod env;
mod secret;
mod target;

pub use env::*;
pub use secret::Secret;
pub use target::{Target, TargetError};

use crate::error::{Error, Result};
use crate::types::{Hostname, Username};
use deserialize::{
    deserialize_hostnames, deserialize_optional_hostname, deserialize_optional_username,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// ssh binary name or path.
    pub command: String,

    /// Arguments inserted before every ssh invocation.
    pub base_args: Vec<String>,

    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Handshake bound for new sessions. Falls back to `command_timeout`.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub teardown_timeout: Duration,

    /// Empty means any host is accepted.
    #[serde(deserialize_with = "deserialize_hostnames")]
    pub allowed_hosts: Vec<Hostname>,

    #[serde(deserialize_with = "deserialize_optional_hostname")]
    pub default_host: Option<Hostname>,

    #[serde(deserialize_with = "deserialize_optional_username")]
    pub default_user: Option<Username>,

    pub default_port: Option<u16>,

    pub max_command_chars: usize,

    pub max_output_chars: usize,

    pub health_check_args: Vec<String>,

    pub password: Option<Secret>,

    pub password_file: Option<PathBuf>,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    pub max_sessions: usize,

    /// Directory for control sockets. A fresh temporary directory when unset.
    pub session_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command: "ssh".to_string(),
            base_args: Vec::new(),
            command_timeout: Duration::from_secs(60),
            connect_timeout: None,
            teardown_timeout: Duration::from_secs(10),
            allowed_hosts: Vec::new(),
            default_host: None,
            default_user: None,
            default_port: None,
            max_command_chars: 4000,
            max_output_chars: 20000,
            health_check_args: vec!["-V".to_string()],
            password: None,
            password_file: None,
            idle_timeout: Duration::from_secs(300),
            max_sessions: 32,
            session_dir: None,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Bound applied to the ControlMaster handshake.
    pub fn handshake_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(self.command_timeout)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::invalid("command", "cannot be empty"));
        }
        let durations = [
            ("command_timeout", Some(self.command_timeout)),
            ("connect_timeout", self.connect_timeout),
            ("teardown_timeout", Some(self.teardown_timeout)),
            ("idle_timeout", Some(self.idle_timeout)),
        ];
        for (key, value) in durations {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(Error::invalid(key, "must be greater than zero"));
            }
        }
        for (key, value) in [
            ("max_command_chars", self.max_command_chars),
            ("max_output_chars", self.max_output_chars),
            ("max_sessions", self.max_sessions),
        ] {
            if value == 0 {
                return Err(Error::invalid(key, "must be greater than zero"));
            }
        }
        if self.default_port == Some(0) {
            return Err(Error::invalid("default_port", "must be between 1 and 65535"));
        }
        if self.password.is_some() && self.password_file.is_some() {
            return Err(Error::ConflictingSecrets);
        }
        if self
            .password
            .as_ref()
            .is_some_and(|secret| secret.expose().contains('\r'))
        {
            return Err(Error::invalid(
                "password",
                "cannot contain carriage-return characters",
            ));
        }
        Ok(())
    }
}
