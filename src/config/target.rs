// ABOUTME: Remote target resolution for new sessions.
// ABOUTME: Applies configured defaults, the host allowlist and port bounds.

use serde::Serialize;
use thiserror::Error;

use super::Settings;
use crate::types::{Hostname, IdentifierError, Username};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("host is required when SSHMUX_DEFAULT_HOST is not set")]
    MissingHost,

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("port must be between 1 and 65535 (got {0})")]
    PortOutOfRange(i64),

    #[error("host '{host}' is not allowlisted. Allowed hosts: {allowed}")]
    NotAllowed { host: String, allowed: String },
}

/// A fully resolved ssh destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub host: Hostname,
    pub user: Option<Username>,
    pub port: Option<u16>,
}

impl Target {
    /// Destination argument for ssh: `user@host` or `host`.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Settings {
    /// Resolve caller-supplied target parts against the configured defaults.
    pub fn resolve_target(
        &self,
        host: Option<&str>,
        user: Option<&str>,
        port: Option<i64>,
    ) -> Result<Target, TargetError> {
        let host = match non_blank(host) {
            Some(raw) => Hostname::new(raw)?,
            None => self.default_host.clone().ok_or(TargetError::MissingHost)?,
        };

        let user = match non_blank(user) {
            Some(raw) => Some(Username::new(raw)?),
            None => self.default_user.clone(),
        };

        let port = match port {
            Some(value) => Some(
                u16::try_from(value)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or(TargetError::PortOutOfRange(value))?,
            ),
            None => self.default_port,
        };

        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.contains(&host) {
            let allowed = self
                .allowed_hosts
                .iter()
                .map(Hostname::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(TargetError::NotAllowed {
                host: host.to_string(),
                allowed,
            });
        }

        Ok(Target { host, user, port })
    }
}
