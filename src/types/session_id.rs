// ABOUTME: Session identifiers: eight lowercase hexadecimal characters.
// ABOUTME: Parsing normalises case and surrounding whitespace; generation draws random bits.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("session_id cannot be empty")]
    Empty,

    #[error("session_id cannot contain newline characters")]
    Newline,

    #[error("session_id format is invalid (expected 8 lowercase hex characters)")]
    Malformed,
}

/// Opaque handle for one open session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Number of hex characters in an identifier.
    pub const LEN: usize = 8;

    pub fn parse(raw: &str) -> Result<Self, SessionIdError> {
        let value = raw.trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if value.contains(['\n', '\r']) {
            return Err(SessionIdError::Newline);
        }
        if value.len() != Self::LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SessionIdError::Malformed);
        }
        Ok(Self(value))
    }

    /// Draw a fresh random identifier. Uniqueness is the table's job.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(hex[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
