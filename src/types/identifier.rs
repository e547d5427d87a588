// ABOUTME: Validated host and user names accepted on the ssh command line.
// ABOUTME: Restricts values to letters, digits, dot, underscore and hyphen.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} cannot contain newline characters")]
    Newline { field: &'static str },

    #[error(
        "{field} contains invalid characters. Allowed characters: letters, digits, dot, underscore, hyphen"
    )]
    InvalidChars { field: &'static str },

    #[error("{field} cannot start with a hyphen")]
    LeadingHyphen { field: &'static str },
}

fn validate(raw: &str, field: &'static str) -> Result<String, IdentifierError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(IdentifierError::Empty { field });
    }
    if value.contains(['\n', '\r']) {
        return Err(IdentifierError::Newline { field });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(IdentifierError::InvalidChars { field });
    }
    // A leading hyphen would be read by ssh as an option.
    if value.starts_with('-') {
        return Err(IdentifierError::LeadingHyphen { field });
    }
    Ok(value.to_string())
}

/// Remote host name or address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    pub fn new(raw: &str) -> Result<Self, IdentifierError> {
        validate(raw, "host").map(Self)
    }

    /// Validate with a caller-supplied field name for error messages.
    pub fn for_field(raw: &str, field: &'static str) -> Result<Self, IdentifierError> {
        validate(raw, field).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote login name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(raw: &str) -> Result<Self, IdentifierError> {
        validate(raw, "user").map(Self)
    }

    pub fn for_field(raw: &str, field: &'static str) -> Result<Self, IdentifierError> {
        validate(raw, field).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
