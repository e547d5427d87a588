// ABOUTME: Input checks applied before any process is spawned.
// ABOUTME: Rejects empty, multi-line or oversized commands and multi-line directories.

use thiserror::Error;

use crate::types::SessionIdError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    SessionId(#[from] SessionIdError),

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("command cannot contain newline characters")]
    CommandNewline,

    #[error("command length exceeds maximum of {max} characters")]
    CommandTooLong { max: usize },

    #[error("working_directory cannot contain newline characters")]
    WorkingDirectoryNewline,
}

/// Trim and check a remote command.
pub fn command(raw: &str, max_chars: usize) -> Result<String, ValidationError> {
    let command = raw.trim();
    if command.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if command.contains(['\n', '\r']) {
        return Err(ValidationError::CommandNewline);
    }
    if command.chars().count() > max_chars {
        return Err(ValidationError::CommandTooLong { max: max_chars });
    }
    Ok(command.to_string())
}

/// Blank directories mean "none".
pub fn working_directory(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(dir) = raw.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if dir.contains(['\n', '\r']) {
        return Err(ValidationError::WorkingDirectoryNewline);
    }
    Ok(Some(dir.to_string()))
}
