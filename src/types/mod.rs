// ABOUTME: Validated newtypes shared across the crate.
// ABOUTME: Session identifiers plus host and user names.

mod identifier;
mod session_id;

pub use identifier::{Hostname, IdentifierError, Username};
pub use session_id::{SessionId, SessionIdError};
