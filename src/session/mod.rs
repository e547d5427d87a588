// ABOUTME: Session lifecycle management over multiplexed ssh channels.
// ABOUTME: The manager, its table, and the request and result types it speaks.

mod dir;
mod error;
mod manager;
mod outcome;
mod record;
mod request;
mod table;
mod teardown;
mod validate;

pub use dir::{CONTROL_PATH_LIMIT, SessionDir};
pub use error::{ErrorKind, Result, SessionError};
pub use manager::SessionManager;
pub use outcome::{
    CloseOutcome, ExecOutcome, HealthReport, OpenOutcome, SessionInfo, SessionList,
};
pub use record::SessionRecord;
pub use request::{CloseRequest, ExecRequest, OpenRequest};
pub use table::{CapacityError, Reservation, SessionTable};
pub use validate::ValidationError;
