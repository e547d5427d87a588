// ABOUTME: Drives the external OpenSSH client for ControlMaster multiplexing.
// ABOUTME: Command building, bounded process execution, askpass credentials and the health probe.

pub mod askpass;
mod command;
mod error;
mod probe;
pub mod process;

pub use askpass::{AskpassGuard, AuthMode, CredentialError, Credentials};
pub use command::{HANDSHAKE_MARKER, SshCommand, compose_remote};
pub use error::{Error, Result};
pub use probe::{ProbeReport, probe};
pub use process::ProcessOutput;
