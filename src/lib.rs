// ABOUTME: Library root for sshmux - exposes the session manager and its surfaces.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod ssh;
pub mod tool;
pub mod types;
