// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the serve and health subcommands and global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sshmux")]
#[command(about = "Bounded remote command execution over reusable multiplexed SSH channels")]
#[command(version)]
pub struct Cli {
    /// Log at debug level (otherwise RUST_LOG, defaulting to warn)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// YAML settings file (SSHMUX_* environment variables are used when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve JSON-lines tool calls on stdin, replying on stdout
    Serve,

    /// Check that the configured ssh binary runs
    Health {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}
