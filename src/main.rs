// ABOUTME: Entry point for the sshmux CLI application.
// ABOUTME: Loads settings, installs logging on stderr and dispatches subcommands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sshmux::config::Settings;
use sshmux::error::Result;
use sshmux::server::{self, StopReason};
use sshmux::session::SessionManager;
use sshmux::tool::ToolResponse;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Exit without dropping the runtime: a pending blocking stdin read would hold it open.
    // Every teardown has been awaited by the time `run` returns.
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env()?,
    };
    let manager = SessionManager::new(settings)?;

    match cli.command {
        Commands::Serve => {
            let manager = Arc::new(manager);
            let input = BufReader::new(tokio::io::stdin());
            let reason = server::serve(manager, input, tokio::io::stdout(), shutdown_signal()).await;
            Ok(match reason {
                StopReason::EndOfInput => 0,
                StopReason::Interrupted => 130,
            })
        }
        Commands::Health { json } => {
            let result = manager.health_check().await;
            if json {
                let response = match &result {
                    Ok(report) => ToolResponse::success(report),
                    Err(e) => ToolResponse::failure(e.kind(), e.to_string()),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(if response.is_ok() { 0 } else { 1 });
            }
            let report = result?;
            println!("{}: {}", report.command, report.version);
            Ok(0)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let term = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = term => {}
    }
}
