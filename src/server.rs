// ABOUTME: JSON-lines request loop: one call per input line, one reply per output line.
// ABOUTME: Calls run concurrently; shutdown closes every remaining session.

use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::session::SessionManager;
use crate::tool::{self, RequestError, ToolCall, ToolResponse};

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: Value,
    pub result: ToolResponse,
}

/// Parse one input line and run it.
pub async fn handle_line(manager: &SessionManager, line: &str) -> Reply {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            return Reply {
                id: Value::Null,
                result: RequestError::from(e).into(),
            };
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let result = match serde_json::from_value::<ToolCall>(value) {
        Ok(call) => tool::call(manager, call).await,
        Err(e) => RequestError::from(e).into(),
    };
    Reply { id, result }
}

/// How the input loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Input closed; in-flight calls were allowed to finish.
    EndOfInput,
    /// Interrupted; in-flight calls were cancelled.
    Interrupted,
}

/// Serve requests from `input` until it closes or `interrupt` resolves.
pub async fn serve<R, W, F>(
    manager: Arc<SessionManager>,
    input: R,
    output: W,
    interrupt: F,
) -> StopReason
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = rx.recv().await {
            let mut json = match serde_json::to_string(&reply) {
                Ok(json) => json,
                Err(e) => {
                    error!("failed to serialize reply: {e}");
                    continue;
                }
            };
            json.push('\n');
            if let Err(e) = output.write_all(json.as_bytes()).await {
                warn!("output closed: {e}");
                break;
            }
            if let Err(e) = output.flush().await {
                warn!("output closed: {e}");
                break;
            }
        }
    });

    let mut lines = input.lines();
    let mut in_flight = JoinSet::new();
    tokio::pin!(interrupt);

    let reason = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let manager = Arc::clone(&manager);
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        let reply = handle_line(&manager, &line).await;
                        let _ = tx.send(reply);
                    });
                }
                Ok(None) => break StopReason::EndOfInput,
                Err(e) => {
                    warn!("failed to read input: {e}");
                    break StopReason::EndOfInput;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("request task failed: {e}");
                }
            }
            _ = &mut interrupt => break StopReason::Interrupted,
        }
    };

    match reason {
        StopReason::EndOfInput => {
            debug!(pending = in_flight.len(), "input closed, waiting for in-flight calls");
            while in_flight.join_next().await.is_some() {}
        }
        StopReason::Interrupted => {
            info!(pending = in_flight.len(), "interrupted, cancelling in-flight calls");
            in_flight.shutdown().await;
        }
    }

    let closed = manager.shutdown().await;
    info!(closed, "server stopped");

    drop(tx);
    if let Err(e) = writer.await {
        error!("writer task failed: {e}");
    }
    reason
}
