// ABOUTME: Typed tool calls on top of the session manager.
// ABOUTME: Every outcome becomes `{ok: true, ...}` or `{ok: false, error_type, message}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::session::{
    CloseRequest, ErrorKind, ExecRequest, OpenRequest, SessionError, SessionManager,
};

/// Raw call as it arrives on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub enum ToolRequest {
    OpenSession(OpenRequest),
    SessionExec(ExecRequest),
    CloseSession(CloseRequest),
    HealthCheck,
    ListSessions,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn arguments<T: serde::de::DeserializeOwned>(
    tool: &'static str,
    value: Value,
) -> Result<T, RequestError> {
    // Absent arguments read as an empty object.
    let value = match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(value).map_err(|source| RequestError::InvalidArguments { tool, source })
}

impl TryFrom<ToolCall> for ToolRequest {
    type Error = RequestError;

    fn try_from(call: ToolCall) -> Result<Self, RequestError> {
        match call.tool.as_str() {
            "open_session" => arguments("open_session", call.arguments).map(Self::OpenSession),
            "session_exec" => arguments("session_exec", call.arguments).map(Self::SessionExec),
            "close_session" => arguments("close_session", call.arguments).map(Self::CloseSession),
            "health_check" => {
                arguments::<Map<String, Value>>("health_check", call.arguments)
                    .map(|_| Self::HealthCheck)
            }
            "list_sessions" => {
                arguments::<Map<String, Value>>("list_sessions", call.arguments)
                    .map(|_| Self::ListSessions)
            }
            other => Err(RequestError::UnknownTool(other.to_string())),
        }
    }
}

impl ToolRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::OpenSession(_) => "open_session",
            ToolRequest::SessionExec(_) => "session_exec",
            ToolRequest::CloseSession(_) => "close_session",
            ToolRequest::HealthCheck => "health_check",
            ToolRequest::ListSessions => "list_sessions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    Success {
        ok: bool,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
    Failure {
        ok: bool,
        error_type: ErrorKind,
        message: String,
    },
}

impl ToolResponse {
    pub fn success<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::Object(payload)) => ToolResponse::Success { ok: true, payload },
            Ok(other) => {
                let mut payload = Map::new();
                payload.insert("result".to_string(), other);
                ToolResponse::Success { ok: true, payload }
            }
            Err(e) => Self::failure(ErrorKind::Execution, format!("failed to encode result: {e}")),
        }
    }

    pub fn failure(error_type: ErrorKind, message: impl Into<String>) -> Self {
        ToolResponse::Failure {
            ok: false,
            error_type,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResponse::Success { .. })
    }

    pub fn error_type(&self) -> Option<ErrorKind> {
        match self {
            ToolResponse::Failure { error_type, .. } => Some(*error_type),
            ToolResponse::Success { .. } => None,
        }
    }

    /// A field of a successful payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            ToolResponse::Success { payload, .. } => payload.get(key),
            ToolResponse::Failure { .. } => None,
        }
    }
}

impl From<SessionError> for ToolResponse {
    fn from(err: SessionError) -> Self {
        ToolResponse::failure(err.kind(), err.to_string())
    }
}

impl From<RequestError> for ToolResponse {
    fn from(err: RequestError) -> Self {
        ToolResponse::failure(ErrorKind::Validation, err.to_string())
    }
}

fn respond<T: Serialize>(result: Result<T, SessionError>) -> ToolResponse {
    match result {
        Ok(value) => ToolResponse::success(&value),
        Err(err) => err.into(),
    }
}

/// Run one request against the manager.
pub async fn dispatch(manager: &SessionManager, request: ToolRequest) -> ToolResponse {
    let name = request.name();
    let response = match request {
        ToolRequest::OpenSession(args) => respond(manager.open_session(args).await),
        ToolRequest::SessionExec(args) => respond(manager.session_exec(args).await),
        ToolRequest::CloseSession(args) => respond(manager.close_session(&args.session_id).await),
        ToolRequest::HealthCheck => respond(manager.health_check().await),
        ToolRequest::ListSessions => ToolResponse::success(&manager.list_sessions()),
    };
    if let ToolResponse::Failure {
        error_type,
        message,
        ..
    } = &response
    {
        debug!(tool = name, %error_type, %message, "tool call failed");
    }
    response
}

/// Parse and run a raw call. Malformed calls are validation failures.
pub async fn call(manager: &SessionManager, call: ToolCall) -> ToolResponse {
    match ToolRequest::try_from(call) {
        Ok(request) => dispatch(manager, request).await,
        Err(e) => e.into(),
    }
}
