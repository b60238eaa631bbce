//! Tool call dispatch.
//!
//! [`RequestDispatcher`] turns a [`ToolCall`] into a [`ToolResponse`]. Every
//! outcome, including handler panics and timeouts, is a typed response
//! carrying the id of the call.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::backend::SearchBackend;
use crate::observability::ToolCallSpan;
use crate::protocol::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, RequestId, SERVER_ERROR,
};
use crate::tools::{ToolError, ToolRegistry};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

const INTERNAL_MESSAGE: &str = "internal error while executing tool";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    UnknownTool,
    InvalidArguments,
    BackendError,
    TransportMalformed,
    Internal,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::BackendError => "backend_error",
            Self::TransportMalformed => "transport_malformed",
            Self::Internal => "internal",
        }
    }

    /// JSON-RPC error code used on the wire.
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            Self::UnknownTool => METHOD_NOT_FOUND,
            Self::InvalidArguments => INVALID_PARAMS,
            Self::BackendError => SERVER_ERROR,
            Self::TransportMalformed => INVALID_REQUEST,
            Self::Internal => INTERNAL_ERROR,
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub code: FailureCode,
    pub message: String,
}

impl Failure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ToolError> for Failure {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidArguments { message } => {
                Self::new(FailureCode::InvalidArguments, message)
            }
            ToolError::Backend(e) => Self::new(FailureCode::BackendError, e.to_string()),
            ToolError::Internal { .. } => Self::new(FailureCode::Internal, INTERNAL_MESSAGE),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(Failure),
}

/// A `tools/call` request.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: RequestId,
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<RequestId>, tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResponse {
    pub id: RequestId,
    pub outcome: Outcome,
}

impl ToolResponse {
    pub fn success(id: RequestId, payload: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Success(payload),
        }
    }

    pub fn failure(id: RequestId, code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Failure(Failure::new(code, message)),
        }
    }

    pub fn failure_code(&self) -> Option<FailureCode> {
        match &self.outcome {
            Outcome::Failure(f) => Some(f.code),
            Outcome::Success(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }
}

/// Resolves and executes tool calls. Holds no per-call state.
#[derive(Clone)]
pub struct RequestDispatcher {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn SearchBackend>,
    call_timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            registry,
            backend,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResponse {
        let ToolCall {
            id,
            tool,
            arguments,
        } = call;

        let Some(descriptor) = self.registry.lookup(&tool) else {
            tracing::debug!(tool = %tool, request_id = %id, "Unknown tool");
            return ToolResponse::failure(
                id,
                FailureCode::UnknownTool,
                format!("Unknown tool: {}", tool),
            );
        };

        let span = ToolCallSpan::new(&tool, &id.to_string());

        let args = match descriptor.validate(arguments) {
            Ok(args) => args,
            Err(problems) => {
                span.record_failure(FailureCode::InvalidArguments.as_str());
                span.finish(true);
                return ToolResponse::failure(
                    id,
                    FailureCode::InvalidArguments,
                    problems.join("; "),
                );
            }
        };

        let call = descriptor.handler.call(args, self.backend.as_ref());
        let guarded = AssertUnwindSafe(tokio::time::timeout(self.call_timeout, call))
            .catch_unwind()
            .instrument(span.span().clone())
            .await;

        let response = match guarded {
            Ok(Ok(Ok(payload))) => ToolResponse::success(id, payload),
            Ok(Ok(Err(err))) => {
                if let ToolError::Internal { message } = &err {
                    tracing::error!(tool = %tool, error = %message, "Tool failed internally");
                } else {
                    tracing::warn!(tool = %tool, error = %err, "Tool call failed");
                }
                let failure = Failure::from(err);
                ToolResponse::failure(id, failure.code, failure.message)
            }
            Ok(Err(_elapsed)) => {
                tracing::warn!(tool = %tool, timeout_secs = self.call_timeout.as_secs_f64(), "Tool call timed out");
                ToolResponse::failure(
                    id,
                    FailureCode::BackendError,
                    format!("tool '{}' timed out after {:?}", tool, self.call_timeout),
                )
            }
            Err(panic) => {
                tracing::error!(tool = %tool, panic = %panic_message(&*panic), "Tool handler panicked");
                ToolResponse::failure(id, FailureCode::Internal, INTERNAL_MESSAGE)
            }
        };

        if let Some(code) = response.failure_code() {
            span.record_failure(code.as_str());
        }
        span.finish(!response.is_success());
        response
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
