use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use trackflow_core::ErrorCode;

/// Origin of the operation caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    /// A standalone call from the transport.
    Direct,
    /// Step `index` of a pipeline run.
    PipelineStep { index: usize },
}

impl fmt::Display for CallerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerOrigin::Direct => f.write_str("direct"),
            CallerOrigin::PipelineStep { index } => write!(f, "step:{index}"),
        }
    }
}

/// Context carried with every operation through the middleware stack.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub tool_name: String,
    pub request_id: String,
    pub caller_origin: CallerOrigin,
    pub call_timeout_ms: u64,
    /// Caller-supplied retry attempt, recorded with the metrics sample.
    pub retry_count: u32,
}

impl OperationContext {
    /// Creates a direct-call context with no retry attempt recorded.
    pub fn new(
        call_id: u64,
        tool_name: impl Into<String>,
        request_id: impl Into<String>,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            request_id: request_id.into(),
            caller_origin: CallerOrigin::Direct,
            call_timeout_ms,
            retry_count: 0,
        }
    }
}

/// A classified call ready for dispatch: context plus the operation's parameters.
#[derive(Debug, Clone)]
pub struct Operation {
    ctx: OperationContext,
    params: Value,
}

impl Operation {
    #[must_use]
    pub fn new(ctx: OperationContext, params: Value) -> Self {
        Self { ctx, params }
    }

    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        &self.ctx
    }

    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    #[must_use]
    pub fn into_parts(self) -> (OperationContext, Value) {
        (self.ctx, self.params)
    }
}

/// Successful response from an operation handler: the operation's result object.
pub type OperationResponse = Value;

/// Boxed future returned by every service in the dispatch stack.
pub type OperationFuture =
    Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

/// Errors returned by operation handlers and middleware.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("invalid parameters for {tool}: {message}")]
    Validation { tool: String, message: String },
    #[error("rate limited by the issue tracker")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("issue tracker returned an error: {message}")]
    Remote { message: String, errors: Value },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    /// Classification code for this failure.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            OperationError::UnknownTool { .. } => ErrorCode::UnknownTool,
            OperationError::Validation { .. } => ErrorCode::ValidationError,
            OperationError::RateLimited { .. } => ErrorCode::RateLimited,
            OperationError::Network(_) => ErrorCode::NetworkError,
            OperationError::Authentication(_) => ErrorCode::AuthenticationError,
            OperationError::NotFound { .. } => ErrorCode::NotFound,
            OperationError::Remote { .. } => ErrorCode::RemoteError,
            OperationError::Timeout { .. } => ErrorCode::Timeout,
            OperationError::Overloaded => ErrorCode::Overloaded,
            OperationError::Internal(_) => ErrorCode::ToolError,
        }
    }

    pub fn validation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        OperationError::Validation {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
