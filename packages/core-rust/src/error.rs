//! Structured error shape returned across every call boundary.
//!
//! `ErrorCode` is a closed classification. Retryability and remediation
//! suggestions are static properties of the code, never inferred from the
//! message text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Classification of every failure that can leave the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or missing parameters.
    ValidationError,
    /// No operation registered under the requested name.
    UnknownTool,
    /// The provider throttled the request.
    RateLimited,
    /// Transport failure or provider-side 5xx.
    NetworkError,
    /// The per-call deadline elapsed.
    Timeout,
    /// The server rejected the call because too many are in flight.
    Overloaded,
    /// Missing or invalid credentials.
    AuthenticationError,
    /// The referenced remote entity does not exist.
    NotFound,
    /// The provider answered with application-level errors.
    RemoteError,
    /// A step transform could not be evaluated against the previous result.
    TransformError,
    /// Unclassified failure. The raw error is kept in `details`.
    ToolError,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::ValidationError,
        ErrorCode::UnknownTool,
        ErrorCode::RateLimited,
        ErrorCode::NetworkError,
        ErrorCode::Timeout,
        ErrorCode::Overloaded,
        ErrorCode::AuthenticationError,
        ErrorCode::NotFound,
        ErrorCode::RemoteError,
        ErrorCode::TransformError,
        ErrorCode::ToolError,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::UnknownTool => "UNKNOWN_TOOL",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Overloaded => "OVERLOADED",
            ErrorCode::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RemoteError => "REMOTE_ERROR",
            ErrorCode::TransformError => "TRANSFORM_ERROR",
            ErrorCode::ToolError => "TOOL_ERROR",
        }
    }

    /// Whether a caller may retry the same request unchanged.
    ///
    /// Only transient conditions qualify.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited
                | ErrorCode::NetworkError
                | ErrorCode::Timeout
                | ErrorCode::Overloaded
        )
    }

    /// Fixed remediation hints for this code.
    #[must_use]
    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            ErrorCode::ValidationError => &[
                "Check the parameter names and types against the tool description",
                "Provide every required parameter",
            ],
            ErrorCode::UnknownTool => &[
                "Check the tool name for typos",
                "List the available tools to see valid names",
            ],
            ErrorCode::RateLimited => &[
                "Wait a moment and retry the request",
                "Reduce request frequency",
            ],
            ErrorCode::NetworkError => &[
                "Check network connectivity to the issue tracker",
                "Retry the request",
            ],
            ErrorCode::Timeout => &[
                "Retry the request",
                "Request fewer items per call",
            ],
            ErrorCode::Overloaded => &[
                "Wait a moment and retry the request",
                "Reduce the number of concurrent requests",
            ],
            ErrorCode::AuthenticationError => &[
                "Check that the API key is set and valid",
                "Verify the key has access to the workspace",
            ],
            ErrorCode::NotFound => &[
                "Check that the identifier is correct",
                "Verify the entity has not been archived or deleted",
            ],
            ErrorCode::RemoteError => &[
                "Check the request parameters",
                "Inspect the error details returned by the issue tracker",
            ],
            ErrorCode::TransformError => &[
                "Check that the transform paths exist in the previous step's result",
                "Add a condition so the step only runs when its input is present",
            ],
            ErrorCode::ToolError => &[
                "Check the request parameters",
                "Retry the operation if the problem persists",
            ],
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StructuredError
// ---------------------------------------------------------------------------

/// Position of a failing step within a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub index: usize,
    pub tool_name: String,
}

/// Normalized failure shape. `retryable` is always present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<StepRef>,
}

impl StructuredError {
    /// Builds an error whose retryability and suggestions come from `code`.
    ///
    /// An empty message is replaced by the code itself so `message` is never blank.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = code.as_str().to_string();
        }
        Self {
            code,
            message,
            retryable: code.is_retryable(),
            details: None,
            suggestions: code.suggestions().iter().map(|s| (*s).to_string()).collect(),
            step: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Tags the error with the pipeline step that produced it.
    #[must_use]
    pub fn at_step(mut self, index: usize, tool_name: impl Into<String>) -> Self {
        self.step = Some(StepRef {
            index,
            tool_name: tool_name.into(),
        });
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransformError, message)
    }
}
