//! Operation routing: dispatches an `Operation` to its tool handler by name.

use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tower::Service;

use super::operation::{Operation, OperationError, OperationFuture, OperationResponse};
use super::registry::ToolRegistry;

// ---------------------------------------------------------------------------
// OperationRouter
// ---------------------------------------------------------------------------

/// Routes `Operation` values to the handler registered under `ctx.tool_name`.
///
/// The router only holds an `Arc` to the registry, so clones are cheap and
/// every in-flight call can own its own copy of the dispatch stack. A blank
/// name or non-object parameters fail with `OperationError::Validation`;
/// names with no registered handler return `OperationError::UnknownTool`.
/// Both checks run inside the stack so the metrics layer records them.
#[derive(Clone)]
pub struct OperationRouter {
    registry: Arc<ToolRegistry>,
}

impl OperationRouter {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

impl Service<Operation> for OperationRouter {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Handlers are plain async functions with no readiness of their own.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let (ctx, params) = op.into_parts();
        if let Err(e) = check_shape(&ctx.tool_name, &params) {
            return Box::pin(async move { Err(e) });
        }
        match self.registry.get(&ctx.tool_name) {
            Some(handler) => Box::pin(async move { handler.call(params).await }),
            None => Box::pin(async move {
                Err(OperationError::UnknownTool {
                    name: ctx.tool_name,
                })
            }),
        }
    }
}

fn check_shape(tool_name: &str, params: &Value) -> Result<(), OperationError> {
    if tool_name.is_empty() {
        return Err(OperationError::validation(tool_name, "tool name must not be empty"));
    }
    if !params.is_object() {
        return Err(OperationError::validation(
            tool_name,
            format!("arguments must be a JSON object, got {}", kind_of(params)),
        ));
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
