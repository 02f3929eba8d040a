//! Call classification: converts a `ToolCall` into a dispatchable `Operation`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use trackflow_core::{ExecutionContext, ToolCall};

use super::config::ServerConfig;
use super::operation::{CallerOrigin, Operation, OperationContext};

// ---------------------------------------------------------------------------
// OperationService
// ---------------------------------------------------------------------------

/// Classifies incoming `ToolCall` values into `Operation`s.
///
/// Each call gets a unique call ID and the configured per-call timeout.
/// Classification never fails: the name and parameters are only normalized
/// here, and the router rejects bad ones inside the dispatch stack.
pub struct OperationService {
    config: Arc<ServerConfig>,
    call_id_counter: AtomicU64,
}

impl OperationService {
    /// Create a new `OperationService`.
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            call_id_counter: AtomicU64::new(1),
        }
    }

    /// Generate a unique call ID for each operation.
    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Classify a `ToolCall` made under `exec` into an `Operation`.
    ///
    /// The name is trimmed and a JSON null argument list becomes `{}`.
    #[must_use]
    pub fn classify(
        &self,
        call: ToolCall,
        exec: &ExecutionContext,
        caller_origin: CallerOrigin,
    ) -> Operation {
        let ToolCall { name, arguments } = call;
        let arguments = match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };

        let mut ctx = OperationContext::new(
            self.next_call_id(),
            name.trim(),
            exec.request_id.clone(),
            self.config.default_operation_timeout_ms,
        );
        ctx.caller_origin = caller_origin;
        ctx.retry_count = exec.retry_count_or_default();
        Operation::new(ctx, arguments)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_service() -> OperationService {
        OperationService::new(Arc::new(ServerConfig {
            default_operation_timeout_ms: 1234,
            ..ServerConfig::default()
        }))
    }

    #[test]
    fn classify_assigns_unique_call_ids_and_timeout() {
        let svc = make_service();
        let exec = ExecutionContext::fresh();
        let a = svc.classify(ToolCall::new("list_issues", json!({})), &exec, CallerOrigin::Direct);
        let b = svc.classify(ToolCall::new("list_teams", json!({})), &exec, CallerOrigin::Direct);
        assert_ne!(a.ctx().call_id, b.ctx().call_id);
        assert_eq!(a.ctx().call_timeout_ms, 1234);
        assert_eq!(a.ctx().request_id, exec.request_id);
    }

    #[test]
    fn classify_carries_pipeline_origin_and_retry_count() {
        let svc = make_service();
        let exec = ExecutionContext {
            retry_count: Some(3),
            ..ExecutionContext::fresh()
        };
        let op = svc.classify(
            ToolCall::new(" create_issue ", json!({ "title": "x" })),
            &exec,
            CallerOrigin::PipelineStep { index: 2 },
        );
        assert_eq!(op.ctx().tool_name, "create_issue");
        assert_eq!(op.ctx().caller_origin, CallerOrigin::PipelineStep { index: 2 });
        assert_eq!(op.ctx().retry_count, 3);
        assert_eq!(op.params(), &json!({ "title": "x" }));
    }

    #[test]
    fn classify_passes_non_object_arguments_through() {
        let op = make_service().classify(
            ToolCall::new("get_issue", json!(["id"])),
            &ExecutionContext::fresh(),
            CallerOrigin::Direct,
        );
        assert_eq!(op.params(), &json!(["id"]));
    }

    #[test]
    fn classify_treats_null_arguments_as_empty_object() {
        let svc = make_service();
        let op = svc.classify(
            ToolCall::new("get_viewer", Value::Null),
            &ExecutionContext::fresh(),
            CallerOrigin::Direct,
        );
        assert_eq!(op.params(), &json!({}));
    }
}
