//! Pipeline execution engine.
//!
//! Runs the steps of a `PipelineRequest` strictly in order. Each step sees only
//! the previous completed step's result: its condition decides whether it runs,
//! its transform decides the call parameters. Every dispatched step goes through
//! the same middleware stack as a standalone call, so the metrics collector
//! cannot tell the two apart. The first failure stops the run.

use std::sync::Arc;

use serde_json::Value;
use tower::{Service, ServiceExt};
use tracing::{info_span, Instrument};
use trackflow_core::{
    ExecutionContext, PipelineRequest, StepFunctions, StepOutcome, StructuredError, ToolCall,
};

use super::classify::OperationService;
use super::operation::{CallerOrigin, Operation, OperationError, OperationResponse};
use super::response::shape;

// ---------------------------------------------------------------------------
// PipelineEngine
// ---------------------------------------------------------------------------

/// Executes pipelines against a dispatch service `S`.
///
/// `S` is cloned per step and driven with `oneshot`, so one engine can serve
/// any number of concurrent runs.
pub struct PipelineEngine<S> {
    dispatcher: S,
    classifier: Arc<OperationService>,
    functions: Arc<StepFunctions>,
}

impl<S> PipelineEngine<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    #[must_use]
    pub fn new(
        dispatcher: S,
        classifier: Arc<OperationService>,
        functions: Arc<StepFunctions>,
    ) -> Self {
        Self {
            dispatcher,
            classifier,
            functions,
        }
    }

    /// Runs every step of `request` and returns one outcome per step.
    ///
    /// A missing `context` is replaced by a fresh one so every step of the run
    /// shares a request id.
    ///
    /// # Errors
    ///
    /// Returns the first step failure as a `StructuredError` tagged with the
    /// step's index and tool name. Steps after it are never invoked.
    pub async fn execute(
        &self,
        request: &PipelineRequest,
    ) -> Result<Vec<StepOutcome>, StructuredError> {
        let exec = request
            .context
            .clone()
            .unwrap_or_else(ExecutionContext::fresh);

        let span = info_span!(
            "pipeline",
            request_id = %exec.request_id,
            steps = request.steps.len(),
            outcome = tracing::field::Empty,
        );

        async {
            let result = self.run_steps(request, &exec).await;
            let span = tracing::Span::current();
            match &result {
                Ok(outcomes) => {
                    span.record("outcome", "ok");
                    tracing::info!(completed = outcomes.len(), "pipeline complete");
                }
                Err(err) => {
                    span.record("outcome", "error");
                    tracing::warn!(code = %err.code, message = %err.message, "pipeline failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_steps(
        &self,
        request: &PipelineRequest,
        exec: &ExecutionContext,
    ) -> Result<Vec<StepOutcome>, StructuredError> {
        let mut previous: Option<Value> = None;
        let mut outcomes = Vec::with_capacity(request.steps.len());

        for (index, step) in request.steps.iter().enumerate() {
            let tool = step.tool_name.as_str();

            if let Some(condition) = &step.condition {
                let pass = condition
                    .evaluate(previous.as_ref(), &self.functions)
                    .map_err(|e| e.at_step(index, tool))?;
                if !pass {
                    tracing::debug!(step = index, tool, "condition false, step skipped");
                    outcomes.push(StepOutcome::Skipped {
                        tool_name: tool.to_string(),
                    });
                    continue;
                }
            }

            let params = match &step.transform {
                Some(transform) => transform
                    .apply(previous.as_ref(), &self.functions)
                    .map_err(|e| e.at_step(index, tool))?,
                None => step.params.clone(),
            };

            let op = self.classifier.classify(
                ToolCall::new(tool, params),
                exec,
                CallerOrigin::PipelineStep { index },
            );

            tracing::debug!(step = index, tool, "dispatching step");
            let result = self
                .dispatcher
                .clone()
                .oneshot(op)
                .await
                .map_err(|e| shape(e).at_step(index, tool))?;

            previous = Some(result.clone());
            outcomes.push(StepOutcome::Completed {
                tool_name: tool.to_string(),
                result,
            });
        }

        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use trackflow_core::{Condition, ErrorCode, Step, Transform};

    use super::*;
    use crate::service::config::ServerConfig;
    use crate::service::registry::{ToolHandler, ToolRegistry};
    use crate::service::router::OperationRouter;

    /// Returns a canned result and remembers every parameter object it saw.
    struct Recorder {
        name: &'static str,
        reply: Result<Value, fn() -> OperationError>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Value>>,
    }

    impl Recorder {
        fn ok(name: &'static str, reply: Value) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str, err: fn() -> OperationError) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Err(err),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "records its calls"
        }

        async fn call(&self, params: Value) -> Result<Value, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(params);
            match &self.reply {
                Ok(v) => Ok(v.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn engine(tools: &[Arc<Recorder>]) -> PipelineEngine<OperationRouter> {
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register_arc(Arc::clone(tool) as Arc<dyn ToolHandler>);
        }
        PipelineEngine::new(
            OperationRouter::new(registry),
            Arc::new(OperationService::new(Arc::new(ServerConfig::default()))),
            Arc::new(StepFunctions::new()),
        )
    }

    fn request(steps: Vec<Step>) -> PipelineRequest {
        PipelineRequest {
            steps,
            context: None,
        }
    }

    #[tokio::test]
    async fn empty_pipeline_returns_no_outcomes() {
        let outcomes = engine(&[]).execute(&request(vec![])).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let a = Recorder::ok("list_teams", json!({ "nodes": [] }));
        let b = Recorder::failing("get_team", || OperationError::Network("reset".into()));
        let c = Recorder::ok("list_users", json!({}));
        let engine = engine(&[Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)]);

        let err = engine
            .execute(&request(vec![
                Step::new("list_teams", json!({})),
                Step::new("get_team", json!({ "id": "t1" })),
                Step::new("list_users", json!({})),
            ]))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.retryable);
        let step = err.step.unwrap();
        assert_eq!(step.index, 1);
        assert_eq!(step.tool_name, "get_team");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn skipped_step_keeps_its_slot_and_previous_result() {
        let a = Recorder::ok("list_issues", json!({ "nodes": [{ "id": "i1" }] }));
        let b = Recorder::ok("create_issue", json!({ "id": "new" }));
        let c = Recorder::ok("get_issue", json!({ "id": "i1" }));
        let engine = engine(&[Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)]);

        let outcomes = engine
            .execute(&request(vec![
                Step::new("list_issues", json!({})),
                Step::new("create_issue", json!({})).when(Condition::Equals {
                    path: "nodes.0.id".into(),
                    value: json!("zzz"),
                }),
                Step::new("get_issue", json!({})).with_transform(Transform::Template {
                    template: json!({ "id": "{{nodes.0.id}}" }),
                }),
            ]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[1].is_skipped());
        assert_eq!(outcomes[1].tool_name(), "create_issue");
        assert_eq!(b.calls(), 0);
        // The skipped step did not replace the previous result.
        assert_eq!(c.seen.lock()[0], json!({ "id": "i1" }));
    }

    #[tokio::test]
    async fn first_step_condition_sees_no_previous_result() {
        let a = Recorder::ok("get_viewer", json!({ "id": "u1" }));
        let engine = engine(&[Arc::clone(&a)]);

        let outcomes = engine
            .execute(&request(vec![Step::new("get_viewer", json!({})).when(
                Condition::Exists { path: String::new() },
            )]))
            .await
            .unwrap();
        assert!(outcomes[0].is_skipped());
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn transform_failure_stops_the_run() {
        let a = Recorder::ok("list_issues", json!({ "nodes": [] }));
        let b = Recorder::ok("create_issue", json!({}));
        let engine = engine(&[Arc::clone(&a), Arc::clone(&b)]);

        let err = engine
            .execute(&request(vec![
                Step::new("list_issues", json!({})),
                Step::new("create_issue", json!({})).with_transform(Transform::Select {
                    path: "nodes.0".into(),
                }),
            ]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformError);
        assert_eq!(err.step.unwrap().index, 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_pattern_is_a_validation_error_for_that_step() {
        let a = Recorder::ok("search_issues", json!({ "title": "x" }));
        let engine = engine(&[Arc::clone(&a)]);

        let err = engine
            .execute(&request(vec![Step::new("search_issues", json!({})).when(
                Condition::Matches {
                    path: "title".into(),
                    pattern: "(".into(),
                },
            )]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.step.unwrap().index, 0);
    }

    #[tokio::test]
    async fn non_object_params_are_rejected_before_the_handler() {
        let a = Recorder::ok("get_issue", json!({}));
        let engine = engine(&[Arc::clone(&a)]);

        let err = engine
            .execute(&request(vec![Step::new("get_issue", json!("i1"))]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_tagged_with_its_index() {
        let err = engine(&[])
            .execute(&request(vec![Step::new("no_such_tool", json!({}))]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownTool);
        assert_eq!(err.step.unwrap().tool_name, "no_such_tool");
    }
}
