//! Transport-facing facade: one entry point for standalone calls and pipelines.
//!
//! Every result leaves as a `ToolResponse`; no raw error crosses this boundary.

use std::sync::Arc;

use serde_json::{json, Value};
use tower::ServiceExt;
use trackflow_core::{
    ErrorCode, ExecutionContext, PipelineRequest, StepFunctions, StructuredError, ToolCall,
    ToolResponse,
};

use super::classify::OperationService;
use super::collector::MetricsCollector;
use super::config::ServerConfig;
use super::domain::register_catalog;
use super::engine::PipelineEngine;
use super::middleware::{build_dispatch_stack, DispatchStack};
use super::operation::CallerOrigin;
use super::registry::{ToolDescriptor, ToolRegistry};
use super::response::shape;
use super::router::OperationRouter;
use crate::traits::TrackerApi;

/// Reserved call name that routes the arguments to the pipeline engine.
pub const PIPELINE_TOOL: &str = "execute_pipeline";

const PIPELINE_DESCRIPTION: &str =
    "Run several tools in sequence, gating each step on the previous result and reshaping its parameters";

/// Owns the dispatch stack, the pipeline engine and the metrics collector.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    dispatch: DispatchStack,
    classifier: Arc<OperationService>,
    engine: PipelineEngine<DispatchStack>,
    collector: Arc<MetricsCollector>,
}

impl ToolServer {
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        config: &ServerConfig,
        collector: Arc<MetricsCollector>,
        functions: StepFunctions,
    ) -> Self {
        let classifier = Arc::new(OperationService::new(Arc::new(config.clone())));
        let dispatch = build_dispatch_stack(
            OperationRouter::new(Arc::clone(&registry)),
            config,
            Arc::clone(&collector),
        );
        let engine = PipelineEngine::new(
            dispatch.clone(),
            Arc::clone(&classifier),
            Arc::new(functions),
        );
        Self {
            registry,
            dispatch,
            classifier,
            engine,
            collector,
        }
    }

    /// A server exposing the full tool catalog over `api`, with the builtin
    /// step functions.
    #[must_use]
    pub fn with_catalog(
        api: &Arc<dyn TrackerApi>,
        config: &ServerConfig,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        register_catalog(&registry, api);
        Self::new(registry, config, collector, builtin_step_functions())
    }

    /// Handles one call from the transport.
    pub async fn call(&self, call: ToolCall) -> ToolResponse {
        if call.name.trim() == PIPELINE_TOOL {
            return match serde_json::from_value::<PipelineRequest>(call.arguments) {
                Ok(request) => self.run_pipeline(&request).await,
                Err(e) => ToolResponse::failure(
                    &StructuredError::validation(format!("invalid pipeline request: {e}"))
                        .with_details(json!({ "error": e.to_string() })),
                ),
            };
        }

        match self.call_tool(call).await {
            Ok(result) => ToolResponse::success(&result),
            Err(err) => ToolResponse::failure(&err),
        }
    }

    /// Dispatches a single operation under a fresh execution context.
    ///
    /// # Errors
    ///
    /// Any dispatch or handler failure, already shaped.
    pub async fn call_tool(&self, call: ToolCall) -> Result<Value, StructuredError> {
        let exec = ExecutionContext::fresh();
        let op = self.classifier.classify(call, &exec, CallerOrigin::Direct);
        self.dispatch.clone().oneshot(op).await.map_err(shape)
    }

    /// Runs a pipeline and wraps the per-step outcomes.
    pub async fn run_pipeline(&self, request: &PipelineRequest) -> ToolResponse {
        let outcome = self.engine.execute(request).await.and_then(|outcomes| {
            serde_json::to_value(outcomes).map_err(|e| {
                StructuredError::new(ErrorCode::ToolError, "failed to serialize pipeline result")
                    .with_details(json!({ "error": e.to_string() }))
            })
        });
        match outcome {
            Ok(result) => ToolResponse::success(&result),
            Err(err) => ToolResponse::failure(&err),
        }
    }

    /// Every callable name with its description, catalog first.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = self.registry.descriptors();
        tools.push(ToolDescriptor {
            name: PIPELINE_TOOL.to_string(),
            description: PIPELINE_DESCRIPTION.to_string(),
        });
        tools
    }

    #[must_use]
    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    #[must_use]
    pub fn engine(&self) -> &PipelineEngine<DispatchStack> {
        &self.engine
    }
}

/// Conditions and transforms every server offers by name.
///
/// - condition `has_nodes`: the previous result has a non-empty `nodes` array
/// - transform `first_node`: the first element of the previous result's `nodes`
#[must_use]
pub fn builtin_step_functions() -> StepFunctions {
    let mut functions = StepFunctions::new();
    functions.register_condition("has_nodes", |previous| {
        previous
            .and_then(|r| r.get("nodes"))
            .and_then(Value::as_array)
            .is_some_and(|nodes| !nodes.is_empty())
    });
    functions.register_transform("first_node", |previous| {
        previous
            .and_then(|r| r.get("nodes"))
            .and_then(|nodes| nodes.get(0))
            .cloned()
            .ok_or_else(|| "previous result has no nodes".to_string())
    });
    functions
}
