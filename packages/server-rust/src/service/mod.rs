//! Operation dispatch and pipeline execution.
//!
//! 1. **Classification** (`classify`): `ToolCall` -> `Operation`
//! 2. **Middleware** (`middleware`): Tower layers (metrics, load-shedding, timeout)
//! 3. **Routing** (`router`): Dispatch to tool handlers by name
//! 4. **Catalog** (`domain`): GraphQL-backed tool handlers
//! 5. **Pipelines** (`engine`): Sequential steps with conditions and transforms
//! 6. **Shaping** (`response`, `tool_server`): Every outcome becomes a `ToolResponse`
//! 7. **Background workers** (`worker`): Periodic metrics reports

pub mod classify;
pub mod collector;
pub mod config;
pub mod domain;
pub mod engine;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod response;
pub mod router;
pub mod tool_server;
pub mod worker;

pub use classify::OperationService;
pub use collector::{MetricsCollector, MetricsReport, MetricsSample, ToolStats};
pub use config::ServerConfig;
pub use engine::PipelineEngine;
pub use middleware::{build_dispatch_stack, DispatchStack};
pub use operation::{CallerOrigin, Operation, OperationContext, OperationError, OperationResponse};
pub use registry::{ToolDescriptor, ToolHandler, ToolRegistry};
pub use router::OperationRouter;
pub use tool_server::{builtin_step_functions, ToolServer, PIPELINE_TOOL};
pub use worker::{BackgroundRunnable, BackgroundWorker, MetricsReporter, ReportTask};
