//! `trackflow` core: structured errors, execution context, pipeline steps, and
//! the condition/transform evaluation that threads data between steps.

pub mod context;
pub mod error;
pub mod messages;
pub mod path;
pub mod pipeline;

pub use context::ExecutionContext;
pub use error::{ErrorCode, StepRef, StructuredError};
pub use messages::{Content, ToolCall, ToolResponse};
pub use pipeline::{Condition, PipelineRequest, Step, StepFunctions, StepOutcome, Transform};
