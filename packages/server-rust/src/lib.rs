//! `trackflow` server: tool dispatch over `tower`, the pipeline engine, metrics
//! collection, and the Linear-backed tool catalog.

pub mod cli;
pub mod linear;
pub mod logging;
pub mod service;
pub mod traits;

pub use service::{ToolServer, PIPELINE_TOOL};
pub use traits::TrackerApi;
