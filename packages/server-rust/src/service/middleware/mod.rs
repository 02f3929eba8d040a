//! Tower middleware layers for the dispatch stack.
//!
//! - [`metrics`]: Operation timing, outcome samples, and exported counters
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`timeout`]: Per-operation timeout enforcement
//! - [`stack`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod stack;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use stack::{build_dispatch_stack, DispatchStack};
pub use timeout::TimeoutLayer;
