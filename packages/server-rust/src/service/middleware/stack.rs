//! Dispatch stack composition: wraps the router in every middleware layer.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::load_shed::{LoadShedLayer, LoadShedService};
use super::metrics::{MetricsLayer, MetricsService};
use super::timeout::{TimeoutLayer, TimeoutService};
use crate::service::collector::MetricsCollector;
use crate::service::config::ServerConfig;
use crate::service::router::OperationRouter;

/// The fully layered dispatch service. Cheap to clone; clones share the
/// concurrency limit and the metrics collector.
pub type DispatchStack = MetricsService<LoadShedService<TimeoutService<OperationRouter>>>;

/// Build the dispatch stack around `router`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record every outcome, including rejections and timeouts
/// 2. `LoadShedLayer` -- reject when overloaded before doing any work
/// 3. `TimeoutLayer` -- enforce the per-call transport deadline
#[must_use]
pub fn build_dispatch_stack(
    router: OperationRouter,
    config: &ServerConfig,
    collector: Arc<MetricsCollector>,
) -> DispatchStack {
    ServiceBuilder::new()
        .layer(MetricsLayer::new(collector))
        .layer(LoadShedLayer::new(config.max_concurrent_operations))
        .layer(TimeoutLayer)
        .service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
