//! Metrics middleware for operations.
//!
//! Times every dispatched operation and records the outcome three ways: a
//! sample in the owned `MetricsCollector`, `metrics` crate counters and
//! histograms for export, and a `tracing` span.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use trackflow_core::context::now_millis;

use crate::service::collector::{MetricsCollector, MetricsSample};
use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments operations with timing and outcome recording.
#[derive(Debug, Clone)]
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    #[must_use]
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            collector: Arc::clone(&self.collector),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records operation duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    collector: Arc<MetricsCollector>,
}

impl<S> Service<Operation> for MetricsService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let tool_name = op.ctx().tool_name.clone();
        let call_id = op.ctx().call_id;
        let retry_count = op.ctx().retry_count;
        let origin = op.ctx().caller_origin;

        let span = info_span!(
            "operation",
            tool = %tool_name,
            call_id = call_id,
            request_id = %op.ctx().request_id,
            origin = %origin,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let collector = Arc::clone(&self.collector);
        let start = Instant::now();
        let fut = self.inner.call(op);

        Box::pin(
            async move {
                let result = fut.await;
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

                let (outcome, error_type) = match &result {
                    Ok(_) => ("ok", None),
                    Err(e) => ("error", Some(e.code().as_str().to_string())),
                };

                collector.record(MetricsSample {
                    tool_name: tool_name.clone(),
                    request_duration: duration_ms,
                    success: result.is_ok(),
                    error_type: error_type.clone(),
                    retry_count,
                    timestamp: now_millis(),
                });

                metrics::counter!(
                    "trackflow_operations_total",
                    "tool" => tool_name.clone(),
                    "outcome" => outcome,
                )
                .increment(1);
                metrics::histogram!("trackflow_operation_duration_ms", "tool" => tool_name.clone())
                    .record(duration_ms);

                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome);

                match &error_type {
                    None => tracing::info!(
                        tool = %tool_name,
                        call_id = call_id,
                        origin = %origin,
                        duration_ms = duration_ms,
                        "operation complete"
                    ),
                    Some(code) => tracing::warn!(
                        tool = %tool_name,
                        call_id = call_id,
                        origin = %origin,
                        duration_ms = duration_ms,
                        error_type = %code,
                        "operation failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
