//! Long-lived helper task fed through a bounded queue.
//!
//! `BackgroundWorker<R>` owns one spawned task that drives a `BackgroundRunnable`:
//! queued items, a fixed-period tick, and a final hook on stop. The binary runs
//! a `MetricsReporter` on it so collector aggregates reach the log sink without
//! touching the request path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::collector::{MetricsCollector, MetricsReport};

/// Items that can wait in the queue before `submit` starts to back-pressure.
const QUEUE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// BackgroundRunnable
// ---------------------------------------------------------------------------

/// State driven by a `BackgroundWorker`. All hooks run on the worker task, one
/// at a time, so implementors need no interior locking.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    async fn run(&mut self, task: Self::Task);

    /// Runs once per interval. The first tick is one full interval after start.
    async fn on_tick(&mut self) {}

    /// Runs exactly once, after the last queued item.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a spawned `BackgroundRunnable`.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    queue: Option<mpsc::Sender<R::Task>>,
    stop_signal: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns `runnable` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(runnable: R, tick_interval_ms: u64) -> Self {
        let (queue, tasks) = mpsc::channel(QUEUE_CAPACITY);
        let (stop_signal, stopped) = oneshot::channel();
        let period = Duration::from_millis(tick_interval_ms.max(1));
        let join = tokio::spawn(drive(runnable, tasks, stopped, period));

        Self {
            queue: Some(queue),
            stop_signal: Some(stop_signal),
            join: Some(join),
        }
    }

    /// Queues `task`, waiting for room when the queue is full.
    ///
    /// # Errors
    ///
    /// Fails once `stop` has been called or the worker task has exited.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        let Some(queue) = &self.queue else {
            anyhow::bail!("background worker is stopped");
        };
        queue
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("background worker exited"))
    }

    /// Drains the queue, runs the shutdown hook and waits for the task to end.
    /// Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if let Some(signal) = self.stop_signal.take() {
            let _ = signal.send(());
        }
        self.queue = None;
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "background worker ended abnormally");
            }
        }
    }
}

async fn drive<R: BackgroundRunnable>(
    mut runnable: R,
    mut tasks: mpsc::Receiver<R::Task>,
    mut stopped: oneshot::Receiver<()>,
    period: Duration,
) {
    let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Queued tasks drain before a stop signal is honoured.
        tokio::select! {
            biased;
            next = tasks.recv() => match next {
                Some(task) => runnable.run(task).await,
                None => break,
            },
            _ = ticks.tick() => runnable.on_tick().await,
            _ = &mut stopped => break,
        }
    }

    runnable.shutdown().await;
}

// ---------------------------------------------------------------------------
// MetricsReporter
// ---------------------------------------------------------------------------

/// On-demand requests for the metrics reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTask {
    /// Log a report immediately, outside the tick schedule.
    ReportNow,
    /// Clear the collector's buffer.
    Reset,
}

/// Periodically logs global and per-tool error rate and average duration.
///
/// Purely observational: reports go to the `tracing` sink and never feed
/// back into request handling.
pub struct MetricsReporter {
    collector: Arc<MetricsCollector>,
    reports_emitted: u64,
}

impl MetricsReporter {
    #[must_use]
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self {
            collector,
            reports_emitted: 0,
        }
    }

    /// Logs one report and returns the aggregates it was built from.
    pub fn emit(&mut self, trigger: &'static str) -> MetricsReport {
        let report = self.collector.snapshot();
        self.reports_emitted += 1;

        tracing::info!(
            trigger,
            report = self.reports_emitted,
            samples = report.total.count,
            error_rate = report.total.error_rate,
            avg_duration_ms = report.total.average_duration_ms,
            "metrics report"
        );
        for (tool, stats) in &report.tools {
            tracing::info!(
                tool = %tool,
                samples = stats.count,
                error_rate = stats.error_rate,
                avg_duration_ms = stats.average_duration_ms,
                "tool metrics"
            );
        }
        report
    }

    #[must_use]
    pub fn reports_emitted(&self) -> u64 {
        self.reports_emitted
    }
}

#[async_trait]
impl BackgroundRunnable for MetricsReporter {
    type Task = ReportTask;

    async fn run(&mut self, task: ReportTask) {
        match task {
            ReportTask::ReportNow => {
                self.emit("request");
            }
            ReportTask::Reset => {
                self.collector.reset();
                tracing::debug!("metrics buffer reset");
            }
        }
    }

    async fn on_tick(&mut self) {
        self.emit("interval");
    }

    async fn shutdown(&mut self) {
        self.emit("shutdown");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
