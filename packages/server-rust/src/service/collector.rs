//! In-memory metrics collector.
//!
//! Append-only buffer of per-invocation samples with on-demand aggregation.
//! The collector is an owned component: whoever builds the dispatch stack
//! creates it and hands the same `Arc` to the middleware and the reporter.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

/// One recorded outcome of an operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSample {
    pub tool_name: String,
    /// Wall-clock duration in milliseconds.
    pub request_duration: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub retry_count: u32,
    /// Completion time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Aggregates over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    pub count: usize,
    pub error_rate: f64,
    pub average_duration_ms: f64,
}

/// Point-in-time aggregation, globally and per tool name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub total: ToolStats,
    pub tools: BTreeMap<String, ToolStats>,
}

/// Thread-safe, append-only sample buffer.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    samples: Mutex<Vec<MetricsSample>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample. Never fails.
    pub fn record(&self, sample: MetricsSample) {
        self.samples.lock().push(sample);
    }

    /// Fraction of matching samples that failed, in `[0, 1]`; 0 when none match.
    #[must_use]
    pub fn error_rate(&self, tool_name: Option<&str>) -> f64 {
        self.aggregate(tool_name).error_rate
    }

    /// Mean duration of matching samples in milliseconds; 0 when none match.
    #[must_use]
    pub fn average_request_duration(&self, tool_name: Option<&str>) -> f64 {
        self.aggregate(tool_name).average_duration_ms
    }

    /// Clears every recorded sample.
    pub fn reset(&self) {
        self.samples.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Copy of every recorded sample, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<MetricsSample> {
        self.samples.lock().clone()
    }

    /// Global and per-tool aggregates computed from one consistent view of the buffer.
    #[must_use]
    pub fn snapshot(&self) -> MetricsReport {
        let samples = self.samples.lock();
        let mut grouped: BTreeMap<&str, Vec<&MetricsSample>> = BTreeMap::new();
        for sample in samples.iter() {
            grouped.entry(sample.tool_name.as_str()).or_default().push(sample);
        }

        MetricsReport {
            total: stats(samples.iter()),
            tools: grouped
                .into_iter()
                .map(|(name, group)| (name.to_string(), stats(group.into_iter())))
                .collect(),
        }
    }

    fn aggregate(&self, tool_name: Option<&str>) -> ToolStats {
        let samples = self.samples.lock();
        stats(
            samples
                .iter()
                .filter(|s| tool_name.map_or(true, |name| s.tool_name == name)),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn stats<'a>(samples: impl Iterator<Item = &'a MetricsSample>) -> ToolStats {
    let mut count = 0usize;
    let mut failures = 0usize;
    let mut total_ms = 0.0;
    for sample in samples {
        count += 1;
        if !sample.success {
            failures += 1;
        }
        total_ms += sample.request_duration;
    }

    if count == 0 {
        return ToolStats::default();
    }
    ToolStats {
        count,
        error_rate: failures as f64 / count as f64,
        average_duration_ms: total_ms / count as f64,
    }
}
