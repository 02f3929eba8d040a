use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Per-request context carried through a pipeline run for correlation and telemetry.
///
/// `timeout` and `retry_count` are metadata only: nothing in the engine enforces
/// them as a deadline or a retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Correlation identifier shared by every step of one run.
    pub request_id: String,
    /// Submission time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Caller-declared time budget in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<u64>,
    /// Caller-declared retry attempt number, copied into metrics samples.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retry_count: Option<u32>,
    /// Request id of the context this one was derived from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_context: Option<String>,
}

impl ExecutionContext {
    /// Creates a context with a fresh v4 request id stamped with the current time.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            timeout: None,
            retry_count: None,
            parent_context: None,
        }
    }

    /// Retry count to attribute to metrics samples (0 when absent).
    #[must_use]
    pub fn retry_count_or_default(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }
}

/// Milliseconds since the Unix epoch, saturating at 0 for clocks set before it.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
