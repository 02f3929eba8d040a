/// Server-level configuration for the operation dispatch framework.
///
/// Controls per-call timeouts, concurrency limits, and the metrics report interval.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Transport deadline for a single operation call in milliseconds.
    pub default_operation_timeout_ms: u64,
    /// Maximum number of concurrent operations before load shedding.
    pub max_concurrent_operations: u32,
    /// Interval between periodic metrics reports in milliseconds.
    pub metrics_report_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_operation_timeout_ms: 30_000,
            max_concurrent_operations: 1000,
            metrics_report_interval_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.default_operation_timeout_ms, 30_000);
        assert_eq!(config.max_concurrent_operations, 1000);
        assert_eq!(config.metrics_report_interval_ms, 60_000);
    }
}
