//! Connection settings for the Linear GraphQL endpoint.

use std::time::Duration;

/// Public Linear GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.linear.app/graphql";

/// Endpoint, credentials and request deadline for `LinearClient`.
#[derive(Clone)]
pub struct LinearConfig {
    /// GraphQL endpoint URL.
    pub api_url: String,
    /// Personal API key or OAuth token, sent verbatim in `Authorization`.
    pub api_key: Option<String>,
    /// Maximum time for one HTTP round trip.
    pub request_timeout: Duration,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// The API key never appears in logs.
impl std::fmt::Debug for LinearConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
