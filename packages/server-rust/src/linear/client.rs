//! HTTP transport for GraphQL documents, with failure classification.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::config::LinearConfig;
use crate::service::operation::OperationError;
use crate::traits::TrackerApi;

/// GraphQL `extensions.code` sent when the caller is throttled.
const RATE_LIMITED_CODE: &str = "RATELIMITED";
/// GraphQL `extensions.code` sent for missing or revoked credentials.
const AUTHENTICATION_CODE: &str = "AUTHENTICATION_ERROR";

/// `TrackerApi` over HTTPS.
///
/// Construction never fails on a missing key; every call does instead, so the
/// catalog can still be listed without credentials.
pub struct LinearClient {
    client: Client,
    config: LinearConfig,
}

impl LinearClient {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: LinearConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TrackerApi for LinearClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, OperationError> {
        let Some(key) = self.config.api_key.as_deref() else {
            return Err(OperationError::Authentication(
                "no API key configured (set LINEAR_API_KEY)".to_string(),
            ));
        };

        let res = self
            .client
            .post(&self.config.api_url)
            .header(AUTHORIZATION, key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(send_error)?;

        let status = res.status();
        let retry_after = res
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let text = res
            .text()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;
        tracing::debug!(%status, bytes = text.len(), "graphql response");

        if let Some(err) = status_error(status, retry_after, &text) {
            return Err(err);
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| OperationError::Remote {
            message: format!("response is not JSON: {e}"),
            errors: Value::Null,
        })?;
        extract_data(body)
    }
}

/// A request that could not be built (an API key that is not a valid header
/// value, a malformed endpoint URL) is a configuration fault and is not
/// retryable. Everything else that fails before a response is transport.
fn send_error(e: reqwest::Error) -> OperationError {
    if e.is_builder() {
        OperationError::Authentication(format!("request could not be built: {e}"))
    } else {
        OperationError::Network(e.to_string())
    }
}

/// Classifies a non-success HTTP status. `None` means the body should be parsed.
///
/// A 400 still carries a GraphQL error payload, so it falls through to
/// `extract_data` when the body is JSON.
fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> Option<OperationError> {
    if status.is_success() {
        return None;
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(OperationError::Authentication(
            format!("HTTP {status}: {}", snippet(body)),
        )),
        StatusCode::TOO_MANY_REQUESTS => Some(OperationError::RateLimited {
            retry_after_secs: retry_after,
        }),
        s if s.is_server_error() => Some(OperationError::Network(format!(
            "HTTP {status}: {}",
            snippet(body)
        ))),
        StatusCode::BAD_REQUEST if serde_json::from_str::<Value>(body).is_ok() => None,
        _ => Some(OperationError::Remote {
            message: format!("HTTP {status}"),
            errors: json!({ "status": status.as_u16(), "body": snippet(body) }),
        }),
    }
}

/// Pulls `data` out of a GraphQL response body, classifying any `errors`.
fn extract_data(mut body: Value) -> Result<Value, OperationError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(classify_graphql_errors(errors));
        }
    }
    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(OperationError::Remote {
            message: "response carried no data".to_string(),
            errors: Value::Null,
        }),
    }
}

fn classify_graphql_errors(errors: &[Value]) -> OperationError {
    let has_code = |code: &str| {
        errors.iter().any(|e| {
            e.pointer("/extensions/code").and_then(Value::as_str) == Some(code)
        })
    };
    let message = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("; ");

    if has_code(RATE_LIMITED_CODE) {
        OperationError::RateLimited {
            retry_after_secs: None,
        }
    } else if has_code(AUTHENTICATION_CODE) {
        OperationError::Authentication(message)
    } else {
        OperationError::Remote {
            message,
            errors: Value::Array(errors.to_vec()),
        }
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_authentication() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = status_error(status, None, "denied").unwrap();
            assert!(matches!(err, OperationError::Authentication(_)));
        }
    }

    #[test]
    fn too_many_requests_keeps_retry_after() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, Some(12), "").unwrap();
        assert!(matches!(
            err,
            OperationError::RateLimited { retry_after_secs: Some(12) }
        ));
    }

    #[tokio::test]
    async fn unusable_api_key_is_not_retryable() {
        let client = LinearClient::new(LinearConfig {
            api_url: "http://127.0.0.1:9/graphql".to_string(),
            api_key: Some("lin_api_\nbroken".to_string()),
            ..LinearConfig::default()
        })
        .unwrap();
        let err = client.execute("{ viewer { id } }", json!({})).await.unwrap_err();
        assert!(matches!(err, OperationError::Authentication(_)), "{err:?}");
        assert!(!err.code().is_retryable());
    }

    #[test]
    fn server_errors_are_network_failures() {
        let err = status_error(StatusCode::BAD_GATEWAY, None, "upstream").unwrap();
        assert!(matches!(err, OperationError::Network(_)));
    }

    #[test]
    fn bad_request_with_json_body_is_parsed() {
        assert!(status_error(StatusCode::BAD_REQUEST, None, r#"{"errors":[]}"#).is_none());
        assert!(status_error(StatusCode::OK, None, "").is_none());
        let err = status_error(StatusCode::BAD_REQUEST, None, "<html>").unwrap();
        assert!(matches!(err, OperationError::Remote { .. }));
    }

    #[test]
    fn data_is_returned_when_no_errors() {
        let data = extract_data(json!({ "data": { "viewer": { "id": "u1" } } })).unwrap();
        assert_eq!(data, json!({ "viewer": { "id": "u1" } }));
    }

    #[test]
    fn missing_data_is_remote_error() {
        let err = extract_data(json!({ "data": null })).unwrap_err();
        assert!(matches!(err, OperationError::Remote { .. }));
    }

    #[test]
    fn graphql_rate_limit_extension_is_retryable() {
        let err = extract_data(json!({
            "errors": [{ "message": "Rate limit exceeded", "extensions": { "code": "RATELIMITED" } }]
        }))
        .unwrap_err();
        assert!(matches!(err, OperationError::RateLimited { .. }));
        assert!(err.code().is_retryable());
    }

    #[test]
    fn graphql_authentication_extension() {
        let err = extract_data(json!({
            "errors": [{ "message": "Invalid key", "extensions": { "code": "AUTHENTICATION_ERROR" } }]
        }))
        .unwrap_err();
        assert!(matches!(err, OperationError::Authentication(ref m) if m == "Invalid key"));
    }

    #[test]
    fn other_graphql_errors_keep_the_array() {
        let err = extract_data(json!({
            "data": null,
            "errors": [{ "message": "Entity not found: Issue" }]
        }))
        .unwrap_err();
        match err {
            OperationError::Remote { message, errors } => {
                assert_eq!(message, "Entity not found: Issue");
                assert_eq!(errors[0]["message"], "Entity not found: Issue");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = LinearClient::new(LinearConfig {
            api_url: "http://127.0.0.1:9/graphql".to_string(),
            ..LinearConfig::default()
        })
        .unwrap();
        let err = client.execute("{ viewer { id } }", json!({})).await.unwrap_err();
        assert!(matches!(err, OperationError::Authentication(_)));
    }
}
