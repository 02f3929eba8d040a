//! Error shaping: every failure leaving the server becomes a `StructuredError`.
//!
//! Retryability and suggestions come from the static `ErrorCode` table; the
//! payload of each failure is kept under `details`.

use serde_json::json;
use trackflow_core::StructuredError;

use super::operation::OperationError;

/// Converts a dispatch or handler failure into its structured form.
#[must_use]
pub fn shape(err: OperationError) -> StructuredError {
    let code = err.code();
    let message = err.to_string();
    let details = match err {
        OperationError::UnknownTool { name } => Some(json!({ "toolName": name })),
        OperationError::Validation { tool, message: reason } => {
            Some(json!({ "toolName": tool, "reason": reason }))
        }
        OperationError::RateLimited { retry_after_secs } => {
            retry_after_secs.map(|secs| json!({ "retryAfterSecs": secs }))
        }
        OperationError::Network(cause) => Some(json!({ "cause": cause })),
        OperationError::Authentication(reason) => Some(json!({ "reason": reason })),
        OperationError::NotFound { entity } => Some(json!({ "entity": entity })),
        OperationError::Remote { errors, .. } => Some(json!({ "errors": errors })),
        OperationError::Timeout { timeout_ms } => Some(json!({ "timeoutMs": timeout_ms })),
        OperationError::Overloaded => None,
        OperationError::Internal(e) => Some(json!({ "error": format!("{e:#}") })),
    };

    let shaped = StructuredError::new(code, message);
    match details {
        Some(details) => shaped.with_details(details),
        None => shaped,
    }
}

#[cfg(test)]
mod tests {
    use trackflow_core::ErrorCode;

    use super::*;

    fn all_failures() -> Vec<OperationError> {
        vec![
            OperationError::UnknownTool { name: "nope".into() },
            OperationError::validation("create_issue", "missing field `title`"),
            OperationError::RateLimited { retry_after_secs: Some(30) },
            OperationError::RateLimited { retry_after_secs: None },
            OperationError::Network("connection reset".into()),
            OperationError::Authentication("invalid api key".into()),
            OperationError::NotFound { entity: "issue".into() },
            OperationError::Remote {
                message: "bad query".into(),
                errors: json!([{ "message": "bad query" }]),
            },
            OperationError::Timeout { timeout_ms: 50 },
            OperationError::Overloaded,
            OperationError::Internal(anyhow::anyhow!("boom").context("while calling")),
        ]
    }

    #[test]
    fn every_shaped_failure_has_code_message_and_retryable() {
        for err in all_failures() {
            let code = err.code();
            let shaped = shape(err);
            assert_eq!(shaped.code, code);
            assert!(!shaped.code.as_str().is_empty());
            assert!(!shaped.message.is_empty());
            assert_eq!(shaped.retryable, code.is_retryable());
            assert!(!shaped.suggestions.is_empty());

            let wire = serde_json::to_value(&shaped).unwrap();
            assert!(wire["retryable"].is_boolean());
        }
    }

    #[test]
    fn internal_failure_is_tool_error_with_full_chain() {
        let shaped = shape(OperationError::Internal(
            anyhow::anyhow!("boom").context("while calling"),
        ));
        assert_eq!(shaped.code, ErrorCode::ToolError);
        assert!(!shaped.retryable);
        let preserved = shaped.details.unwrap()["error"].as_str().unwrap().to_string();
        assert!(preserved.contains("while calling"));
        assert!(preserved.contains("boom"));
    }

    #[test]
    fn argument_shape_failure_names_the_tool() {
        let shaped = shape(OperationError::validation(
            "get_issue",
            "arguments must be a JSON object, got string",
        ));
        assert_eq!(shaped.code, ErrorCode::ValidationError);
        assert_eq!(shaped.details.unwrap()["toolName"], "get_issue");
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let shaped = shape(OperationError::RateLimited { retry_after_secs: Some(30) });
        assert!(shaped.retryable);
        assert_eq!(shaped.details, Some(json!({ "retryAfterSecs": 30 })));
    }

    #[test]
    fn remote_errors_are_preserved() {
        let errors = json!([{ "message": "Entity not found", "path": ["issue"] }]);
        let shaped = shape(OperationError::Remote {
            message: "Entity not found".into(),
            errors: errors.clone(),
        });
        assert_eq!(shaped.code, ErrorCode::RemoteError);
        assert_eq!(shaped.details.unwrap()["errors"], errors);
    }
}
