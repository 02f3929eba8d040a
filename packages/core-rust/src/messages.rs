//! Call and response envelopes exchanged with the calling transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::StructuredError;

/// A single named operation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One block of response content. Only text is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Wrapped response handed back to the transport for both call kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    /// Success: the result serialized as pretty-printed JSON text.
    #[must_use]
    pub fn success(result: &Value) -> Self {
        let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        Self {
            content: vec![Content::Text { text }],
            is_error: false,
        }
    }

    /// Failure: a flagged response carrying the structured error fields.
    #[must_use]
    pub fn failure(error: &StructuredError) -> Self {
        let mut body = json!({
            "code": error.code,
            "message": error.message,
            "details": error.details,
            "retryable": error.retryable,
            "suggestions": error.suggestions,
        });
        if let (Some(step), Some(obj)) = (&error.step, body.as_object_mut()) {
            obj.insert("step".to_string(), json!(step));
        }
        let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
        Self {
            content: vec![Content::Text { text }],
            is_error: true,
        }
    }

    /// Concatenated text of all content blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|Content::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
