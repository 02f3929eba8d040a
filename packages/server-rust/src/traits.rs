use async_trait::async_trait;
use serde_json::Value;

use crate::service::operation::OperationError;

/// Remote issue-tracker backend reached by every catalog operation.
/// Implementations: `LinearClient` (GraphQL over HTTPS), in-memory mocks (tests).
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Execute one GraphQL document and return its `data` object.
    ///
    /// Failures arrive already classified: rate limiting, transport problems
    /// and credential errors map to their own `OperationError` variants.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, OperationError>;
}
