//! Tool catalog: typed parameters translated into one GraphQL call each.
//!
//! Every tool is a `GraphqlTool<P>`: `P` deserializes and validates the
//! argument object, then supplies the GraphQL variables. The handler sends a
//! fixed document through the shared `TrackerApi` and returns the value found
//! at the tool's result path.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use trackflow_core::path::resolve;

use crate::service::operation::OperationError;
use crate::service::registry::{ToolHandler, ToolRegistry};
use crate::traits::TrackerApi;

pub mod collaboration;
pub mod issues;
pub mod people;
pub mod planning;

// ---------------------------------------------------------------------------
// Parameter contract
// ---------------------------------------------------------------------------

/// Page size used when a listing call omits `first`.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page the provider accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Parameters of one catalog tool.
pub trait ToolParams: DeserializeOwned + Send + 'static {
    /// Checks constraints serde cannot express. The message becomes a
    /// `VALIDATION_ERROR` for the tool.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// GraphQL variables for the tool's document.
    fn variables(&self) -> Value;
}

/// Parameters of tools that take none. Any supplied field is rejected.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

impl ToolParams for NoParams {
    fn variables(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }
}

/// Parameters of tools addressing one entity by id.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdParams {
    pub id: String,
}

impl ToolParams for IdParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("id", &self.id)
    }

    fn variables(&self) -> Value {
        serde_json::json!({ "id": self.id })
    }
}

/// Parameters of plain paginated listings.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageParams {
    pub first: Option<u32>,
}

impl ToolParams for PageParams {
    fn validate(&self) -> Result<(), String> {
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        serde_json::json!({ "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE) })
    }
}

/// Rejects blank identifiers and text fields.
///
/// # Errors
///
/// Returns a message naming `field` when `value` is empty or whitespace.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(())
    }
}

/// Resolves the requested page size, applying the default.
///
/// # Errors
///
/// Returns a message when `first` is outside `1..=250`.
pub fn page_size(first: Option<u32>) -> Result<u32, String> {
    match first {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(n) if (1..=MAX_PAGE_SIZE).contains(&n) => Ok(n),
        Some(n) => Err(format!("`first` must be between 1 and {MAX_PAGE_SIZE}, got {n}")),
    }
}

/// # Errors
///
/// Returns a message when `priority` is outside `0..=4`
/// (0 none, 1 urgent, 2 high, 3 medium, 4 low).
pub fn check_priority(priority: Option<u8>) -> Result<(), String> {
    match priority {
        Some(p) if p > 4 => Err(format!("`priority` must be between 0 and 4, got {p}")),
        _ => Ok(()),
    }
}

/// Equality filter on a related entity's id, as the provider's filter input expects.
fn id_filter(id: &str) -> Value {
    serde_json::json!({ "id": { "eq": id } })
}

// ---------------------------------------------------------------------------
// GraphqlTool
// ---------------------------------------------------------------------------

/// Static description of one catalog tool.
#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub document: &'static str,
    /// Dotted path under `data` holding the tool's result.
    pub result_path: &'static str,
    /// Entity reported in `NOT_FOUND` when the result path resolves to nothing.
    pub entity: &'static str,
}

/// A catalog tool: validate `P`, run `spec.document`, pick `spec.result_path`.
pub struct GraphqlTool<P> {
    spec: &'static ToolSpec,
    api: Arc<dyn TrackerApi>,
    _params: PhantomData<fn() -> P>,
}

impl<P: ToolParams> GraphqlTool<P> {
    #[must_use]
    pub fn new(spec: &'static ToolSpec, api: Arc<dyn TrackerApi>) -> Self {
        Self {
            spec,
            api,
            _params: PhantomData,
        }
    }

    fn parse(&self, params: Value) -> Result<P, OperationError> {
        let parsed: P = serde_json::from_value(params)
            .map_err(|e| OperationError::validation(self.spec.name, e.to_string()))?;
        parsed
            .validate()
            .map_err(|message| OperationError::validation(self.spec.name, message))?;
        Ok(parsed)
    }
}

#[async_trait]
impl<P: ToolParams> ToolHandler for GraphqlTool<P> {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    async fn call(&self, params: Value) -> Result<Value, OperationError> {
        let variables = self.parse(params)?.variables();
        tracing::debug!(tool = self.spec.name, "executing graphql document");

        let data = self.api.execute(self.spec.document, variables).await?;

        // Mutation payloads report failure through `success: false`.
        let root = self.spec.result_path.split('.').next().unwrap_or_default();
        if data.get(root).and_then(|r| r.get("success")).and_then(Value::as_bool) == Some(false) {
            return Err(OperationError::Remote {
                message: format!("{} was not applied", self.spec.name),
                errors: Value::Null,
            });
        }

        match resolve(&data, self.spec.result_path) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(OperationError::NotFound {
                entity: self.spec.entity.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Registers every catalog tool against `api`, in listing order.
pub fn register_catalog(registry: &ToolRegistry, api: &Arc<dyn TrackerApi>) {
    issues::register(registry, api);
    people::register(registry, api);
    planning::register(registry, api);
    collaboration::register(registry, api);
}

fn register_tool<P: ToolParams>(
    registry: &ToolRegistry,
    api: &Arc<dyn TrackerApi>,
    spec: &'static ToolSpec,
) {
    registry.register(GraphqlTool::<P>::new(spec, Arc::clone(api)));
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod mock {
    use parking_lot::Mutex;

    use super::*;

    /// Records every document and variable set; replies with a canned result.
    pub struct MockApi {
        reply: Mutex<Result<Value, fn() -> OperationError>>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockApi {
        pub fn replying(data: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Ok(data)),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(err: fn() -> OperationError) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Err(err)),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn last_variables(&self) -> Value {
            self.calls.lock().last().map(|(_, v)| v.clone()).unwrap_or(Value::Null)
        }

        pub fn last_document(&self) -> String {
            self.calls.lock().last().map(|(d, _)| d.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl TrackerApi for MockApi {
        async fn execute(&self, query: &str, variables: Value) -> Result<Value, OperationError> {
            self.calls.lock().push((query.to_string(), variables));
            match &*self.reply.lock() {
                Ok(v) => Ok(v.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    /// Registry holding the full catalog over `api`.
    pub fn catalog(api: &Arc<MockApi>) -> ToolRegistry {
        let registry = ToolRegistry::new();
        let api: Arc<dyn TrackerApi> = Arc::clone(api) as Arc<dyn TrackerApi>;
        register_catalog(&registry, &api);
        registry
    }

    /// Invokes tool `name` from `registry`.
    pub async fn invoke(registry: &ToolRegistry, name: &str, params: Value) -> Result<Value, OperationError> {
        let tool = registry.get(name).unwrap_or_else(|| panic!("{name} not registered"));
        tool.call(params).await
    }
}
