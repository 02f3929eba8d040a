use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use super::operation::OperationError;

// ---------------------------------------------------------------------------
// ToolHandler trait
// ---------------------------------------------------------------------------

/// One named operation in the catalog.
///
/// A handler validates its own parameters and performs at most one remote
/// call per invocation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns the unique name of this tool (e.g., `"list_issues"`).
    fn name(&self) -> &str;

    /// Human-readable summary shown in tool listings.
    fn description(&self) -> &str;

    /// Execute the operation with the given parameter object.
    async fn call(&self, params: Value) -> Result<Value, OperationError>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Registry of tool handlers, keyed by name.
///
/// Lookups are lock-free reads on a `DashMap`; listing preserves registration
/// order. Registering a name twice replaces the earlier handler in place.
pub struct ToolRegistry {
    by_name: DashMap<String, Arc<dyn ToolHandler>>,
    order: RwLock<Vec<String>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a tool handler under its own `name()`.
    pub fn register<T: ToolHandler + 'static>(&self, handler: T) {
        self.register_arc(Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_arc(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.name().to_string();
        if self.by_name.insert(name.clone(), handler).is_none() {
            self.order.write().push(name);
        }
    }

    /// Retrieve a handler by tool name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered tool names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Name and description of every tool, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .read()
            .iter()
            .filter_map(|name| {
                self.get(name).map(|h| ToolDescriptor {
                    name: name.clone(),
                    description: h.description().to_string(),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
