//! Entity registry mapping entity names to their handlers

use crate::core::entity::EntityHandler;
use crate::core::envelope::Envelope;
use crate::core::error::GateError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for all entities in the application
///
/// Dispatches `(entity, method, data)` triples to the registered handlers.
/// Shared by the REST exposure and the in-process client transport.
#[derive(Default, Clone)]
pub struct EntityRegistry {
    handlers: HashMap<String, Arc<dyn EntityHandler>>,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own name, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn EntityHandler>) {
        let name = handler.name().to_string();
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, entity: &str) -> Option<&Arc<dyn EntityHandler>> {
        self.handlers.get(entity)
    }

    /// Get all registered entity names, sorted
    pub fn entity_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run `method` of `entity` with the given request body
    ///
    /// The body may be `{"data": ...}` or the bare data.
    pub async fn dispatch(&self, entity: &str, method: &str, body: Value) -> Envelope {
        let Some(handler) = self.get(entity) else {
            return Envelope::err(GateError::UnknownEntity {
                entity: entity.to_string(),
            });
        };
        tracing::debug!(%entity, %method, "dispatching entity request");
        handler.call(method, unwrap_data(body)).await
    }
}

/// Extract the `data` member of a request body
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::storage::InMemoryCollection;
    use serde_json::json;

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.register(Arc::new(Entity::new(
            "Order",
            Arc::new(InMemoryCollection::new("Order")),
        )));
        registry.register(Arc::new(Entity::new(
            "Customer",
            Arc::new(InMemoryCollection::new("Customer")),
        )));
        registry
    }

    #[test]
    fn test_entity_types_sorted() {
        assert_eq!(registry().entity_types(), vec!["Customer", "Order"]);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_entity() {
        let env = registry().dispatch("Invoice", "get", json!({})).await;
        assert_eq!(env.error().and_then(|e| e.status), Some(404));
    }

    #[tokio::test]
    async fn test_dispatch_accepts_wrapped_and_bare_data() {
        let registry = registry();
        let wrapped = registry
            .dispatch("Order", "put", json!({"data": {"body": {"title": "a"}}}))
            .await;
        assert!(!wrapped.is_error());

        let bare = registry
            .dispatch("Order", "put", json!({"body": {"title": "b"}}))
            .await;
        assert!(!bare.is_error());

        let all = registry.dispatch("Order", "query", Value::Null).await;
        assert_eq!(all.response().and_then(|v| v.as_array()).map(Vec::len), Some(2));
    }

    #[test]
    fn test_unwrap_data() {
        assert_eq!(unwrap_data(json!({"data": {"uuid": 1}})), json!({"uuid": 1}));
        assert_eq!(unwrap_data(json!({"uuid": 1})), json!({"uuid": 1}));
        assert_eq!(unwrap_data(Value::Null), Value::Null);
    }
}
