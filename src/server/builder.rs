//! ServerBuilder for fluent API to build HTTP servers

use super::entity_registry::EntityRegistry;
use super::exposure::RestExposure;
use crate::core::entity::EntityHandler;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

#[cfg(feature = "in-memory")]
use crate::config::AppConfig;
#[cfg(feature = "in-memory")]
use crate::storage::InMemoryDatabase;

/// Builder for creating HTTP servers with auto-registered routes
///
/// # Example
///
/// ```ignore
/// let db = InMemoryDatabase::new();
/// let app = ServerBuilder::new()
///     .register_config(&AppConfig::from_yaml_file("app.yaml")?, &db)
///     .register(Entity::new("Note", Arc::new(db.collection("Note"))))
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: EntityRegistry,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            registry: EntityRegistry::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Register an entity handler
    pub fn register(self, handler: impl EntityHandler + 'static) -> Self {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already shared entity handler
    pub fn register_arc(mut self, handler: Arc<dyn EntityHandler>) -> Self {
        self.registry.register(handler);
        self
    }

    /// Register one in-memory backed entity per configured entity
    ///
    /// Related table `t` of entity `E` lives in collection `E_t`.
    #[cfg(feature = "in-memory")]
    pub fn register_config(mut self, config: &AppConfig, db: &InMemoryDatabase) -> Self {
        use crate::core::entity::{Entity, Restricted};

        for entity_config in &config.entities {
            let model = db.collection(&entity_config.name);
            let mut entity = Entity::new(entity_config.name.clone(), Arc::new(model.clone()));

            for table in &entity_config.tables {
                let child = db.collection(&format!("{}_{}", entity_config.name, table));
                entity = entity.with_table(table.clone(), Arc::new(child.clone()));
                if let Some(related) = entity.tables().last() {
                    model.relate(table, &child, &related.foreign_key);
                }
            }
            if entity_config.eager {
                entity = entity.eager();
            }
            entity = entity.with_related_writes(entity_config.related_writes);

            let handler: Arc<dyn EntityHandler> = match &entity_config.methods {
                Some(methods) => Arc::new(Restricted::new(entity, methods.clone())),
                None => Arc::new(entity),
            };
            self.registry.register(handler);
        }
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this to add routes that don't fit the entity pattern, such as
    /// authentication endpoints or webhooks.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the registry without exposing it
    pub fn build_registry(self) -> Result<EntityRegistry> {
        if self.registry.is_empty() {
            anyhow::bail!("At least one entity is required. Call .register()");
        }
        Ok(self.registry)
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let registry = Arc::new(self.build_registry()?);
        RestExposure::build_router(registry, custom_routes)
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::storage::InMemoryCollection;
    use serde_json::json;

    #[test]
    fn test_build_without_entities_fails() {
        let result = ServerBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_entity() {
        let result = ServerBuilder::new()
            .register(Entity::new("Order", Arc::new(InMemoryCollection::new("Order"))))
            .with_custom_routes(Router::new())
            .build();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_register_config() {
        let db = InMemoryDatabase::new();
        let registry = ServerBuilder::new()
            .register_config(&AppConfig::default_config(), &db)
            .build_registry()
            .unwrap();

        assert_eq!(registry.entity_types(), vec!["Customer", "Order", "Product"]);
        assert!(db.names().contains(&"Order_lines".to_string()));

        let created = registry
            .dispatch("Order", "put", json!({"body": {"lines": [{"sku": "A"}]}}))
            .await
            .into_result()
            .unwrap();
        assert_eq!(created["lines"][0]["sku"], json!("A"));

        let denied = registry
            .dispatch("Product", "put", json!({"body": {}}))
            .await;
        assert_eq!(denied.error().and_then(|e| e.status), Some(403));
    }
}
