//! REST API exposure for the framework
//!
//! Every entity operation is served at `POST /{entity}/{method}` with the
//! request data as JSON body (`{"data": ...}` or bare) and the uniform
//! envelope as response. The HTTP status mirrors the envelope status.

use crate::core::envelope::Envelope;
use crate::core::error::GateError;
use crate::server::entity_registry::EntityRegistry;
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{Json, Router, routing::get, routing::post};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a registry
    ///
    /// # Returns
    ///
    /// Returns a fully configured Axum router with:
    /// - Health check routes
    /// - Entity method routes
    /// - Custom routes
    pub fn build_router(registry: Arc<EntityRegistry>, custom_routes: Vec<Router>) -> Result<Router> {
        let entity_routes = Router::new()
            .route("/{entity}/{method}", post(dispatch))
            .with_state(registry.clone());

        let mut app = Self::health_routes(registry).merge(entity_routes);

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Build health check routes
    fn health_routes(registry: Arc<EntityRegistry>) -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
            .with_state(registry)
    }

    /// Health check endpoint handler
    async fn health_check(State(registry): State<Arc<EntityRegistry>>) -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "crudgate",
            "entities": registry.entity_types(),
        }))
    }
}

async fn dispatch(
    State(registry): State<Arc<EntityRegistry>>,
    Path((entity, method)): Path<(String, String)>,
    body: Bytes,
) -> Envelope {
    let data = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return Envelope::err(GateError::BadRequest {
                    message: format!("invalid JSON body: {}", e),
                });
            }
        }
    };
    registry.dispatch(&entity, &method, data).await
}
