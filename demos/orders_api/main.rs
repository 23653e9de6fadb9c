//! Orders API example: entities from YAML, served over REST
//!
//! ```text
//! cargo run --example orders_api -- demos/orders_api/app.yaml
//! curl -X POST localhost:3000/Order/query \
//!      -d '{"data": {"where": {"number": {"$gte": 2}}}}'
//! ```

use crudgate::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crudgate=debug,tower_http=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_yaml_file(&path)?,
        None => AppConfig::default_config(),
    };

    let db = InMemoryDatabase::new();
    let registry = Arc::new(
        ServerBuilder::new()
            .register_config(&config, &db)
            .build_registry()?,
    );

    // Seed through the same path clients use
    let client = AuthenticatedRequester::new(
        LocalTransport::new(registry.clone()),
        SessionStore::in_memory(),
    );
    for number in 1..=3 {
        let lines: Vec<Value> = (0..number).map(|i| json!({ "sku": format!("SKU-{}", i) })).collect();
        let reply = client
            .post("/Order/put", json!({ "data": { "body": { "number": number, "lines": lines } } }))
            .await;
        if let Some(error) = reply.envelope.error() {
            anyhow::bail!("seeding failed: {}", error.message);
        }
    }
    tracing::info!(entities = ?registry.entity_types(), "seeded demo data");

    let app = RestExposure::build_router(registry, Vec::new())?;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Server listening on 127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}
