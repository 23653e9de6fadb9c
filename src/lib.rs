//! # crudgate
//!
//! Generic CRUD entity handlers with a JSON condition language, plus the
//! client session machinery that talks to them.
//!
//! ## Features
//!
//! - **Uniform envelope**: every operation answers `{"response": ...}` or
//!   `{"error": {"message", "status"?}}`, never a raw failure
//! - **Condition operators**: `$`-prefixed operators in `where` clauses are
//!   translated to the persistence engine's native operators
//! - **Related tables**: child rows are replaced wholesale on every put
//! - **Client sessions**: bearer tokens, transparent single-flight renewal on
//!   401, saved sessions restored on start
//! - **Access rules**: `(entity, method)` rules evaluated by an application
//!   policy, used to filter the menu
//! - **Configuration-Based**: entities and client settings from YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crudgate::prelude::*;
//!
//! let db = InMemoryDatabase::new();
//! ServerBuilder::new()
//!     .register_config(&AppConfig::from_yaml_file("app.yaml")?, &db)
//!     .serve("127.0.0.1:3000")
//!     .await?;
//!
//! // elsewhere
//! let session = SessionStore::in_memory();
//! let requester = AuthenticatedRequester::new(HttpTransport::new("http://127.0.0.1:3000"), session);
//! let reply = requester
//!     .post("/Order/query", json!({"data": {"where": {"total": {"$gt": 100}}}}))
//!     .await;
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Body, Collection, Entity, EntityHandler, Envelope, ErrorBody, FindOptions, GateError,
        Item, OperatorTable, RelatedWrites, Restricted, SortDirection, translate,
    };

    // === Client ===
    pub use crate::client::{
        AccessEvaluator, AccessRule, AllowPolicy, AllowRequest, AuthenticatedRequester, ClientApp,
        DurableStorage, FileStorage, LocalTransport, MemoryStorage, MenuItem, Reply,
        RequestParams, SessionPhase, SessionStore, Startup, Transport, filter_menu,
    };
    #[cfg(feature = "http-client")]
    pub use crate::client::HttpTransport;

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::{InMemoryCollection, InMemoryDatabase};

    // === Config ===
    pub use crate::config::{AppConfig, ClientConfig, EntityConfig};

    // === Server ===
    pub use crate::server::{EntityRegistry, RestExposure, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use uuid::Uuid;

    // === Axum ===
    pub use axum::{Router, routing::post};
}
