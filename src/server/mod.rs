//! Server module for building HTTP servers with auto-registered routes
//!
//! This module provides a `ServerBuilder` that collects entity handlers and
//! exposes them over REST.

pub mod builder;
pub mod entity_registry;
pub mod exposure;

pub use builder::ServerBuilder;
pub use entity_registry::EntityRegistry;
pub use exposure::RestExposure;
