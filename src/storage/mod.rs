//! Storage implementations for different backends

pub mod condition;
#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryCollection, InMemoryDatabase};
