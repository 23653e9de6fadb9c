//! Core types: envelope, errors, items, operators and the entity handler

pub mod entity;
pub mod envelope;
pub mod error;
pub mod item;
pub mod operators;
pub mod query;
pub mod service;

pub use entity::{Entity, EntityHandler, RelatedTable, RelatedWrites, Restricted};
pub use envelope::Envelope;
pub use error::{ErrorBody, GateError};
pub use item::{Body, Item};
pub use operators::{NativeOp, OperatorTable, translate};
pub use query::{FindOptions, GetParams, PutParams, QueryParams, SortDirection};
pub use service::Collection;
