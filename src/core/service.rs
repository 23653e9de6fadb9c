//! Persistence collaborator trait

use crate::core::item::{Body, Item};
use crate::core::operators::OperatorTable;
use crate::core::query::FindOptions;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// One persistence collection ("model")
///
/// Entity handlers only orchestrate item lifecycles through this trait; the
/// framework is agnostic to the underlying storage mechanism. Conditions
/// handed to `find_all` and `destroy_where` are already in native form.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name, used in log and error messages
    fn name(&self) -> &str;

    /// Operator name to native token table of this engine
    fn operators(&self) -> &OperatorTable;

    /// Get an item by id
    async fn find_by_id(&self, id: &Uuid, options: &FindOptions) -> Result<Option<Item>>;

    /// List items matching the options
    async fn find_all(&self, options: &FindOptions) -> Result<Vec<Item>>;

    /// Create a new item with a fresh id
    async fn create(&self, body: Body) -> Result<Item>;

    /// Merge `body` into an existing item
    async fn update(&self, item: &Item, body: Body) -> Result<Item>;

    /// Delete an item
    async fn destroy(&self, item: &Item) -> Result<()>;

    /// Delete every item matching a native condition, returning the count
    async fn destroy_where(&self, condition: &Value) -> Result<usize>;

    /// Create several items at once
    async fn bulk_create(&self, bodies: Vec<Body>) -> Result<Vec<Item>>;

    /// Record `rows` of `table` as the related rows of `parent`
    async fn associate(&self, parent: &Item, table: &str, rows: &[Item]) -> Result<()>;
}
