//! In-memory implementation of Collection for testing and development

use crate::core::item::{Body, Item};
use crate::core::operators::OperatorTable;
use crate::core::query::{FindOptions, SortDirection};
use crate::core::service::Collection;
use crate::storage::condition::{matches, order};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Eager-loading link to another collection
#[derive(Clone)]
struct Relation {
    collection: InMemoryCollection,
    foreign_key: String,
}

/// In-memory collection
///
/// Rows keep insertion order. Uses RwLock for thread-safe access; clones
/// share the same rows.
#[derive(Clone)]
pub struct InMemoryCollection {
    name: Arc<str>,
    operators: Arc<OperatorTable>,
    rows: Arc<RwLock<IndexMap<Uuid, Item>>>,
    relations: Arc<RwLock<HashMap<String, Relation>>>,
}

impl InMemoryCollection {
    /// Create a new empty collection
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            operators: Arc::new(OperatorTable::standard()),
            rows: Arc::new(RwLock::new(IndexMap::new())),
            relations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `child` as related table `table` for eager loading
    ///
    /// Child rows belong to a parent when their `foreign_key` field holds the
    /// parent uuid.
    pub fn relate(&self, table: &str, child: &InMemoryCollection, foreign_key: &str) {
        if let Ok(mut relations) = self.relations.write() {
            relations.insert(
                table.to_string(),
                Relation {
                    collection: child.clone(),
                    foreign_key: foreign_key.to_string(),
                },
            );
        }
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Result<Vec<Item>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(rows.values().cloned().collect())
    }

    fn insert(&self, mut body: Body) -> Result<Item> {
        body.remove("uuid");
        let now = json!(Utc::now().to_rfc3339());
        body.insert("createdAt".to_string(), now.clone());
        body.insert("updatedAt".to_string(), now);
        let item = Item::new(Uuid::new_v4(), body);

        let mut rows = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        rows.insert(item.uuid, item.clone());
        Ok(item)
    }

    /// Attach eagerly loaded related rows
    fn include(&self, item: &mut Item, tables: &[String]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let relations = self
            .relations
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?
            .clone();

        for table in tables {
            let relation = relations
                .get(table)
                .ok_or_else(|| anyhow!("{} has no related table '{}'", self.name, table))?;
            let parent = json!(item.uuid.to_string());
            let mut children: Vec<Item> = relation
                .collection
                .snapshot()?
                .into_iter()
                .filter(|child| child.field(&relation.foreign_key).as_ref() == Some(&parent))
                .collect();
            if let Some(ids) = item.associations.get(table) {
                children.sort_by_key(|child| ids.iter().position(|id| *id == child.uuid).unwrap_or(usize::MAX));
            }
            item.included.insert(table.clone(), children);
        }
        Ok(())
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new("items")
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn operators(&self) -> &OperatorTable {
        &self.operators
    }

    async fn find_by_id(&self, id: &Uuid, options: &FindOptions) -> Result<Option<Item>> {
        let found = {
            let rows = self
                .rows
                .read()
                .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
            rows.get(id).cloned()
        };

        let Some(mut item) = found else {
            return Ok(None);
        };
        self.include(&mut item, &options.include)?;
        if let Some(attributes) = &options.attributes {
            item.project(attributes);
        }
        Ok(Some(item))
    }

    async fn find_all(&self, options: &FindOptions) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for item in self.snapshot()? {
            let keep = match &options.condition {
                Some(condition) => matches(&item, condition)?,
                None => true,
            };
            if keep {
                items.push(item);
            }
        }

        if !options.order.is_empty() {
            items.sort_by(|a, b| {
                for (field, direction) in &options.order {
                    let ord = match (a.field(field), b.field(field)) {
                        (Some(x), Some(y)) => order(Some(&x), &y).unwrap_or(Ordering::Equal),
                        (Some(_), None) => Ordering::Greater,
                        (None, Some(_)) => Ordering::Less,
                        (None, None) => Ordering::Equal,
                    };
                    let ord = match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = options.offset.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);
        let mut page: Vec<Item> = items.into_iter().skip(offset).take(limit).collect();

        for item in &mut page {
            self.include(item, &options.include)?;
            if let Some(attributes) = &options.attributes {
                item.project(attributes);
            }
        }
        Ok(page)
    }

    async fn create(&self, body: Body) -> Result<Item> {
        self.insert(body)
    }

    async fn update(&self, item: &Item, mut body: Body) -> Result<Item> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let stored = rows
            .get_mut(&item.uuid)
            .ok_or_else(|| anyhow!("{} item {} not found", self.name, item.uuid))?;
        body.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));
        stored.merge(body);
        Ok(stored.clone())
    }

    async fn destroy(&self, item: &Item) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        rows.shift_remove(&item.uuid);
        Ok(())
    }

    async fn destroy_where(&self, condition: &Value) -> Result<usize> {
        let doomed: Vec<Uuid> = self
            .snapshot()?
            .iter()
            .filter_map(|item| match matches(item, condition) {
                Ok(true) => Some(Ok(item.uuid)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<_>>()?;

        let mut rows = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        for id in &doomed {
            rows.shift_remove(id);
        }
        Ok(doomed.len())
    }

    async fn bulk_create(&self, bodies: Vec<Body>) -> Result<Vec<Item>> {
        bodies.into_iter().map(|body| self.insert(body)).collect()
    }

    async fn associate(&self, parent: &Item, table: &str, rows: &[Item]) -> Result<()> {
        let mut stored = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let parent = stored
            .get_mut(&parent.uuid)
            .ok_or_else(|| anyhow!("{} item {} not found", self.name, parent.uuid))?;
        parent
            .associations
            .insert(table.to_string(), rows.iter().map(|row| row.uuid).collect());
        Ok(())
    }
}

/// Named in-memory collections, created on first use
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    collections: Arc<RwLock<HashMap<String, InMemoryCollection>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the collection `name`, creating it if needed
    pub fn collection(&self, name: &str) -> InMemoryCollection {
        if let Ok(collections) = self.collections.read() {
            if let Some(existing) = collections.get(name) {
                return existing.clone();
            }
        }
        match self.collections.write() {
            Ok(mut collections) => collections
                .entry(name.to_string())
                .or_insert_with(|| InMemoryCollection::new(name))
                .clone(),
            Err(_) => InMemoryCollection::new(name),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> Body {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let col = InMemoryCollection::new("Order");
        let created = col.create(body(json!({"title": "a"}))).await.unwrap();

        let found = col
            .find_by_id(&created.uuid, &FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.field("title"), Some(json!("a")));
        assert!(found.field("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_create_ignores_body_uuid() {
        let col = InMemoryCollection::new("Order");
        let given = Uuid::new_v4();
        let created = col
            .create(body(json!({"uuid": given.to_string()})))
            .await
            .unwrap();
        assert_ne!(created.uuid, given);
    }

    #[tokio::test]
    async fn test_update_merges() {
        let col = InMemoryCollection::new("Order");
        let created = col.create(body(json!({"a": 1, "b": 2}))).await.unwrap();
        let updated = col.update(&created, body(json!({"b": 3}))).await.unwrap();
        assert_eq!(updated.field("a"), Some(json!(1)));
        assert_eq!(updated.field("b"), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let col = InMemoryCollection::new("Order");
        let ghost = Item::new(Uuid::new_v4(), Body::new());
        assert!(col.update(&ghost, Body::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_find_all_filters_sorts_and_pages() {
        let col = InMemoryCollection::new("Order");
        for n in [3, 1, 4, 1, 5] {
            col.create(body(json!({"n": n}))).await.unwrap();
        }

        let options = FindOptions {
            condition: Some(json!({"n": {"op:gt": 1}})),
            order: vec![("n".to_string(), SortDirection::Desc)],
            limit: Some(2),
            ..FindOptions::default()
        };
        let items = col.find_all(&options).await.unwrap();
        let ns: Vec<_> = items.iter().map(|i| i.field("n").unwrap()).collect();
        assert_eq!(ns, vec![json!(5), json!(4)]);

        let options = FindOptions {
            offset: Some(3),
            ..FindOptions::default()
        };
        assert_eq!(col.find_all(&options).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_attributes_projection() {
        let col = InMemoryCollection::new("Order");
        col.create(body(json!({"a": 1, "b": 2}))).await.unwrap();
        let options = FindOptions {
            attributes: Some(vec!["a".to_string()]),
            ..FindOptions::default()
        };
        let items = col.find_all(&options).await.unwrap();
        assert_eq!(items[0].field("a"), Some(json!(1)));
        assert_eq!(items[0].field("b"), None);
    }

    #[tokio::test]
    async fn test_destroy_where_and_associate() {
        let orders = InMemoryCollection::new("Order");
        let lines = InMemoryCollection::new("lines");
        orders.relate("lines", &lines, "orderUuid");

        let order = orders.create(Body::new()).await.unwrap();
        let rows = lines
            .bulk_create(vec![
                body(json!({"orderUuid": order.uuid, "sku": "B"})),
                body(json!({"orderUuid": order.uuid, "sku": "A"})),
                body(json!({"orderUuid": Uuid::new_v4(), "sku": "X"})),
            ])
            .await
            .unwrap();
        orders.associate(&order, "lines", &rows[..2]).await.unwrap();

        let loaded = orders
            .find_by_id(&order.uuid, &FindOptions::including(["lines"]))
            .await
            .unwrap()
            .unwrap();
        let skus: Vec<_> = loaded.included["lines"].iter().map(|l| l.field("sku").unwrap()).collect();
        assert_eq!(skus, vec![json!("B"), json!("A")]);

        let removed = lines
            .destroy_where(&json!({"orderUuid": order.uuid}))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_include_fails() {
        let orders = InMemoryCollection::new("Order");
        let order = orders.create(Body::new()).await.unwrap();
        let result = orders
            .find_by_id(&order.uuid, &FindOptions::including(["nope"]))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_database_reuses_collections() {
        let db = InMemoryDatabase::new();
        let a = db.collection("Order");
        let b = db.collection("Order");
        assert!(Arc::ptr_eq(&a.rows, &b.rows));
        assert_eq!(db.names(), vec!["Order".to_string()]);
    }
}
