//! Generic entity request handler
//!
//! An [`Entity`] binds one [`Collection`] (and optionally its related
//! tables) to the four uniform operations `get`, `put`, `delete` and
//! `query`. Every operation answers with an [`Envelope`]; no error escapes
//! as `Err`.
//!
//! Behavior is layered by composition: a decorator wraps any
//! [`EntityHandler`] and implements the same trait (see [`Restricted`]).

use crate::core::envelope::Envelope;
use crate::core::error::GateError;
use crate::core::item::{Body, Item};
use crate::core::operators::translate;
use crate::core::query::{FindOptions, GetParams, PutParams, QueryParams};
use crate::core::service::Collection;
use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;

/// Uniform CRUD façade over one collection
#[async_trait]
pub trait EntityHandler: Send + Sync {
    /// Entity name, e.g. "Order"
    fn name(&self) -> &str;

    async fn get(&self, params: GetParams) -> Envelope;

    async fn put(&self, params: PutParams) -> Envelope;

    async fn delete(&self, params: GetParams) -> Envelope;

    async fn query(&self, params: QueryParams) -> Envelope;

    /// Dispatch a method by name with raw request data
    async fn call(&self, method: &str, data: Value) -> Envelope {
        match method {
            "get" => match parse::<GetParams>(data) {
                Ok(params) => self.get(params).await,
                Err(err) => Envelope::err(err),
            },
            "put" => match parse::<PutParams>(data) {
                Ok(params) => self.put(params).await,
                Err(err) => Envelope::err(err),
            },
            "delete" => match parse::<GetParams>(data) {
                Ok(params) => self.delete(params).await,
                Err(err) => Envelope::err(err),
            },
            "query" => match parse::<QueryParams>(data) {
                Ok(params) => self.query(params).await,
                Err(err) => Envelope::err(err),
            },
            other => Envelope::err(GateError::UnknownMethod {
                entity: self.name().to_string(),
                method: other.to_string(),
            }),
        }
    }
}

fn parse<T: DeserializeOwned>(data: Value) -> Result<T, GateError> {
    let data = if data.is_null() { json!({}) } else { data };
    serde_json::from_value(data).map_err(|e| GateError::BadRequest {
        message: e.to_string(),
    })
}

/// How `put` runs the replacement of related-table rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedWrites {
    /// Replace all tables concurrently and wait for them before answering
    #[default]
    Await,

    /// Spawn one task per table and answer immediately; failures are only logged
    Detached,
}

/// A related collection whose rows are replaced on every `put`
#[derive(Clone)]
pub struct RelatedTable {
    pub name: String,
    pub model: Arc<dyn Collection>,
    /// Field of the related rows holding the parent uuid
    pub foreign_key: String,
}

/// Generic [`EntityHandler`] over a [`Collection`]
pub struct Entity {
    name: String,
    model: Arc<dyn Collection>,
    tables: Vec<RelatedTable>,
    get_options: FindOptions,
    related_writes: RelatedWrites,
}

impl Entity {
    pub fn new(name: impl Into<String>, model: Arc<dyn Collection>) -> Self {
        Self {
            name: name.into(),
            model,
            tables: Vec::new(),
            get_options: FindOptions::default(),
            related_writes: RelatedWrites::default(),
        }
    }

    /// Add a related table; its rows reference the parent via `<entity>Uuid`
    pub fn with_table(mut self, name: impl Into<String>, model: Arc<dyn Collection>) -> Self {
        let foreign_key = format!("{}Uuid", lower_first(&self.name));
        self.tables.push(RelatedTable {
            name: name.into(),
            model,
            foreign_key,
        });
        self
    }

    /// Read options applied to `get`, `delete` and as defaults of `query`
    pub fn with_get_options(mut self, options: FindOptions) -> Self {
        self.get_options = options;
        self
    }

    /// Load every related table on reads
    pub fn eager(mut self) -> Self {
        self.get_options.include = self.tables.iter().map(|t| t.name.clone()).collect();
        self
    }

    pub fn with_related_writes(mut self, mode: RelatedWrites) -> Self {
        self.related_writes = mode;
        self
    }

    pub fn tables(&self) -> &[RelatedTable] {
        &self.tables
    }

    async fn load(&self, id: &uuid::Uuid, options: &FindOptions) -> Result<Item, GateError> {
        self.model
            .find_by_id(id, options)
            .await
            .map_err(|e| GateError::storage(format!("read {}", self.name), e))?
            .ok_or_else(|| GateError::NotFound {
                entity: self.name.clone(),
                id: *id,
            })
    }

    async fn try_put(&self, params: PutParams) -> Result<Item, GateError> {
        let PutParams { uuid, mut body } = params;

        let mut table_rows = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            table_rows.push(take_rows(&mut body, &table.name)?);
        }

        let item = match uuid {
            Some(id) => {
                let existing = self.load(&id, &FindOptions::default()).await?;
                tracing::debug!(entity = %self.name, item = %existing.to_json(), "item before changes");
                self.model
                    .update(&existing, body)
                    .await
                    .map_err(|e| GateError::storage(format!("update {}", self.name), e))?
            }
            None => self
                .model
                .create(body)
                .await
                .map_err(|e| GateError::storage(format!("create {}", self.name), e))?,
        };

        if self.tables.is_empty() {
            return Ok(item);
        }

        let replace = uuid.is_some();
        let writes = self.tables.iter().cloned().zip(table_rows).map(|(table, rows)| {
            let model = self.model.clone();
            let parent = item.clone();
            async move {
                let name = table.name.clone();
                (name, replace_related(model, table, parent, rows, replace).await)
            }
        });

        match self.related_writes {
            RelatedWrites::Await => {
                let failures: Vec<String> = join_all(writes)
                    .await
                    .into_iter()
                    .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
                    .collect();
                if !failures.is_empty() {
                    return Err(self.related_failure(item, replace, failures).await);
                }
                // re-read so the answer carries the new associations
                match self.model.find_by_id(&item.uuid, &self.get_options).await {
                    Ok(Some(fresh)) => Ok(fresh),
                    _ => Ok(item),
                }
            }
            RelatedWrites::Detached => {
                for write in writes {
                    let entity = self.name.clone();
                    tokio::spawn(async move {
                        let (table, result) = write.await;
                        if let Err(e) = result {
                            tracing::warn!(%entity, %table, error = %e, "related rows were not replaced");
                        }
                    });
                }
                Ok(item)
            }
        }
    }

    async fn try_delete(&self, params: GetParams) -> Result<Value, GateError> {
        let item = self.load(&params.uuid, &self.get_options).await?;
        self.model
            .destroy(&item)
            .await
            .map_err(|e| GateError::storage(format!("delete {}", self.name), e))?;
        Ok(json!({ "ok": true }))
    }

    async fn try_query(&self, mut params: QueryParams) -> Result<Vec<Item>, GateError> {
        if let Some(condition) = params.condition.take() {
            params.condition = Some(translate(&condition, self.model.operators())?);
        }
        let options = self.get_options.merged_with(params);
        self.model
            .find_all(&options)
            .await
            .map_err(|e| GateError::storage(format!("query {}", self.name), e))
    }
}

#[async_trait]
impl EntityHandler for Entity {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, params: GetParams) -> Envelope {
        Envelope::from_result(self.load(&params.uuid, &self.get_options).await).into_json()
    }

    async fn put(&self, params: PutParams) -> Envelope {
        Envelope::from_result(self.try_put(params).await).into_json()
    }

    async fn delete(&self, params: GetParams) -> Envelope {
        Envelope::from_result(self.try_delete(params).await)
    }

    async fn query(&self, params: QueryParams) -> Envelope {
        Envelope::from_result(self.try_query(params).await).into_json()
    }
}

/// Destroy the old rows (on update), create the new ones and link them to the parent
async fn replace_related(
    parent_model: Arc<dyn Collection>,
    table: RelatedTable,
    parent: Item,
    rows: Vec<Body>,
    replace: bool,
) -> anyhow::Result<()> {
    if replace {
        table.model.destroy_where(&parent_condition(&table, &parent)).await?;
    }
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.insert(table.foreign_key.clone(), json!(parent.uuid));
            row
        })
        .collect();
    let created = table.model.bulk_create(rows).await?;
    parent_model.associate(&parent, &table.name, &created).await
}

fn parent_condition(table: &RelatedTable, parent: &Item) -> Value {
    let mut condition = Body::new();
    condition.insert(table.foreign_key.clone(), json!(parent.uuid));
    Value::Object(condition)
}

fn take_rows(body: &mut Body, table: &str) -> Result<Vec<Body>, GateError> {
    match body.remove(table) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => rows
            .into_iter()
            .map(|row| match row {
                Value::Object(row) => Ok(row),
                other => Err(GateError::BadRequest {
                    message: format!("rows of '{}' must be objects, got {}", table, other),
                }),
            })
            .collect(),
        Some(other) => Err(GateError::BadRequest {
            message: format!("'{}' must be an array of rows, got {}", table, other),
        }),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Entity {
    /// A create is undone entirely; an update keeps its primary row and says so
    async fn related_failure(&self, item: Item, replace: bool, failures: Vec<String>) -> GateError {
        let failures = failures.join("; ");
        if replace {
            tracing::warn!(entity = %self.name, id = %item.uuid, %failures, "item updated, related rows not replaced");
            return GateError::Storage {
                operation: format!("update {}", self.name),
                message: format!("item {} was updated but related rows were not replaced: {}", item.uuid, failures),
            };
        }

        tracing::warn!(entity = %self.name, id = %item.uuid, %failures, "related rows failed, rolling back create");
        for table in &self.tables {
            if let Err(e) = table.model.destroy_where(&parent_condition(table, &item)).await {
                tracing::warn!(entity = %self.name, table = %table.name, error = %e, "rollback left related rows");
            }
        }
        if let Err(e) = self.model.destroy(&item).await {
            tracing::warn!(entity = %self.name, id = %item.uuid, error = %e, "rollback left the item");
        }
        GateError::Storage {
            operation: format!("create {}", self.name),
            message: format!("related rows were not written, nothing was created: {}", failures),
        }
    }
}

/// Decorator exposing only an allow-list of methods of the wrapped handler
pub struct Restricted<H> {
    inner: H,
    methods: HashSet<String>,
}

impl<H: EntityHandler> Restricted<H> {
    pub fn new(inner: H, methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            inner,
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, method: &str) -> Result<(), GateError> {
        if self.methods.contains(method) {
            Ok(())
        } else {
            Err(GateError::Forbidden {
                entity: self.inner.name().to_string(),
                method: method.to_string(),
            })
        }
    }
}

#[async_trait]
impl<H: EntityHandler> EntityHandler for Restricted<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, params: GetParams) -> Envelope {
        match self.check("get") {
            Ok(()) => self.inner.get(params).await,
            Err(err) => Envelope::err(err),
        }
    }

    async fn put(&self, params: PutParams) -> Envelope {
        match self.check("put") {
            Ok(()) => self.inner.put(params).await,
            Err(err) => Envelope::err(err),
        }
    }

    async fn delete(&self, params: GetParams) -> Envelope {
        match self.check("delete") {
            Ok(()) => self.inner.delete(params).await,
            Err(err) => Envelope::err(err),
        }
    }

    async fn query(&self, params: QueryParams) -> Envelope {
        match self.check("query") {
            Ok(()) => self.inner.query(params).await,
            Err(err) => Envelope::err(err),
        }
    }
}
