//! Request parameters and find options for entity operations

use crate::core::item::Body;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Sort direction of an `order` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

/// Options forwarded to the persistence engine on reads
///
/// `condition` is always in native form here: entity handlers translate the
/// portable `$` operators before building find options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,

    /// Related tables to load eagerly
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// `[["field", "ASC"], ...]`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<(String, SortDirection)>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,

    /// Field projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
}

impl FindOptions {
    pub fn including(tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            include: tables.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Overlay `request` on top of these defaults; request values win
    pub fn merged_with(&self, request: FindOptions) -> FindOptions {
        FindOptions {
            condition: request.condition.or_else(|| self.condition.clone()),
            include: if request.include.is_empty() {
                self.include.clone()
            } else {
                request.include
            },
            order: if request.order.is_empty() {
                self.order.clone()
            } else {
                request.order
            },
            limit: request.limit.or(self.limit),
            offset: request.offset.or(self.offset),
            attributes: request.attributes.or_else(|| self.attributes.clone()),
        }
    }
}

/// `get` and `delete` data: `{"uuid": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetParams {
    pub uuid: Uuid,
}

/// `put` data: `{"uuid"?: ..., "body": {...}}`
///
/// Rows of related tables travel inside `body` under the table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    #[serde(default)]
    pub body: Body,
}

/// `query` data: find options whose `where` still uses `$` operators
pub type QueryParams = FindOptions;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_params_parse() {
        let params: QueryParams = serde_json::from_value(json!({
            "where": {"total": {"$gt": 5}},
            "order": [["total", "DESC"]],
            "limit": 10
        }))
        .unwrap();
        assert_eq!(params.condition, Some(json!({"total": {"$gt": 5}})));
        assert_eq!(params.order, vec![("total".to_string(), SortDirection::Desc)]);
        assert_eq!(params.limit, Some(10));
        assert!(params.include.is_empty());
    }

    #[test]
    fn test_request_options_win() {
        let defaults = FindOptions {
            limit: Some(50),
            ..FindOptions::including(["lines"])
        };
        let merged = defaults.merged_with(FindOptions {
            limit: Some(5),
            ..FindOptions::default()
        });
        assert_eq!(merged.limit, Some(5));
        assert_eq!(merged.include, vec!["lines".to_string()]);
    }

    #[test]
    fn test_put_params_defaults() {
        let params: PutParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.uuid.is_none());
        assert!(params.body.is_empty());
    }
}
