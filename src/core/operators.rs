//! Symbolic query operators and their translation to engine-native tokens
//!
//! Query conditions arrive with portable operator keys such as `$gt` or
//! `$or`. Each persistence engine publishes an [`OperatorTable`] mapping the
//! operator names to its own tokens; [`translate`] rewrites a condition tree
//! using that table.
//!
//! ```rust,ignore
//! let table = OperatorTable::standard();
//! let native = translate(&json!({"total": {"$gt": 5}}), &table)?;
//! assert_eq!(native, json!({"total": {"op:gt": 5}}));
//! ```

use crate::core::error::GateError;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// First character of a key that names an operator instead of a field
pub const OPERATOR_MARKER: char = '$';

/// Operators understood by the bundled in-memory engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    Or,
    And,
    Not,
}

impl NativeOp {
    pub const ALL: [NativeOp; 14] = [
        NativeOp::Eq,
        NativeOp::Ne,
        NativeOp::Gt,
        NativeOp::Gte,
        NativeOp::Lt,
        NativeOp::Lte,
        NativeOp::In,
        NativeOp::NotIn,
        NativeOp::Like,
        NativeOp::NotLike,
        NativeOp::Between,
        NativeOp::Or,
        NativeOp::And,
        NativeOp::Not,
    ];

    /// Portable name, as written after the `$` marker
    pub fn name(&self) -> &'static str {
        match self {
            NativeOp::Eq => "eq",
            NativeOp::Ne => "ne",
            NativeOp::Gt => "gt",
            NativeOp::Gte => "gte",
            NativeOp::Lt => "lt",
            NativeOp::Lte => "lte",
            NativeOp::In => "in",
            NativeOp::NotIn => "notIn",
            NativeOp::Like => "like",
            NativeOp::NotLike => "notLike",
            NativeOp::Between => "between",
            NativeOp::Or => "or",
            NativeOp::And => "and",
            NativeOp::Not => "not",
        }
    }

    /// Token used inside translated conditions
    pub fn token(&self) -> String {
        format!("op:{}", self.name())
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let name = token.strip_prefix("op:")?;
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, NativeOp::Or | NativeOp::And | NativeOp::Not)
    }
}

/// Operator name to engine-native token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorTable {
    tokens: HashMap<String, String>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of the bundled in-memory engine
    pub fn standard() -> Self {
        NativeOp::ALL
            .into_iter()
            .fold(Self::new(), |table, op| table.with(op.name(), op.token()))
    }

    pub fn with(mut self, name: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(name.into(), token.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Rewrite every `$`-prefixed key of `condition` into its native token
///
/// Objects are rewritten recursively. Arrays keep their shape: object
/// elements are rewritten, scalar elements (e.g. the values of `$in`) are
/// copied untouched. The input is never modified.
///
/// Apply exactly once per condition: the output is already in native form.
pub fn translate(condition: &Value, table: &OperatorTable) -> Result<Value, GateError> {
    match condition {
        Value::Object(map) => translate_object(map, table).map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|item| translate(item, table))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}

fn translate_object(map: &Map<String, Value>, table: &OperatorTable) -> Result<Map<String, Value>, GateError> {
    let mut result = Map::with_capacity(map.len());
    for (key, value) in map {
        let new_key = match key.strip_prefix(OPERATOR_MARKER) {
            Some(name) => table
                .get(name)
                .ok_or_else(|| GateError::UnknownOperator {
                    operator: name.to_string(),
                })?
                .to_string(),
            None => key.clone(),
        };
        result.insert(new_key, translate(value, table)?);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> OperatorTable {
        OperatorTable::standard()
    }

    #[test]
    fn test_single_operator() {
        let out = translate(&json!({"$gt": 5}), &table()).unwrap();
        assert_eq!(out, json!({"op:gt": 5}));
    }

    #[test]
    fn test_nested_or_keeps_array_shape() {
        let out = translate(&json!({"$or": [{"$gt": 5}, {"$lt": 1}]}), &table()).unwrap();
        assert_eq!(out, json!({"op:or": [{"op:gt": 5}, {"op:lt": 1}]}));
    }

    #[test]
    fn test_in_array_of_scalars_passes_verbatim() {
        let out = translate(&json!({"status": {"$in": ["new", "paid", 3]}}), &table()).unwrap();
        assert_eq!(out, json!({"status": {"op:in": ["new", "paid", 3]}}));
    }

    #[test]
    fn test_field_names_unchanged_at_any_depth() {
        let input = json!({"customer": {"address": {"city": "Oslo"}}, "total": 10});
        assert_eq!(translate(&input, &table()).unwrap(), input);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = json!({"$and": [{"a": {"$ne": null}}]});
        let snapshot = input.clone();
        let _ = translate(&input, &table()).unwrap();
        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_unknown_operator_fails() {
        let err = translate(&json!({"a": {"$near": 1}}), &table()).unwrap_err();
        assert_eq!(
            err,
            GateError::UnknownOperator {
                operator: "near".to_string()
            }
        );
    }

    #[test]
    fn test_custom_table_tokens() {
        let custom = OperatorTable::new().with("gt", ">");
        let out = translate(&json!({"n": {"$gt": 1}}), &custom).unwrap();
        assert_eq!(out, json!({"n": {">": 1}}));
    }

    #[test]
    fn test_native_op_token_roundtrip() {
        for op in NativeOp::ALL {
            assert_eq!(NativeOp::from_token(&op.token()), Some(op));
        }
        assert_eq!(NativeOp::from_token("gt"), None);
    }
}
