//! Persisted record passed between the persistence engine and entity handlers

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key/value body of an item
pub type Body = Map<String, Value>;

/// A persisted record
///
/// Serializes flat: `{"uuid": ..., <fields>..., <table>: [...]}`. A related
/// table is rendered as full rows when it was eagerly loaded, otherwise as
/// the ordered list of related uuids.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub uuid: Uuid,
    pub fields: Body,
    pub associations: IndexMap<String, Vec<Uuid>>,
    pub included: IndexMap<String, Vec<Item>>,
}

impl Item {
    pub fn new(uuid: Uuid, fields: Body) -> Self {
        Self {
            uuid,
            fields,
            associations: IndexMap::new(),
            included: IndexMap::new(),
        }
    }

    /// Value of a field, `uuid` included
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == "uuid" {
            return Some(Value::String(self.uuid.to_string()));
        }
        self.fields.get(name).cloned()
    }

    /// Merge `body` into the fields; only provided keys change
    pub fn merge(&mut self, body: Body) {
        for (key, value) in body {
            if key != "uuid" {
                self.fields.insert(key, value);
            }
        }
    }

    /// Keep only the listed fields
    pub fn project(&mut self, attributes: &[String]) {
        self.fields.retain(|key, _| attributes.iter().any(|a| a == key));
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("uuid", &self.uuid)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        for (table, ids) in &self.associations {
            if !self.included.contains_key(table) {
                map.serialize_entry(table, ids)?;
            }
        }
        for (table, rows) in &self.included {
            map.serialize_entry(table, rows)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Body {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flat_serialization() {
        let id = Uuid::new_v4();
        let line = Uuid::new_v4();
        let mut item = Item::new(id, body(json!({"title": "A"})));
        item.associations.insert("lines".to_string(), vec![line]);

        assert_eq!(
            item.to_json(),
            json!({"uuid": id.to_string(), "title": "A", "lines": [line.to_string()]})
        );
    }

    #[test]
    fn test_included_rows_replace_ids() {
        let mut item = Item::new(Uuid::new_v4(), Body::new());
        let row = Item::new(Uuid::new_v4(), body(json!({"qty": 2})));
        item.associations.insert("lines".to_string(), vec![row.uuid]);
        item.included.insert("lines".to_string(), vec![row.clone()]);

        let json = item.to_json();
        assert_eq!(json["lines"][0]["qty"], json!(2));
        assert_eq!(json["lines"][0]["uuid"], json!(row.uuid.to_string()));
    }

    #[test]
    fn test_merge_changes_only_given_fields() {
        let mut item = Item::new(Uuid::new_v4(), body(json!({"title": "A", "total": 3})));
        let id = item.uuid;
        item.merge(body(json!({"title": "x", "uuid": "ignored"})));
        assert_eq!(item.field("title"), Some(json!("x")));
        assert_eq!(item.field("total"), Some(json!(3)));
        assert_eq!(item.uuid, id);
    }

    #[test]
    fn test_project() {
        let mut item = Item::new(Uuid::new_v4(), body(json!({"a": 1, "b": 2})));
        item.project(&["b".to_string()]);
        assert_eq!(item.field("a"), None);
        assert_eq!(item.field("b"), Some(json!(2)));
        assert!(item.field("uuid").is_some());
    }
}
