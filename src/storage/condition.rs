//! Evaluation of native conditions against in-memory items
//!
//! Conditions use the tokens of [`OperatorTable::standard`]:
//!
//! ```text
//! {"status": "paid"}                          equality
//! {"status": ["new", "paid"]}                 shorthand for op:in
//! {"total": {"op:gt": 5, "op:lte": 10}}       every operator must hold
//! {"op:or": [{"a": 1}, {"b": {"op:ne": 2}}]}  logical combinators
//! ```
//!
//! [`OperatorTable::standard`]: crate::core::operators::OperatorTable::standard

use crate::core::item::Item;
use crate::core::operators::NativeOp;
use anyhow::{Result, anyhow, bail};
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Whether `item` satisfies `condition`
pub fn matches(item: &Item, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(map) => matches_all(item, map),
        Value::Array(parts) => {
            for part in parts {
                if !matches(item, part)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Null => Ok(true),
        other => bail!("condition must be an object, got {}", other),
    }
}

fn matches_all(item: &Item, map: &Map<String, Value>) -> Result<bool> {
    for (key, value) in map {
        let holds = match NativeOp::from_token(key) {
            Some(op) if op.is_logical() => logical(item, op, value)?,
            Some(op) => bail!("operator {} needs a field", op.token()),
            None => field_matches(item.field(key).as_ref(), value)?,
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical(item: &Item, op: NativeOp, value: &Value) -> Result<bool> {
    match (op, value) {
        (NativeOp::Not, condition) => Ok(!matches(item, condition)?),
        (NativeOp::And, condition) => matches(item, condition),
        (NativeOp::Or, Value::Array(parts)) => {
            for part in parts {
                if matches(item, part)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (NativeOp::Or, Value::Object(map)) => {
            for (key, value) in map {
                let mut single = Map::new();
                single.insert(key.clone(), value.clone());
                if matches_all(item, &single)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (op, other) => bail!("{} cannot take {}", op.token(), other),
    }
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> Result<bool> {
    match expected {
        Value::Object(ops) if ops.keys().all(|k| NativeOp::from_token(k).is_some()) => {
            for (token, operand) in ops {
                let op = NativeOp::from_token(token).ok_or_else(|| anyhow!("unknown operator {}", token))?;
                if !compare(actual, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Array(values) => Ok(values.iter().any(|v| equals(actual, v))),
        other => Ok(equals(actual, other)),
    }
}

fn compare(actual: Option<&Value>, op: NativeOp, operand: &Value) -> Result<bool> {
    Ok(match op {
        NativeOp::Eq => equals(actual, operand),
        NativeOp::Ne => !equals(actual, operand),
        NativeOp::Gt => order(actual, operand) == Some(Ordering::Greater),
        NativeOp::Gte => matches!(order(actual, operand), Some(Ordering::Greater | Ordering::Equal)),
        NativeOp::Lt => order(actual, operand) == Some(Ordering::Less),
        NativeOp::Lte => matches!(order(actual, operand), Some(Ordering::Less | Ordering::Equal)),
        NativeOp::In => list(op, operand)?.iter().any(|v| equals(actual, v)),
        NativeOp::NotIn => !list(op, operand)?.iter().any(|v| equals(actual, v)),
        NativeOp::Like => like(actual, operand)?,
        NativeOp::NotLike => !like(actual, operand)?,
        NativeOp::Between => match list(op, operand)?.as_slice() {
            [low, high] => {
                matches!(order(actual, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(order(actual, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => bail!("{} needs exactly two bounds", op.token()),
        },
        NativeOp::Or | NativeOp::And | NativeOp::Not => {
            let nested = Value::Object(Map::from_iter([(op.token(), operand.clone())]));
            let mut probe = Item::new(uuid::Uuid::nil(), Map::new());
            if let Some(v) = actual {
                probe.fields.insert("value".to_string(), v.clone());
            }
            // `{"field": {"op:or": [{"op:lt": 1}, {"op:gt": 9}]}}` applies to the field itself
            return logical_on_value(&probe, &nested);
        }
    })
}

fn logical_on_value(probe: &Item, nested: &Value) -> Result<bool> {
    let Some((token, operand)) = nested.as_object().and_then(|m| m.iter().next()) else {
        return Ok(true);
    };
    let wrap = |part: &Value| {
        let mut map = Map::new();
        map.insert("value".to_string(), part.clone());
        Value::Object(map)
    };
    let parts: Vec<Value> = match operand {
        Value::Array(parts) => parts.iter().map(wrap).collect(),
        other => vec![wrap(other)],
    };
    match NativeOp::from_token(token) {
        Some(NativeOp::Or) => {
            for part in &parts {
                if matches(probe, part)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Some(NativeOp::And) => matches(probe, &Value::Array(parts)),
        Some(NativeOp::Not) => Ok(!matches(probe, &Value::Array(parts))?),
        _ => bail!("unknown logical operator {}", token),
    }
}

fn list(op: NativeOp, operand: &Value) -> Result<&Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| anyhow!("{} needs an array, got {}", op.token(), operand))
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(a), b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (None, _) => false,
    }
}

/// Ordering of comparable values; `None` when the types do not compare
pub fn order(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn like(actual: Option<&Value>, pattern: &Value) -> Result<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| anyhow!("like pattern must be a string, got {}", pattern))?;
    let Some(Value::String(text)) = actual else {
        return Ok(false);
    };
    Ok(like_regex(pattern)?.is_match(text))
}

/// SQL LIKE pattern (`%`, `_`) to an anchored regex
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Ok(Regex::new(&expr)?)
}
