//! JSON → Bolt parameter conversion.
//!
//! Stub properties travel as `serde_json` maps; the driver wants
//! `BoltType`. Nulls are dropped rather than written; an absent property
//! and a null property are equivalent for every query we run.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltString, BoltType};
use serde_json::Value;

pub fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        // Callers skip nulls; a null that still arrives becomes "".
        Value::Null => BoltType::String(BoltString::from("")),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(0.0))),
        },
        Value::String(s) => BoltType::String(BoltString::from(s.as_str())),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => BoltType::Map(object_to_bolt(map)),
    }
}

/// Convert a JSON object into a Bolt map, skipping null values and
/// flattening nested structures the graph store cannot hold as node
/// properties (objects become JSON strings).
pub fn properties_to_bolt(map: &serde_json::Map<String, Value>) -> BoltMap {
    let mut bolt = BoltMap::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Object(_) => {
                let rendered = value.to_string();
                bolt.put(BoltString::from(key.as_str()), BoltType::String(rendered.into()));
            }
            other => {
                bolt.put(BoltString::from(key.as_str()), json_to_bolt(other));
            }
        }
    }
    bolt
}

pub fn object_to_bolt(map: &serde_json::Map<String, Value>) -> BoltMap {
    let mut bolt = BoltMap::new();
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        bolt.put(BoltString::from(key.as_str()), json_to_bolt(value));
    }
    bolt
}

pub fn string_list(items: &[String]) -> BoltType {
    let mut list = BoltList::new();
    for item in items {
        list.push(BoltType::String(BoltString::from(item.as_str())));
    }
    BoltType::List(list)
}
