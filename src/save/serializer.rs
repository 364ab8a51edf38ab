//! Value tree to tagged JSON
//!
//! Plain JSON cannot tell enums, sets, tuples and records apart from strings,
//! arrays and objects, so those are wrapped:
//!
//! | Value | JSON |
//! |---|---|
//! | enum member | `{"__enum__": "Type.MEMBER"}` |
//! | set / frozenset | `{"__set__": [...]}` (sorted) |
//! | tuple | `{"__tuple__": [...]}` |
//! | record | `{"__type__": "Type", "field": ...}` |
//!
//! Lists and dicts are written as plain arrays and objects.

use std::cell::Cell;
use std::cmp::Ordering;

use serde_json::{Map, Number, Value as Json};

use super::types::{PersistenceError, Result, SAVE_VERSION, VERSION_KEY, is_engine_field};
use super::value::{RecordValue, Value};

pub const ENUM_TAG: &str = "__enum__";
pub const SET_TAG: &str = "__set__";
pub const TUPLE_TAG: &str = "__tuple__";
pub const TYPE_TAG: &str = "__type__";

fn tagged(tag: &str, inner: Json) -> Json {
    let mut object = Map::new();
    object.insert(tag.to_string(), inner);
    Json::Object(object)
}

fn encode_all(items: &[Value]) -> Result<Vec<Json>> {
    items.iter().map(encode).collect()
}

/// Recursively encodes a value as JSON
pub fn encode(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number(Number::from(*n)),
        Value::Float(x) => Number::from_f64(*x)
            .map(Json::Number)
            .ok_or(PersistenceError::NonFiniteFloat(*x))?,
        Value::Str(s) => Json::String(s.clone()),
        Value::Enum(member) => tagged(ENUM_TAG, Json::String(member.tag())),
        Value::Set(items) | Value::FrozenSet(items) => {
            tagged(SET_TAG, Json::Array(sort_set_elements(encode_all(items)?)))
        }
        Value::Tuple(items) => tagged(TUPLE_TAG, Json::Array(encode_all(items)?)),
        Value::List(items) => Json::Array(encode_all(items)?),
        Value::Dict(entries) => {
            let mut object = Map::new();
            for (key, item) in entries {
                object.insert(key.as_text().to_string(), encode(item)?);
            }
            Json::Object(object)
        }
        Value::Record(record) => Json::Object(encode_record(record)?),
    })
}

fn encode_record(record: &RecordValue) -> Result<Map<String, Json>> {
    let mut object = Map::new();
    object.insert(TYPE_TAG.to_string(), Json::String(record.type_name.clone()));
    for (name, item) in &record.fields {
        if is_engine_field(name) {
            continue;
        }
        object.insert(name.clone(), encode(item)?);
    }
    Ok(object)
}

/// Builds the full save document for a game state root
///
/// The root must be a record declaring every engine-owned field; this is
/// checked before anything is encoded.
pub fn document(root: &Value) -> Result<Json> {
    let record = match root {
        Value::Record(record) if record.declares_engine_fields() => record,
        Value::Record(record) => {
            return Err(PersistenceError::InvalidRoot(record.type_name.clone()));
        }
        other => return Err(PersistenceError::InvalidRoot(other.kind().to_string())),
    };

    let mut object = encode_record(record)?;
    object.insert(VERSION_KEY.to_string(), Json::from(SAVE_VERSION));
    Ok(Json::Object(object))
}

/// Ordering key for encoded set elements
///
/// Enum tags sort first, then strings, then numbers, then everything else by
/// its JSON text. Integers compare exactly; floats only through `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Enum(String),
    Str(String),
    Number(Number),
    Other(String),
}

impl SortKey {
    pub fn of(json: &Json) -> SortKey {
        match json {
            Json::Object(object) if object.contains_key(ENUM_TAG) => match &object[ENUM_TAG] {
                Json::String(tag) => SortKey::Enum(tag.clone()),
                other => SortKey::Other(other.to_string()),
            },
            Json::String(s) => SortKey::Str(s.clone()),
            Json::Number(n) => SortKey::Number(n.clone()),
            Json::Bool(b) => SortKey::Number(Number::from(u8::from(*b))),
            other => SortKey::Other(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Enum(_) => 0,
            SortKey::Str(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Other(_) => 3,
        }
    }

    /// None when the two keys cannot be ordered
    pub fn compare(&self, other: &SortKey) -> Option<Ordering> {
        match (self, other) {
            (SortKey::Enum(a), SortKey::Enum(b))
            | (SortKey::Str(a), SortKey::Str(b))
            | (SortKey::Other(a), SortKey::Other(b)) => Some(a.cmp(b)),
            (SortKey::Number(a), SortKey::Number(b)) => compare_numbers(a, b),
            _ => Some(self.rank().cmp(&other.rank())),
        }
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (integer(a), integer(b)) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Sorts items by key, keeping insertion order if any pair is unordered
pub fn sort_best_effort<T, K>(
    items: Vec<T>,
    keys: Vec<K>,
    compare: impl Fn(&K, &K) -> Option<Ordering>,
) -> Vec<T> {
    let incomparable = Cell::new(false);
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        compare(&keys[a], &keys[b]).unwrap_or_else(|| {
            incomparable.set(true);
            Ordering::Equal
        })
    });

    if incomparable.get() {
        log::debug!("Set elements are not mutually ordered; keeping insertion order");
        return items;
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

/// Sorts encoded set elements into their deterministic order
pub fn sort_set_elements(elements: Vec<Json>) -> Vec<Json> {
    let keys = elements.iter().map(SortKey::of).collect();
    sort_best_effort(elements, keys, SortKey::compare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::value::{EnumValue, Key};
    use serde_json::json;

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(encode(&Value::Null).unwrap(), Json::Null);
        assert_eq!(encode(&Value::Bool(true)).unwrap(), json!(true));
        assert_eq!(encode(&Value::Int(-4)).unwrap(), json!(-4));
        assert_eq!(encode(&Value::Float(2.5)).unwrap(), json!(2.5));
        assert_eq!(encode(&Value::Str("héros".into())).unwrap(), json!("héros"));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        assert!(matches!(
            encode(&Value::Float(f64::NAN)),
            Err(PersistenceError::NonFiniteFloat(_))
        ));
    }

    #[test]
    fn test_enum_is_tagged() {
        let value = Value::Enum(EnumValue::new("Color", "GREEN"));
        assert_eq!(encode(&value).unwrap(), json!({"__enum__": "Color.GREEN"}));
    }

    #[test]
    fn test_tuple_keeps_order() {
        let value = Value::Tuple(vec![Value::Int(10), Value::Int(5)]);
        assert_eq!(encode(&value).unwrap(), json!({"__tuple__": [10, 5]}));
    }

    #[test]
    fn test_set_is_sorted_by_category() {
        let value = Value::Set(vec![
            Value::Int(3),
            Value::Str("b".into()),
            Value::Null,
            Value::Enum(EnumValue::new("Color", "RED")),
            Value::Int(1),
            Value::Str("a".into()),
            Value::Enum(EnumValue::new("Color", "BLUE")),
        ]);
        assert_eq!(
            encode(&value).unwrap(),
            json!({"__set__": [
                {"__enum__": "Color.BLUE"},
                {"__enum__": "Color.RED"},
                "a",
                "b",
                1,
                3,
                null
            ]})
        );
    }

    #[test]
    fn test_unordered_keys_keep_insertion_order() {
        let items = vec!["first", "second", "third"];
        let keys = vec![2.0, f64::NAN, 1.0];
        assert_eq!(
            sort_best_effort(items, keys, |a: &f64, b: &f64| a.partial_cmp(b)),
            vec!["first", "second", "third"]
        );

        let items = vec!["first", "second", "third"];
        let keys = vec![
            SortKey::Number(Number::from(2)),
            SortKey::Str("z".into()),
            SortKey::Number(Number::from(1)),
        ];
        assert_eq!(
            sort_best_effort(items, keys, SortKey::compare),
            vec!["second", "third", "first"]
        );
    }

    #[test]
    fn test_large_integers_sort_exactly() {
        let low = 1i64 << 53;
        let value = Value::Set(vec![Value::Int(low + 1), Value::Int(low)]);
        assert_eq!(encode(&value).unwrap(), json!({"__set__": [low, low + 1]}));

        let value = Value::Set(vec![Value::Int(low), Value::Int(low + 1)]);
        assert_eq!(encode(&value).unwrap(), json!({"__set__": [low, low + 1]}));
    }

    #[test]
    fn test_mixed_numbers_sort_numerically() {
        let elements = vec![json!(u64::MAX), json!(2.5), json!(-3), json!(i64::MIN), json!(2)];
        assert_eq!(
            sort_set_elements(elements),
            vec![json!(i64::MIN), json!(-3), json!(2), json!(2.5), json!(u64::MAX)]
        );
    }

    #[test]
    fn test_hash_set_of_large_integers_is_deterministic() {
        use crate::save::Persist;
        use std::collections::HashSet;

        let low = 1i64 << 53;
        for _ in 0..50 {
            let ids: HashSet<i64> = [low + 1, low, low + 2].into_iter().collect();
            let encoded = encode(&ids.to_value().unwrap()).unwrap();
            assert_eq!(encoded, json!({"__set__": [low, low + 1, low + 2]}));
        }
    }

    #[test]
    fn test_dict_uses_bare_enum_member_keys() {
        let value = Value::Dict(vec![
            (Key::Enum(EnumValue::new("Color", "RED")), Value::Int(10)),
            (Key::Enum(EnumValue::new("Color", "BLUE")), Value::Int(20)),
        ]);
        let encoded = encode(&value).unwrap();
        assert_eq!(encoded, json!({"RED": 10, "BLUE": 20}));
        let keys: Vec<&String> = encoded.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["RED", "BLUE"]);
    }

    #[test]
    fn test_engine_fields_skipped_at_every_depth() {
        let inner = RecordValue::new("Clock")
            .with("frame_count", Value::Int(12))
            .with("label", Value::Str("tick".into()));
        let value = Value::Record(
            RecordValue::new("World")
                .with("elapsed_time", Value::Float(9.5))
                .with("clock", Value::Record(inner)),
        );
        assert_eq!(
            encode(&value).unwrap(),
            json!({"__type__": "World", "clock": {"__type__": "Clock", "label": "tick"}})
        );
    }

    #[test]
    fn test_document_requires_state_root() {
        let plain = Value::Record(RecordValue::new("Position").with("x", Value::Float(1.0)));
        assert!(matches!(document(&plain), Err(PersistenceError::InvalidRoot(name)) if name == "Position"));
        assert!(matches!(document(&Value::Int(3)), Err(PersistenceError::InvalidRoot(_))));
    }

    #[test]
    fn test_document_carries_version_last() {
        let root = Value::Record(
            RecordValue::new("Simple")
                .with("is_running", Value::Bool(false))
                .with("frame_count", Value::Int(999))
                .with("elapsed_time", Value::Float(42.5))
                .with("metadata", Value::Dict(Vec::new()))
                .with("score", Value::Int(5)),
        );
        let doc = document(&root).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["__type__", "metadata", "score", "__save_version__"]);
        assert_eq!(doc[VERSION_KEY], json!(SAVE_VERSION));
    }
}
