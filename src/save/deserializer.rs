//! Tagged JSON back to a value tree
//!
//! Reconstruction is guided by the JSON itself and by the declared [`Shape`]
//! of the field being read. Precedence, most specific first:
//!
//! 1. `null` is absence; an optional declaration is unwrapped otherwise
//! 2. `__enum__`: declared enum, else the tag's type name in the registry
//! 3. `__set__`: elements read with the declared element shape
//! 4. `__tuple__`: elements read positionally, cycling declared shapes
//! 5. `__type__`: the tagged record type wins over the declaration
//! 6. declared list, set, dict or record over a plain array or object
//! 7. anything else is read without a declaration

use serde_json::{Map, Value as Json};

use super::registry::TypeRegistry;
use super::serializer::{ENUM_TAG, SET_TAG, TUPLE_TAG, TYPE_TAG};
use super::types::{PersistenceError, Result};
use super::value::{EnumValue, Key, RecordSchema, RecordValue, Shape, Value};

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

enum Tagged {
    Decoded(Value),
    Plain(Map<String, Json>),
}

/// Rebuilds values from parsed JSON using a type registry
pub struct Decoder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Decoder { registry }
    }

    /// Decodes one JSON value against its declared shape
    pub fn decode(&self, json: Json, shape: &Shape) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        if let Shape::Optional(inner) = shape {
            return self.decode(json, inner);
        }

        let json = match json {
            Json::Object(object) => match self.decode_tagged(object, shape)? {
                Tagged::Decoded(value) => return Ok(value),
                Tagged::Plain(object) => Json::Object(object),
            },
            other => other,
        };

        match (shape, json) {
            (Shape::List(element), Json::Array(items)) => {
                self.decode_items(items, element).map(Value::List)
            }
            (Shape::List(_), other) => Err(PersistenceError::mismatch("array", json_kind(&other))),
            (Shape::Set(element), Json::Array(items)) => {
                self.decode_items(items, element).map(Value::Set)
            }
            (Shape::FrozenSet(element), Json::Array(items)) => {
                self.decode_items(items, element).map(Value::FrozenSet)
            }
            (Shape::Dict(key, value), Json::Object(object)) => self.decode_dict(object, key, value),
            (Shape::Record(record), Json::Object(object)) => {
                self.decode_record(&(record.schema)(), object)
            }
            (_, other) => self.decode_untyped(other),
        }
    }

    fn decode_tagged(&self, mut object: Map<String, Json>, shape: &Shape) -> Result<Tagged> {
        if let Some(tag) = object.remove(ENUM_TAG) {
            let tag = match tag {
                Json::String(tag) => tag,
                other => return Err(PersistenceError::mismatch("enum tag string", json_kind(&other))),
            };
            return self.decode_enum(&tag, shape).map(|e| Tagged::Decoded(Value::Enum(e)));
        }

        if let Some(items) = object.remove(SET_TAG) {
            let items = into_array(items)?;
            let elements = self.decode_items(items, shape.set_element())?;
            let value = match shape {
                Shape::FrozenSet(_) => Value::FrozenSet(elements),
                _ => Value::Set(elements),
            };
            return Ok(Tagged::Decoded(value));
        }

        if let Some(items) = object.remove(TUPLE_TAG) {
            let items = into_array(items)?;
            let declared: &[Shape] = match shape {
                Shape::Tuple(shapes) => shapes,
                _ => &[],
            };
            let elements = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let element = if declared.is_empty() {
                        &Shape::Any
                    } else {
                        &declared[i % declared.len()]
                    };
                    self.decode(item, element)
                })
                .collect::<Result<_>>()?;
            return Ok(Tagged::Decoded(Value::Tuple(elements)));
        }

        if let Some(name) = object.remove(TYPE_TAG) {
            let name = match name {
                Json::String(name) => name,
                other => return Err(PersistenceError::mismatch("type tag string", json_kind(&other))),
            };
            let schema = self.resolve_record(&name, shape)?;
            return self.decode_record(&schema, object).map(Tagged::Decoded);
        }

        Ok(Tagged::Plain(object))
    }

    fn decode_enum(&self, tag: &str, shape: &Shape) -> Result<EnumValue> {
        if let Shape::Enum(schema) = shape {
            let member = EnumValue::split_tag(tag).map_or("", |(_, member)| member);
            return schema.resolve(member);
        }

        let Some((type_name, member)) = EnumValue::split_tag(tag) else {
            return Err(PersistenceError::UnresolvedEnum(tag.to_string()));
        };
        match self.registry.enum_schema(type_name) {
            Some(schema) => schema.resolve(member),
            None => Err(PersistenceError::UnresolvedEnum(tag.to_string())),
        }
    }

    fn resolve_record(&self, name: &str, shape: &Shape) -> Result<RecordSchema> {
        if let Shape::Record(record) = shape {
            if record.name == name {
                return Ok((record.schema)());
            }
        }
        self.registry
            .record_schema(name)
            .cloned()
            .ok_or_else(|| PersistenceError::UnresolvedRecord(name.to_string()))
    }

    fn decode_items(&self, items: Vec<Json>, element: &Shape) -> Result<Vec<Value>> {
        items
            .into_iter()
            .map(|item| self.decode(item, element))
            .collect()
    }

    fn decode_dict(&self, object: Map<String, Json>, key_shape: &Shape, value_shape: &Shape) -> Result<Value> {
        let entries = object
            .into_iter()
            .map(|(text, item)| {
                let key = match key_shape {
                    Shape::Enum(schema) => Key::Enum(schema.resolve(&text)?),
                    _ => Key::Str(text),
                };
                Ok((key, self.decode(item, value_shape)?))
            })
            .collect::<Result<_>>()?;
        Ok(Value::Dict(entries))
    }

    /// Rebuilds a record from the fields its schema declares
    ///
    /// Engine-owned fields and unknown keys are ignored; declared fields
    /// missing from the object are left out for the type's own default.
    pub fn decode_record(&self, schema: &RecordSchema, mut object: Map<String, Json>) -> Result<Value> {
        let mut record = RecordValue::new(schema.name);
        for field in schema.persisted_fields() {
            if let Some(item) = object.remove(field.name) {
                record.push(field.name, self.decode(item, &field.shape)?);
            }
        }
        Ok(Value::Record(record))
    }

    fn decode_untyped(&self, json: Json) -> Result<Value> {
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if n.is_f64() {
                    Value::Float(n.as_f64().unwrap_or_default())
                } else {
                    return Err(PersistenceError::IntegerOverflow(n.to_string()));
                }
            }
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(self.decode_items(items, &Shape::Any)?),
            Json::Object(object) => self.decode_dict(object, &Shape::Str, &Shape::Any)?,
        })
    }
}

fn into_array(json: Json) -> Result<Vec<Json>> {
    match json {
        Json::Array(items) => Ok(items),
        other => Err(PersistenceError::mismatch("array", json_kind(&other))),
    }
}
