//! Closed value model for persisted state
//!
//! Every persistable Rust value converts into a [`Value`] tree before it is
//! written, and every document is reconstructed into one before typed
//! conversion. [`Shape`] describes the declared type of a field, which the
//! deserializer uses where the JSON shape alone is ambiguous.

use std::any::TypeId;
use std::fmt;

use super::types::{ENGINE_FIELDS, METADATA_FIELD, PersistenceError, Result, is_engine_field};

/// A member of a closed enumeration, identified by type name and member name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumValue {
    pub type_name: String,
    pub member: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        EnumValue {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// The `TypeName.MemberName` form written under `__enum__`
    pub fn tag(&self) -> String {
        format!("{}.{}", self.type_name, self.member)
    }

    /// Splits a `TypeName.MemberName` tag at its first dot
    pub fn split_tag(tag: &str) -> Option<(&str, &str)> {
        tag.split_once('.')
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.member)
    }
}

/// A dict key: plain text or an enum member
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Enum(EnumValue),
}

impl Key {
    /// The text used as the JSON object key
    ///
    /// Enum keys are written as their bare member name; the declared key
    /// type supplies the enum on the way back in.
    pub fn as_text(&self) -> &str {
        match self {
            Key::Str(s) => s,
            Key::Enum(e) => &e.member,
        }
    }
}

/// A record instance: its type tag plus one entry per declared field
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl RecordValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        RecordValue {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Removes and returns a field's value
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(index).1)
    }

    /// True if this record carries every field a game state declares
    ///
    /// That is the engine-owned fields plus `metadata`.
    pub fn declares_engine_fields(&self) -> bool {
        ENGINE_FIELDS
            .iter()
            .chain([&METADATA_FIELD])
            .all(|name| self.get(name).is_some())
    }
}

/// Any persistable value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(EnumValue),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Vec<(Key, Value)>),
    Record(RecordValue),
}

impl Value {
    /// Short category name, used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn same_elements(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match (0..b.len()).find(|&i| !used[i] && b[i] == *x) {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Sets and dicts compare without regard to order; everything else is structural.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Set(a), Value::Set(b)) | (Value::FrozenSet(a), Value::FrozenSet(b)) => {
                same_elements(a, b)
            }
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

/// Declared schema of an enumeration
#[derive(Debug, Clone, Copy)]
pub struct EnumSchema {
    pub name: &'static str,
    pub members: &'static [&'static str],
    pub type_id: TypeId,
}

impl EnumSchema {
    /// Looks up a member by name, returning the enum value for it
    pub fn resolve(&self, member: &str) -> Result<EnumValue> {
        if self.members.contains(&member) {
            Ok(EnumValue::new(self.name, member))
        } else {
            Err(PersistenceError::UnknownMember {
                type_name: self.name.to_string(),
                member: member.to_string(),
            })
        }
    }
}

/// A reference to a record type's schema
///
/// The schema is produced lazily so that records may nest themselves
/// through a collection field.
#[derive(Clone, Copy)]
pub struct RecordRef {
    pub name: &'static str,
    pub schema: fn() -> RecordSchema,
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RecordRef({})", self.name)
    }
}

/// One declared field of a record
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    pub shape: Shape,
}

/// Declared schema of a record type
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: &'static str,
    pub type_id: TypeId,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields that are read from and written to documents
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|field| !is_engine_field(field.name))
    }
}

/// The declared (static) type of a value
#[derive(Debug, Clone)]
pub enum Shape {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Optional(Box<Shape>),
    Enum(EnumSchema),
    Set(Box<Shape>),
    FrozenSet(Box<Shape>),
    Tuple(Vec<Shape>),
    List(Box<Shape>),
    Dict(Box<Shape>, Box<Shape>),
    Record(RecordRef),
}

impl Shape {
    /// Element shape of a set-like declaration, `Any` otherwise
    pub fn set_element(&self) -> &Shape {
        match self {
            Shape::Set(inner) | Shape::FrozenSet(inner) => inner,
            _ => &Shape::Any,
        }
    }
}
