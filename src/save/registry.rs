//! Type registry for save documents
//!
//! Maps the tags written under `__enum__` and `__type__` back to the
//! schemas of the Rust types that produced them.

use std::collections::HashMap;

use super::saveable::{PersistEnum, PersistRecord};
use super::types::{PersistenceError, Result};
use super::value::{EnumSchema, RecordSchema, Shape};
use crate::state::GameState;

/// Central registry of persistable enum and record types
///
/// Every type tag found in a save (`__enum__` or `__type__`) is resolved
/// here when the declared field type cannot name it. Tags are unique: two
/// different Rust types may not register under the same name.
pub struct TypeRegistry {
    enums: HashMap<String, EnumSchema>,
    records: HashMap<String, RecordSchema>,
}

impl TypeRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        TypeRegistry {
            enums: HashMap::new(),
            records: HashMap::new(),
        }
    }

    /// Creates a registry holding a record type and everything it reaches
    pub fn with_record<R: PersistRecord>() -> Result<Self> {
        let mut registry = Self::new();
        registry.register_record::<R>()?;
        Ok(registry)
    }

    /// Registers an enum type under its type name
    pub fn register_enum<E: PersistEnum>(&mut self) -> Result<()> {
        self.add_enum(E::enum_schema())
    }

    /// Registers a record type, then every enum and record its fields reach
    ///
    /// Registering the same type twice is a no-op.
    pub fn register_record<R: PersistRecord>(&mut self) -> Result<()> {
        self.add_record(R::record_schema())
    }

    /// Registers a game state root and every type it reaches
    pub fn register_state<S: GameState>(&mut self) -> Result<()> {
        self.register_record::<S>()
    }

    /// Registers every enum and record reachable from a declared shape
    pub fn register_shape(&mut self, shape: &Shape) -> Result<()> {
        match shape {
            Shape::Enum(schema) => self.add_enum(*schema),
            Shape::Record(record) => self.add_record((record.schema)()),
            Shape::Optional(inner)
            | Shape::Set(inner)
            | Shape::FrozenSet(inner)
            | Shape::List(inner) => self.register_shape(inner),
            Shape::Tuple(items) => items.iter().try_for_each(|item| self.register_shape(item)),
            Shape::Dict(key, value) => {
                self.register_shape(key)?;
                self.register_shape(value)
            }
            Shape::Any | Shape::Bool | Shape::Int | Shape::Float | Shape::Str => Ok(()),
        }
    }

    fn check_tag(&self, name: &str, type_id: std::any::TypeId) -> Result<bool> {
        let existing = self
            .enums
            .get(name)
            .map(|schema| schema.type_id)
            .or_else(|| self.records.get(name).map(|schema| schema.type_id));

        match existing {
            Some(id) if id == type_id => Ok(true),
            Some(_) => Err(PersistenceError::DuplicateTag(name.to_string())),
            None => Ok(false),
        }
    }

    fn add_enum(&mut self, schema: EnumSchema) -> Result<()> {
        if self.check_tag(schema.name, schema.type_id)? {
            return Ok(());
        }

        log::debug!("Registered enum type {}", schema.name);
        self.enums.insert(schema.name.to_string(), schema);
        Ok(())
    }

    fn add_record(&mut self, schema: RecordSchema) -> Result<()> {
        if self.check_tag(schema.name, schema.type_id)? {
            return Ok(());
        }

        log::debug!("Registered record type {}", schema.name);
        // Insert before walking the fields so self-referencing records terminate
        let shapes: Vec<Shape> = schema.fields.iter().map(|f| f.shape.clone()).collect();
        self.records.insert(schema.name.to_string(), schema);

        for shape in &shapes {
            self.register_shape(shape)?;
        }
        Ok(())
    }

    /// Gets an enum schema by tag
    pub fn enum_schema(&self, name: &str) -> Option<&EnumSchema> {
        self.enums.get(name)
    }

    /// Gets a record schema by tag
    pub fn record_schema(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    /// Returns true if any type is registered under this tag
    pub fn contains(&self, name: &str) -> bool {
        self.enums.contains_key(name) || self.records.contains_key(name)
    }

    /// Returns all registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .enums
            .keys()
            .chain(self.records.keys())
            .map(String::as_str)
            .collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.enums.len() + self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    enum Element {
        Fire,
        Ice,
    }
    crate::persist_enum!(Element { Fire => "FIRE", Ice => "ICE" });

    #[derive(Debug, Default)]
    struct Spell {
        element: Option<Element>,
        power: i32,
    }
    crate::persist_record!(Spell { element, power });

    #[derive(Debug, Default)]
    struct Node {
        label: String,
        children: Vec<Node>,
    }
    crate::persist_record!(Node { label, children });

    mod other {
        #[derive(Debug, Default)]
        pub struct Spell {
            pub name: String,
        }
        crate::persist_record!(Spell { name });
    }

    #[test]
    fn test_register_record_reaches_nested_types() {
        let registry = TypeRegistry::with_record::<Spell>().unwrap();
        assert!(registry.record_schema("Spell").is_some());
        assert!(registry.enum_schema("Element").is_some());
        assert_eq!(registry.tags(), vec!["Element", "Spell"]);
    }

    #[test]
    fn test_recursive_record_terminates() {
        let registry = TypeRegistry::with_record::<Node>().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistering_same_type_is_noop() {
        let mut registry = TypeRegistry::new();
        registry.register_enum::<Element>().unwrap();
        registry.register_enum::<Element>().unwrap();
        registry.register_record::<Spell>().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_tag_is_rejected() {
        let mut registry = TypeRegistry::with_record::<Spell>().unwrap();
        let result = registry.register_record::<other::Spell>();
        assert!(matches!(result, Err(PersistenceError::DuplicateTag(name)) if name == "Spell"));
    }

    #[test]
    fn test_register_state() {
        let mut registry = TypeRegistry::new();
        registry.register_state::<crate::state::BaseGameState>().unwrap();
        assert_eq!(registry.tags(), vec!["BaseGameState"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = TypeRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains("Spell"));
    }
}
