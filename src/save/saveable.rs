//! Conversion between typed game data and the [`Value`] model
//!
//! Any type stored in a game state implements [`Persist`]. Primitives, tuples
//! of one to eight elements and the standard collections are covered here;
//! records and enums get their implementations from the `persist_record!`,
//! `persist_state!` and `persist_enum!` macros.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::ops::Deref;

use super::types::{PersistenceError, Result};
use super::value::{EnumSchema, EnumValue, Key, RecordSchema, Shape, Value};

/// Trait for values that can be saved and loaded
///
/// # Design Pattern: Trait-based Serialization
///
/// Each type converts itself to a [`Value`] tree and back, and declares its
/// static [`Shape`] so the loader can disambiguate plain JSON arrays and
/// objects.
pub trait Persist: Sized {
    /// Declared type of this value
    fn shape() -> Shape;

    /// Convert the value to its saveable form
    fn to_value(&self) -> Result<Value>;

    /// Rebuild a value from its saved form
    fn from_value(value: Value) -> Result<Self>;
}

/// Trait for types usable as dict keys (text or enum members)
pub trait PersistKey: Sized {
    fn key_shape() -> Shape;

    fn to_key(&self) -> Result<Key>;

    fn from_key(key: Key) -> Result<Self>;
}

/// A closed enumeration of unit members
///
/// Implemented by `persist_enum!`. Members are saved as `TypeName.MemberName`
/// and, when used as dict keys, as the bare member name.
pub trait PersistEnum: Sized + 'static {
    const TYPE_NAME: &'static str;
    const MEMBERS: &'static [&'static str];

    fn member_name(&self) -> &'static str;

    fn from_member(name: &str) -> Option<Self>;

    fn enum_schema() -> EnumSchema {
        EnumSchema {
            name: Self::TYPE_NAME,
            members: Self::MEMBERS,
            type_id: TypeId::of::<Self>(),
        }
    }

    fn to_enum_value(&self) -> EnumValue {
        EnumValue::new(Self::TYPE_NAME, self.member_name())
    }

    fn from_enum_value(value: EnumValue) -> Result<Self> {
        if value.type_name != Self::TYPE_NAME {
            return Err(PersistenceError::mismatch(Self::TYPE_NAME, "member of another enum"));
        }
        Self::from_member(&value.member).ok_or(PersistenceError::UnknownMember {
            type_name: value.type_name,
            member: value.member,
        })
    }
}

/// A record type with named fields
///
/// Implemented by `persist_record!` and `persist_state!`. Fields missing from
/// a saved document keep their value from `Default::default()`.
pub trait PersistRecord: Persist + Default + 'static {
    const TYPE_NAME: &'static str;

    fn record_schema() -> RecordSchema;
}

impl Persist for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(PersistenceError::mismatch("bool", other.kind())),
        }
    }
}

macro_rules! persist_int {
    ($($ty:ty),*) => {
        $(
            impl Persist for $ty {
                fn shape() -> Shape {
                    Shape::Int
                }

                fn to_value(&self) -> Result<Value> {
                    i64::try_from(*self)
                        .map(Value::Int)
                        .map_err(|_| PersistenceError::IntegerOverflow(self.to_string()))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(n) => <$ty>::try_from(n)
                            .map_err(|_| PersistenceError::IntegerOverflow(n.to_string())),
                        other => Err(PersistenceError::mismatch("int", other.kind())),
                    }
                }
            }
        )*
    };
}

persist_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

macro_rules! persist_float {
    ($($ty:ty),*) => {
        $(
            impl Persist for $ty {
                fn shape() -> Shape {
                    Shape::Float
                }

                fn to_value(&self) -> Result<Value> {
                    Ok(Value::Float(f64::from(*self)))
                }

                // Whole numbers may have been written without a fraction
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Float(x) => Ok(x as $ty),
                        Value::Int(n) => Ok(n as $ty),
                        other => Err(PersistenceError::mismatch("float", other.kind())),
                    }
                }
            }
        )*
    };
}

persist_float!(f32, f64);

impl Persist for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Str(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(PersistenceError::mismatch("string", other.kind())),
        }
    }
}

impl PersistKey for String {
    fn key_shape() -> Shape {
        Shape::Str
    }

    fn to_key(&self) -> Result<Key> {
        Ok(Key::Str(self.clone()))
    }

    fn from_key(key: Key) -> Result<Self> {
        match key {
            Key::Str(s) => Ok(s),
            Key::Enum(_) => Err(PersistenceError::mismatch("string key", "enum key")),
        }
    }
}

/// The untyped value itself, for free-form fields such as metadata
impl Persist for Value {
    fn shape() -> Shape {
        Shape::Any
    }

    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: Persist> Persist for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn shape() -> Shape {
        Shape::List(Box::new(T::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(Persist::to_value)
            .collect::<Result<_>>()
            .map(Value::List)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(PersistenceError::mismatch("list", other.kind())),
        }
    }
}

fn set_items(value: Value, expected: &'static str) -> Result<Vec<Value>> {
    match value {
        Value::Set(items) | Value::FrozenSet(items) | Value::List(items) => Ok(items),
        other => Err(PersistenceError::mismatch(expected, other.kind())),
    }
}

impl<T: Persist + Eq + Hash> Persist for HashSet<T> {
    fn shape() -> Shape {
        Shape::Set(Box::new(T::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(Persist::to_value)
            .collect::<Result<_>>()
            .map(Value::Set)
    }

    fn from_value(value: Value) -> Result<Self> {
        set_items(value, "set")?.into_iter().map(T::from_value).collect()
    }
}

impl<T: Persist + Ord> Persist for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::Set(Box::new(T::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(Persist::to_value)
            .collect::<Result<_>>()
            .map(Value::Set)
    }

    fn from_value(value: Value) -> Result<Self> {
        set_items(value, "set")?.into_iter().map(T::from_value).collect()
    }
}

/// An immutable set
///
/// Built once from an iterator; only read access is exposed afterwards.
///
/// ```compile_fail
/// use ludos::save::FrozenSet;
///
/// let mut ids: FrozenSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
/// ids.insert("z".to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrozenSet<T: Ord>(BTreeSet<T>);

impl<T: Ord> FrozenSet<T> {
    pub fn new() -> Self {
        FrozenSet(BTreeSet::new())
    }
}

impl<T: Ord> Default for FrozenSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> Deref for FrozenSet<T> {
    type Target = BTreeSet<T>;

    fn deref(&self) -> &BTreeSet<T> {
        &self.0
    }
}

impl<T: Ord> FromIterator<T> for FrozenSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        FrozenSet(iter.into_iter().collect())
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for FrozenSet<T> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<'a, T: Ord> IntoIterator for &'a FrozenSet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::btree_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Persist + Ord> Persist for FrozenSet<T> {
    fn shape() -> Shape {
        Shape::FrozenSet(Box::new(T::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(Persist::to_value)
            .collect::<Result<_>>()
            .map(Value::FrozenSet)
    }

    fn from_value(value: Value) -> Result<Self> {
        set_items(value, "frozenset")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

fn tuple_items(value: Value, len: usize) -> Result<Vec<Value>> {
    match value {
        Value::Tuple(items) | Value::List(items) if items.len() == len => Ok(items),
        Value::Tuple(_) | Value::List(_) => Err(PersistenceError::mismatch(
            "tuple of declared length",
            "tuple of another length",
        )),
        other => Err(PersistenceError::mismatch("tuple", other.kind())),
    }
}

macro_rules! persist_tuple {
    ($len:expr => $($name:ident : $index:tt),+) => {
        impl<$($name: Persist),+> Persist for ($($name,)+) {
            fn shape() -> Shape {
                Shape::Tuple(vec![$($name::shape()),+])
            }

            fn to_value(&self) -> Result<Value> {
                Ok(Value::Tuple(vec![$(self.$index.to_value()?),+]))
            }

            fn from_value(value: Value) -> Result<Self> {
                let mut items = tuple_items(value, $len)?.into_iter();
                Ok(($(
                    $name::from_value(items.next().unwrap_or(Value::Null))?,
                )+))
            }
        }
    };
}

persist_tuple!(1 => A: 0);
persist_tuple!(2 => A: 0, B: 1);
persist_tuple!(3 => A: 0, B: 1, C: 2);
persist_tuple!(4 => A: 0, B: 1, C: 2, D: 3);
persist_tuple!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
persist_tuple!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
persist_tuple!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
persist_tuple!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

fn dict_entries(value: Value) -> Result<Vec<(Key, Value)>> {
    match value {
        Value::Dict(entries) => Ok(entries),
        other => Err(PersistenceError::mismatch("dict", other.kind())),
    }
}

impl<K: PersistKey + Eq + Hash, V: Persist> Persist for HashMap<K, V> {
    fn shape() -> Shape {
        Shape::Dict(Box::new(K::key_shape()), Box::new(V::shape()))
    }

    // Sorted by key text so that saves of the same state are identical
    fn to_value(&self) -> Result<Value> {
        let mut entries = self
            .iter()
            .map(|(k, v)| Ok((k.to_key()?, v.to_value()?)))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|(a, _), (b, _)| a.as_text().cmp(b.as_text()));
        Ok(Value::Dict(entries))
    }

    fn from_value(value: Value) -> Result<Self> {
        dict_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: PersistKey + Ord, V: Persist> Persist for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Dict(Box::new(K::key_shape()), Box::new(V::shape()))
    }

    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(|(k, v)| Ok((k.to_key()?, v.to_value()?)))
            .collect::<Result<_>>()
            .map(Value::Dict)
    }

    fn from_value(value: Value) -> Result<Self> {
        dict_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bounds_are_checked() {
        assert_eq!(7u8.to_value().unwrap(), Value::Int(7));
        assert!(matches!(
            u8::from_value(Value::Int(300)),
            Err(PersistenceError::IntegerOverflow(_))
        ));
        assert!(matches!(
            u64::MAX.to_value(),
            Err(PersistenceError::IntegerOverflow(_))
        ));
    }

    #[test]
    fn test_float_accepts_whole_numbers() {
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert_eq!(f32::from_value(Value::Float(0.5)).unwrap(), 0.5);
        assert!(f64::from_value(Value::Str("x".into())).is_err());
    }

    #[test]
    fn test_option_maps_to_null() {
        let none: Option<i32> = None;
        assert_eq!(none.to_value().unwrap(), Value::Null);
        assert_eq!(Some(4).to_value().unwrap(), Value::Int(4));
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert!(matches!(Option::<String>::shape(), Shape::Optional(_)));
    }

    #[test]
    fn test_tuple_length_is_enforced() {
        let pair = (5i32, 10i32);
        let value = pair.to_value().unwrap();
        assert_eq!(value, Value::Tuple(vec![Value::Int(5), Value::Int(10)]));
        assert_eq!(<(i32, i32)>::from_value(value).unwrap(), (5, 10));
        assert!(<(i32, i32)>::from_value(Value::Tuple(vec![Value::Int(1)])).is_err());
    }

    #[test]
    fn test_single_and_wide_tuples() {
        let single = (7i32,);
        let value = single.to_value().unwrap();
        assert_eq!(value, Value::Tuple(vec![Value::Int(7)]));
        assert_eq!(<(i32,)>::from_value(value).unwrap(), single);

        let wide = (1i32, "two".to_string(), 3.5f64, true, None::<i32>, 6u8);
        let value = wide.to_value().unwrap();
        assert!(matches!(&value, Value::Tuple(items) if items.len() == 6));
        assert_eq!(
            <(i32, String, f64, bool, Option<i32>, u8)>::from_value(value).unwrap(),
            wide
        );

        let shape = <(i32, i32, i32, i32, i32, i32, i32, i32)>::shape();
        assert!(matches!(shape, Shape::Tuple(ref parts) if parts.len() == 8));
    }

    #[test]
    fn test_frozen_set_is_read_only_but_usable() {
        let ids: FrozenSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("y"));

        let value = ids.to_value().unwrap();
        assert!(matches!(value, Value::FrozenSet(_)));
        assert_eq!(FrozenSet::<String>::from_value(value).unwrap(), ids);
    }

    #[test]
    fn test_hash_map_entries_are_sorted() {
        let mut flags = HashMap::new();
        flags.insert("zeta".to_string(), true);
        flags.insert("alpha".to_string(), false);
        flags.insert("mid".to_string(), true);

        let Value::Dict(entries) = flags.to_value().unwrap() else {
            panic!("expected a dict");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_text()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_mismatch_names_both_kinds() {
        let err = Vec::<i32>::from_value(Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "expected list, found int");
    }
}
