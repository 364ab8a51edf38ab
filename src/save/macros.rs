//! Registration macros for persistable enums, records and game states
//!
//! Each macro implements the conversion traits for an existing type and
//! gives it a stable tag (the type's name) that is written into saves.
//!
//! ```
//! use ludos::state::EngineFields;
//! use ludos::{persist_enum, persist_record, persist_state};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
//! enum Facing { North, South }
//! persist_enum!(Facing { North => "NORTH", South => "SOUTH" });
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Position { x: f64, y: f64 }
//! persist_record!(Position { x, y });
//!
//! #[derive(Debug, Default)]
//! struct Overworld { engine: EngineFields, pos: Position, facing: Option<Facing> }
//! persist_state!(Overworld { pos, facing });
//! ```

use super::saveable::Persist;
use super::types::{PersistenceError, Result};
use super::value::{RecordValue, Shape, Value};

/// Declared shape of a struct field, taken from an accessor closure
#[doc(hidden)]
pub fn field_shape<R, T: Persist>(_accessor: impl Fn(&R) -> &T) -> Shape {
    T::shape()
}

/// Unwraps a record value, checking its tag against the expected type
#[doc(hidden)]
pub fn record_fields(value: Value, type_name: &'static str) -> Result<RecordValue> {
    match value {
        Value::Record(record) if record.type_name == type_name => Ok(record),
        Value::Record(_) => Err(PersistenceError::mismatch(type_name, "record of another type")),
        other => Err(PersistenceError::mismatch(type_name, other.kind())),
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __persist_name {
    ($member:ident) => {
        stringify!($member)
    };
    ($member:ident, $name:literal) => {
        $name
    };
}

/// Implements persistence for a fieldless enum
///
/// Members are saved under their Rust name unless renamed with `=> "NAME"`.
#[macro_export]
macro_rules! persist_enum {
    ($ty:ident { $($member:ident $(=> $name:literal)?),+ $(,)? }) => {
        impl $crate::save::PersistEnum for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);
            const MEMBERS: &'static [&'static str] =
                &[$($crate::__persist_name!($member $(, $name)?)),+];

            fn member_name(&self) -> &'static str {
                match self {
                    $($ty::$member => $crate::__persist_name!($member $(, $name)?),)+
                }
            }

            fn from_member(name: &str) -> Option<Self> {
                $(
                    if name == $crate::__persist_name!($member $(, $name)?) {
                        return Some($ty::$member);
                    }
                )+
                None
            }
        }

        impl $crate::save::Persist for $ty {
            fn shape() -> $crate::save::Shape {
                $crate::save::Shape::Enum(<$ty as $crate::save::PersistEnum>::enum_schema())
            }

            fn to_value(&self) -> $crate::save::Result<$crate::save::Value> {
                Ok($crate::save::Value::Enum(
                    $crate::save::PersistEnum::to_enum_value(self),
                ))
            }

            fn from_value(value: $crate::save::Value) -> $crate::save::Result<Self> {
                match value {
                    $crate::save::Value::Enum(member) => {
                        <$ty as $crate::save::PersistEnum>::from_enum_value(member)
                    }
                    other => Err($crate::save::PersistenceError::mismatch(
                        stringify!($ty),
                        other.kind(),
                    )),
                }
            }
        }

        impl $crate::save::PersistKey for $ty {
            fn key_shape() -> $crate::save::Shape {
                <$ty as $crate::save::Persist>::shape()
            }

            fn to_key(&self) -> $crate::save::Result<$crate::save::Key> {
                Ok($crate::save::Key::Enum(
                    $crate::save::PersistEnum::to_enum_value(self),
                ))
            }

            fn from_key(key: $crate::save::Key) -> $crate::save::Result<Self> {
                match key {
                    $crate::save::Key::Enum(member) => {
                        <$ty as $crate::save::PersistEnum>::from_enum_value(member)
                    }
                    $crate::save::Key::Str(text) => {
                        <$ty as $crate::save::PersistEnum>::from_member(&text).ok_or(
                            $crate::save::PersistenceError::UnknownMember {
                                type_name: stringify!($ty).to_string(),
                                member: text,
                            },
                        )
                    }
                }
            }
        }
    };
}

/// Adds the engine field schemas when a record embeds `EngineFields`
#[doc(hidden)]
#[macro_export]
macro_rules! __persist_engine_schemas {
    ($fields:ident, $engine:ident) => {
        $fields.extend($crate::state::EngineFields::schemas());
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __persist_record {
    ($ty:ident, [$($engine:ident)?], { $($field:ident),* }) => {
        impl $crate::save::PersistRecord for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            #[allow(unused_mut)]
            fn record_schema() -> $crate::save::RecordSchema {
                let mut fields = Vec::new();
                $(
                    $crate::__persist_engine_schemas!(fields, $engine);
                )?
                $(
                    fields.push($crate::save::FieldSchema {
                        name: stringify!($field),
                        shape: $crate::save::field_shape(|r: &$ty| &r.$field),
                    });
                )*
                $crate::save::RecordSchema {
                    name: stringify!($ty),
                    type_id: ::std::any::TypeId::of::<$ty>(),
                    fields,
                }
            }
        }

        impl $crate::save::Persist for $ty {
            fn shape() -> $crate::save::Shape {
                $crate::save::Shape::Record($crate::save::RecordRef {
                    name: stringify!($ty),
                    schema: <$ty as $crate::save::PersistRecord>::record_schema,
                })
            }

            #[allow(unused_mut)]
            fn to_value(&self) -> $crate::save::Result<$crate::save::Value> {
                let mut record = $crate::save::RecordValue::new(stringify!($ty));
                $( self.$engine.write_into(&mut record)?; )?
                $(
                    record.push(
                        stringify!($field),
                        $crate::save::Persist::to_value(&self.$field)?,
                    );
                )*
                Ok($crate::save::Value::Record(record))
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(value: $crate::save::Value) -> $crate::save::Result<Self> {
                let mut record = $crate::save::record_fields(value, stringify!($ty))?;
                let mut out = <$ty as ::std::default::Default>::default();
                $( out.$engine = $crate::state::EngineFields::read_from(&mut record)?; )?
                $(
                    if let Some(value) = record.take(stringify!($field)) {
                        out.$field = $crate::save::Persist::from_value(value)?;
                    }
                )*
                Ok(out)
            }
        }
    };
}

/// Implements persistence for a struct with named fields
///
/// The struct must implement `Default`; fields absent from a save keep
/// their default value.
#[macro_export]
macro_rules! persist_record {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        $crate::__persist_record!($ty, [], { $($field),* });
    };
}

/// Implements persistence for a game state root
///
/// The struct must have an `engine: EngineFields` field. Its members are
/// written at the top level of the record next to the listed fields.
#[macro_export]
macro_rules! persist_state {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        $crate::__persist_record!($ty, [engine], { $($field),* });

        impl $crate::state::GameState for $ty {
            fn engine(&self) -> &$crate::state::EngineFields {
                &self.engine
            }

            fn engine_mut(&mut self) -> &mut $crate::state::EngineFields {
                &mut self.engine
            }
        }
    };
}
