//! Model types: the declared field table the schema is reflected from
//!
//! A model is a plain Rust struct plus a [`Model`] impl listing its fields in
//! declaration order together with a type tag for each. The [`model!`] macro
//! writes that impl from the struct definition; hand-written impls are fine
//! too and are how malformed tables get tested.
//!
//! ```
//! use tidepool_core::{field, model, Model};
//! use uuid::Uuid;
//!
//! model! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Note {
//!         pub id: Uuid,
//!         pub title: String,
//!         pub tags: Vec<String>,
//!     }
//! }
//!
//! assert_eq!(Note::entity_name(), "Note");
//! assert_eq!(Note::declared_fields().len(), 3);
//! assert_eq!(field!(Note.title).name(), "title");
//! ```

use crate::convert::IntoValue;
use crate::value::ValueMap;
use std::fmt;

/// A persistable type with a declared field table
pub trait Model: Sized + Send + Sync + 'static {
    /// Entity name used for storage; defaults to the type's own name
    fn entity_name() -> &'static str {
        type_base_name(std::any::type_name::<Self>())
    }

    /// Declared instance fields, in declaration order
    fn declared_fields() -> Vec<DeclaredField>;

    /// Convert into attribute values
    fn to_values(&self) -> ValueMap;

    /// Rebuild from attribute values, `None` if required values are missing
    fn from_values(values: &ValueMap) -> Option<Self>;
}

/// A model that carries its own identifier field
pub trait Identifiable: Model {
    type Id: IntoValue + PartialEq + Clone + Send + Sync + 'static;

    /// Accessor for the identifier field
    fn id_field() -> Field<Self, Self::Id>;

    /// Identifier of this instance
    fn id(&self) -> Self::Id {
        Self::id_field().get(self)
    }
}

/// One entry of a model's field table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclaredField {
    name: &'static str,
    type_tag: &'static str,
}

impl DeclaredField {
    /// Entry with an explicit type tag
    pub fn new(name: &'static str, type_tag: &'static str) -> Self {
        Self { name, type_tag }
    }

    /// Entry tagged with the Rust type name of `T`
    pub fn of<T: ?Sized>(name: &'static str) -> Self {
        Self::new(name, std::any::type_name::<T>())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }
}

/// Typed accessor for one field of a model
///
/// Built with [`field!`]; used to construct predicates and sort keys and to
/// read the field from an instance.
pub struct Field<M, V> {
    name: &'static str,
    get: fn(&M) -> V,
}

impl<M, V> Field<M, V> {
    pub fn new(name: &'static str, get: fn(&M) -> V) -> Self {
        Self { name, get }
    }

    /// Attribute name of the field
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read the field from a model instance
    pub fn get(&self, model: &M) -> V {
        (self.get)(model)
    }
}

impl<M, V> Clone for Field<M, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, V> Copy for Field<M, V> {}

impl<M, V> fmt::Debug for Field<M, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// Last path segment of a type name, without generic arguments
///
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec`, `&str` becomes `str`.
pub fn type_base_name(type_name: &str) -> &str {
    let outer = type_name.split('<').next().unwrap_or(type_name);
    let last = outer.rsplit("::").next().unwrap_or(outer);
    last.trim().trim_start_matches('&').trim_start_matches("mut ").trim()
}

/// Typed field accessor: `field!(Note.title)`
#[macro_export]
macro_rules! field {
    ($model:ident . $field:ident) => {
        $crate::Field::<$model, _>::new(stringify!($field), |model: &$model| {
            ::std::clone::Clone::clone(&model.$field)
        })
    };
}

/// Define a struct and its [`Model`] impl in one go
///
/// Field types must implement [`IntoValue`](crate::IntoValue),
/// [`FromValue`](crate::FromValue) and `Clone`. The field table keeps
/// declaration order and tags each field with its Rust type name.
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Model for $name {
            fn entity_name() -> &'static str {
                stringify!($name)
            }

            fn declared_fields() -> ::std::vec::Vec<$crate::DeclaredField> {
                ::std::vec![
                    $( $crate::DeclaredField::of::<$ty>(stringify!($field)), )*
                ]
            }

            fn to_values(&self) -> $crate::ValueMap {
                let mut values = $crate::ValueMap::new();
                $(
                    values.insert(
                        ::std::string::String::from(stringify!($field)),
                        $crate::IntoValue::into_value(::std::clone::Clone::clone(&self.$field)),
                    );
                )*
                values
            }

            fn from_values(values: &$crate::ValueMap) -> ::std::option::Option<Self> {
                ::std::option::Option::Some(Self {
                    $(
                        $field: match values.get(stringify!($field)) {
                            ::std::option::Option::Some(value) if !value.is_null() => {
                                <$ty as $crate::FromValue>::from_value(value)?
                            }
                            _ => <$ty as $crate::FromValue>::from_absent()?,
                        },
                    )*
                })
            }
        }
    };
}
