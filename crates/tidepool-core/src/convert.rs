//! Conversions between model field types and [`Value`]
//!
//! `model!` relies on these traits to turn struct fields into a record's
//! [`ValueMap`](crate::ValueMap) and back. Implement both for a custom field
//! type to store it; the schema will map it to a transformable attribute.

use crate::value::{Uri, Value, ValueMap};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

/// Convert a field value into its stored representation
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Rebuild a field value from its stored representation
///
/// Returns `None` when the stored value has the wrong shape.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;

    /// Value to use when the attribute is missing or `Null`
    ///
    /// A transformable attribute whose codec failed reads as absent; the
    /// collection impls return an empty collection so the rest of the
    /// entity still loads. Scalars have no stand-in.
    fn from_absent() -> Option<Self> {
        None
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn from_absent() -> Option<Self> {
        Some(Value::Null)
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    value.as_int().and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

int_conversions!(i8, i16, i32, i64, u16, u32);

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float().map(|f| f as f32)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl IntoValue for Uuid {
    fn into_value(self) -> Value {
        Value::Uuid(self)
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_uuid()
    }
}

impl IntoValue for DateTime<Utc> {
    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_date()
    }
}

impl IntoValue for Uri {
    fn into_value(self) -> Value {
        Value::Uri(self.into_string())
    }
}

impl FromValue for Uri {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uri(u) => Some(Uri::new(u.clone())),
            _ => None,
        }
    }
}

impl IntoValue for PathBuf {
    fn into_value(self) -> Value {
        Value::Uri(self.to_string_lossy().into_owned())
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uri(u) => Some(PathBuf::from(u)),
            _ => None,
        }
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Bytes(self)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }

    fn from_absent() -> Option<Self> {
        Some(Vec::new())
    }
}

impl IntoValue for ValueMap {
    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl FromValue for ValueMap {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_map().cloned()
    }

    fn from_absent() -> Option<Self> {
        Some(ValueMap::new())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn from_absent() -> Option<Self> {
        Some(None)
    }
}
