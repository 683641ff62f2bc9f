//! Attribute values as stored in a record
//!
//! Every native attribute type has its own variant; transformable attributes
//! are held as [`Value::Bytes`] once their codec has run. Integers of every
//! width share `Int`, single and double precision share `Float`.

use crate::convert::IntoValue;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// Absent attribute
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Uuid(Uuid),
    Date(DateTime<Utc>),
    /// Binary data, and the encoded form of transformable attributes
    Bytes(Vec<u8>),
    Uri(String),
    List(Vec<Value>),
    Map(ValueMap),
}

/// Attribute name to value, in insertion order
pub type ValueMap = IndexMap<String, Value>;

/// Resource identifier stored as a URI attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Copy-out accessors: `as_x()` is `Some` only for the matching variant.
macro_rules! copy_accessors {
    ($($name:ident: $variant:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&self) -> Option<$ty> {
                match self {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        )*
    };
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    copy_accessors! {
        as_bool: Bool => bool,
        as_int: Int => i64,
        as_uuid: Uuid => Uuid,
        as_date: Date => DateTime<Utc>,
    }

    /// Float value; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short kind name, for diagnostics
    pub fn kind(&self) -> &'static str {
        self.kind_and_rank().0
    }

    fn kind_and_rank(&self) -> (&'static str, u8) {
        match self {
            Value::Null => ("null", 0),
            Value::Bool(_) => ("bool", 1),
            Value::Int(_) => ("int", 2),
            Value::Float(_) => ("float", 2),
            Value::String(_) => ("string", 3),
            Value::Uuid(_) => ("uuid", 4),
            Value::Date(_) => ("date", 5),
            Value::Bytes(_) => ("bytes", 6),
            Value::Uri(_) => ("uri", 7),
            Value::List(_) => ("list", 8),
            Value::Map(_) => ("map", 9),
        }
    }

    /// Total ordering used when sorting fetch results
    ///
    /// Null sorts first, integers and floats compare numerically, values of
    /// different kinds are ordered by kind. Maps never compare by content.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (self.as_float(), other.as_float());
                a.unwrap_or_default().total_cmp(&b.unwrap_or_default())
            }
            (Value::String(a), Value::String(b)) | (Value::Uri(a), Value::Uri(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.sort_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.kind_and_rank().1.cmp(&other.kind_and_rank().1),
        }
    }
}

fn write_joined<T>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    mut item: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    for (i, next) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item(f, next)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Uuid(id) => write!(f, "{id}"),
            Value::Date(d) => f.write_str(&d.to_rfc3339()),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uri(u) => write!(f, "<{u}>"),
            Value::List(items) => {
                f.write_str("[")?;
                write_joined(f, items, |f, v| write!(f, "{v}"))?;
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                write_joined(f, map, |f, (k, v)| write!(f, "{k}: {v}"))?;
                f.write_str("}")
            }
        }
    }
}

macro_rules! from_native {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.into_value()
                }
            }
        )*
    };
}

from_native!(bool, i32, i64, f64, String, &str, Uuid, DateTime<Utc>, Uri);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_variant() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(42).as_float(), Some(42.0));
        assert_eq!(Value::Float(2.5).as_int(), None);
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Value::from(Uri::new("a:b")), Value::Uri("a:b".into()));
        assert_eq!(Value::Bytes(Vec::new()).kind(), "bytes");
    }

    #[test]
    fn test_sort_cmp_numbers_and_kinds() {
        assert_eq!(Value::Int(1).sort_cmp(&Value::Float(1.5)), Ordering::Less);
        assert_eq!(Value::Float(2.0).sort_cmp(&Value::Int(2)), Ordering::Equal);
        assert_eq!(Value::Null.sort_cmp(&Value::Int(-5)), Ordering::Less);
        assert_eq!(
            Value::from("b").sort_cmp(&Value::from("a")),
            Ordering::Greater
        );
        assert_eq!(
            Value::String("z".into()).sort_cmp(&Value::Int(0)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_sort_cmp_lists() {
        let short = Value::List(vec![Value::Int(1)]);
        let long = Value::List(vec![Value::Int(1), Value::Int(0)]);
        let bigger = Value::List(vec![Value::Int(2)]);
        assert_eq!(short.sort_cmp(&long), Ordering::Less);
        assert_eq!(bigger.sort_cmp(&long), Ordering::Greater);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Bool(false)]).to_string(),
            "[1, false]"
        );
        assert_eq!(Value::Bytes(vec![0; 3]).to_string(), "<3 bytes>");
        let mut map = ValueMap::new();
        map.insert("k".into(), Value::Null);
        assert_eq!(Value::Map(map).to_string(), "{k: null}");
    }
}
