//! Attribute descriptors

use crate::codec::{BincodeCodec, CodecRef};
use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic storage type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Bool,
    String,
    Uuid,
    Date,
    Binary,
    Uri,
    /// Opaque bytes produced by a codec
    Transformable,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Int16 => "int16",
            AttributeType::Int32 => "int32",
            AttributeType::Int64 => "int64",
            AttributeType::Float => "float",
            AttributeType::Double => "double",
            AttributeType::Bool => "bool",
            AttributeType::String => "string",
            AttributeType::Uuid => "uuid",
            AttributeType::Date => "date",
            AttributeType::Binary => "binary",
            AttributeType::Uri => "uri",
            AttributeType::Transformable => "transformable",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type plus the codec it needs
///
/// A codec is present exactly when the type is
/// [`Transformable`](AttributeType::Transformable); the constructors are the
/// only way to build one.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    attribute_type: AttributeType,
    codec: Option<CodecRef>,
}

impl TypeMapping {
    /// Mapping to a natively stored type
    ///
    /// `Transformable` gets the general [`BincodeCodec`].
    pub fn native(attribute_type: AttributeType) -> Self {
        match attribute_type {
            AttributeType::Transformable => Self::transformable(BincodeCodec::shared()),
            _ => Self {
                attribute_type,
                codec: None,
            },
        }
    }

    /// Mapping to opaque bytes through `codec`
    pub fn transformable(codec: CodecRef) -> Self {
        Self {
            attribute_type: AttributeType::Transformable,
            codec: Some(codec),
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn codec(&self) -> Option<&CodecRef> {
        self.codec.as_ref()
    }

    pub fn is_transformable(&self) -> bool {
        self.codec.is_some()
    }
}

impl PartialEq for TypeMapping {
    fn eq(&self, other: &Self) -> bool {
        self.attribute_type == other.attribute_type
            && self.codec.as_ref().map(|c| c.name()) == other.codec.as_ref().map(|c| c.name())
    }
}

/// A named, typed attribute of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    name: String,
    mapping: TypeMapping,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, mapping: TypeMapping) -> Self {
        Self {
            name: name.into(),
            mapping,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.mapping.attribute_type()
    }

    pub fn codec(&self) -> Option<&CodecRef> {
        self.mapping.codec()
    }

    pub fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    /// Storage form of `value`
    ///
    /// Transformable values become `Bytes` through the codec; `Null` and
    /// native values pass through unchanged.
    pub fn encode(&self, value: Value) -> Result<Value> {
        match (self.codec(), value) {
            (Some(codec), value) if !value.is_null() => Ok(Value::Bytes(codec.encode(&value)?)),
            (_, value) => Ok(value),
        }
    }

    /// In-memory form of a stored value, undoing [`encode`](Self::encode)
    pub fn decode(&self, value: Value) -> Result<Value> {
        match (self.codec(), value) {
            (Some(codec), Value::Bytes(bytes)) => Ok(codec.decode(&bytes)?),
            (_, value) => Ok(value),
        }
    }
}

impl fmt::Display for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.codec() {
            Some(codec) => write!(f, "{}:{}({})", self.name, self.attribute_type(), codec.name()),
            None => write!(f, "{}:{}", self.name, self.attribute_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArrayCodec;
    use crate::error::{CodecError, Error};

    #[test]
    fn test_native_mapping_has_no_codec() {
        let mapping = TypeMapping::native(AttributeType::String);
        assert_eq!(mapping.attribute_type(), AttributeType::String);
        assert!(mapping.codec().is_none());
    }

    #[test]
    fn test_transformable_always_carries_codec() {
        let mapping = TypeMapping::native(AttributeType::Transformable);
        assert!(mapping.is_transformable());
        assert_eq!(mapping.codec().map(|c| c.name()), Some(BincodeCodec::NAME));
    }

    #[test]
    fn test_descriptor_display() {
        let tags = AttributeDescriptor::new("tags", TypeMapping::transformable(ArrayCodec::shared()));
        assert_eq!(tags.to_string(), "tags:transformable(ArrayCodec)");
        let id = AttributeDescriptor::new("id", TypeMapping::native(AttributeType::Uuid));
        assert_eq!(id.to_string(), "id:uuid");
    }

    #[test]
    fn test_encode_and_decode_through_codec() {
        let tags = AttributeDescriptor::new("tags", TypeMapping::transformable(ArrayCodec::shared()));
        let list = Value::List(vec![Value::from("a")]);
        let stored = tags.encode(list.clone()).unwrap();
        assert!(matches!(stored, Value::Bytes(_)));
        assert_eq!(tags.decode(stored).unwrap(), list);
        assert_eq!(tags.encode(Value::Null).unwrap(), Value::Null);

        let title = AttributeDescriptor::new("title", TypeMapping::native(AttributeType::String));
        assert_eq!(title.encode(Value::from("t")).unwrap(), Value::from("t"));
    }

    #[test]
    fn test_codec_failures_surface_as_codec_errors() {
        let tags = AttributeDescriptor::new("tags", TypeMapping::transformable(ArrayCodec::shared()));
        let err = tags.encode(Value::from("not a list")).unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::Encode(_))));
        let err = tags.decode(Value::Bytes(vec![0xff; 3])).unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::Decode(_))));
    }
}
