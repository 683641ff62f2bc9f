//! Type tag to storage type mapping
//!
//! The mapper is total: a tag it does not recognise becomes a transformable
//! attribute instead of an error, so models can grow new field types without
//! touching this table. Composite types get the codec registered for their
//! base name, or the default codec. Out of the box `Vec` and `VecDeque` use
//! [`ArrayCodec`] and everything else [`BincodeCodec`].

use super::attribute::{AttributeType, TypeMapping};
use crate::codec::{ArrayCodec, BincodeCodec, CodecRef};
use crate::model::type_base_name;
use indexmap::IndexMap;

/// Maps runtime type tags to storage types
#[derive(Debug, Clone)]
pub struct TypeMapper {
    default_codec: CodecRef,
    codecs: IndexMap<String, CodecRef>,
}

impl TypeMapper {
    /// Mapper with [`ArrayCodec`] for ordered collections and
    /// [`BincodeCodec`] as the fallback codec
    pub fn new() -> Self {
        let array = ArrayCodec::shared();
        let mut codecs = IndexMap::new();
        codecs.insert("Vec".to_string(), array.clone());
        codecs.insert("VecDeque".to_string(), array);
        Self {
            default_codec: BincodeCodec::shared(),
            codecs,
        }
    }

    /// Replace the fallback codec
    pub fn with_default_codec(mut self, codec: CodecRef) -> Self {
        self.default_codec = codec;
        self
    }

    /// Use `codec` for unrecognised types whose base name is `base_name`
    /// (e.g. `"HashMap"`)
    pub fn with_codec(mut self, base_name: impl Into<String>, codec: CodecRef) -> Self {
        self.codecs.insert(base_name.into(), codec);
        self
    }

    /// Map a type tag
    pub fn map(&self, type_tag: &str) -> TypeMapping {
        let tag = type_tag.trim();
        let base = type_base_name(tag);
        let native = match base {
            "i8" | "i16" => Some(AttributeType::Int16),
            "u16" | "i32" => Some(AttributeType::Int32),
            "u32" | "i64" => Some(AttributeType::Int64),
            "f32" => Some(AttributeType::Float),
            "f64" => Some(AttributeType::Double),
            "bool" => Some(AttributeType::Bool),
            "String" | "str" => Some(AttributeType::String),
            "Uuid" => Some(AttributeType::Uuid),
            "DateTime" | "NaiveDateTime" | "SystemTime" => Some(AttributeType::Date),
            "Uri" | "Url" | "PathBuf" => Some(AttributeType::Uri),
            "Vec" if generic_argument(tag).map(type_base_name) == Some("u8") => {
                Some(AttributeType::Binary)
            }
            "Option" => {
                return match generic_argument(tag) {
                    Some(inner) => self.map(inner),
                    None => self.fallback(base),
                }
            }
            _ => None,
        };

        match native {
            Some(attribute_type) => TypeMapping::native(attribute_type),
            None => self.fallback(base),
        }
    }

    fn fallback(&self, base: &str) -> TypeMapping {
        let codec = self
            .codecs
            .get(base)
            .cloned()
            .unwrap_or_else(|| self.default_codec.clone());
        TypeMapping::transformable(codec)
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a type tag with the default mapper
pub fn map_type_tag(type_tag: &str) -> TypeMapping {
    TypeMapper::new().map(type_tag)
}

/// Text between the outermost angle brackets
fn generic_argument(tag: &str) -> Option<&str> {
    let start = tag.find('<')?;
    let end = tag.rfind('>')?;
    (end > start + 1).then(|| tag[start + 1..end].trim())
}
