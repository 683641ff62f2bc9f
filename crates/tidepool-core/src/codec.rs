//! Codecs for transformable attributes
//!
//! Attribute types the store has no native column for are persisted as
//! opaque bytes. A [`ValueCodec`] turns the in-memory [`Value`] into those
//! bytes and back. [`ArrayCodec`] handles ordered collections and
//! [`BincodeCodec`] takes any other value.

use crate::error::CodecError;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Encoder/decoder pair for one family of composite values
pub trait ValueCodec: Send + Sync + fmt::Debug {
    /// Stable name, recorded in the schema
    fn name(&self) -> &str;

    /// Encode a value into bytes
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes produced by [`encode`](Self::encode)
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Shared handle to a codec
pub type CodecRef = Arc<dyn ValueCodec>;

/// Codec for ordered collections (`Value::List`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayCodec;

impl ArrayCodec {
    pub const NAME: &'static str = "ArrayCodec";

    /// Shared instance
    pub fn shared() -> CodecRef {
        Arc::new(ArrayCodec)
    }
}

impl ValueCodec for ArrayCodec {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::List(items) => {
                bincode::serialize(items).map_err(|e| CodecError::Encode(e.to_string()))
            }
            other => Err(CodecError::Encode(format!(
                "expected list, got {}",
                other.kind()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let items: Vec<Value> =
            bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Value::List(items))
    }
}

/// Codec for any value, kept whole in bincode form
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub const NAME: &'static str = "BincodeCodec";

    /// Shared instance
    pub fn shared() -> CodecRef {
        Arc::new(BincodeCodec)
    }
}

impl ValueCodec for BincodeCodec {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
