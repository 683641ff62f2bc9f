//! Stored record type

use crate::{IntoValue, ObjectId, Value, ValueMap};
use serde::{Deserialize, Serialize};

/// A persisted row of some entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier
    pub id: ObjectId,
    /// Name of the entity this record belongs to
    pub entity: String,
    /// Attribute values keyed by attribute name
    pub values: ValueMap,
}

impl Record {
    /// Create an empty record with a fresh ID
    pub fn new(entity: impl Into<String>) -> Self {
        Self::with_values(entity, ValueMap::new())
    }

    /// Create a record with a fresh ID and the given values
    pub fn with_values(entity: impl Into<String>, values: ValueMap) -> Self {
        Self {
            id: ObjectId::new(),
            entity: entity.into(),
            values,
        }
    }

    /// Get an attribute value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set an attribute value
    pub fn set(&mut self, key: impl Into<String>, value: impl IntoValue) {
        self.values.insert(key.into(), value.into_value());
    }

    /// Remove an attribute value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }
}
