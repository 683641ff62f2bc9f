//! Record model for database storage.

use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};
use tidepool_core::{ObjectId, Record, ValueMap};

use crate::error::{Error, Result};

/// Stored record of any entity.
///
/// Every entity shares this one table; the secondary key on `entity` scopes
/// scans to a single entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct StoredRecord {
    /// Primary key - object ID.
    #[primary_key]
    pub object_id: String,
    /// Entity name.
    #[secondary_key]
    pub entity: String,
    /// Serialized attribute values.
    pub data: Vec<u8>,
}

impl StoredRecord {
    /// Create from a record whose values are already in storage form.
    pub fn from_record(record: &Record) -> Result<Self> {
        let data = bincode::serialize(&record.values)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self {
            object_id: record.id.to_key(),
            entity: record.entity.clone(),
            data,
        })
    }

    /// Convert to a record with values in storage form.
    pub fn to_record(&self) -> Result<Record> {
        let id: ObjectId = self
            .object_id
            .parse()
            .map_err(|_| Error::Serialization(format!("invalid object id {}", self.object_id)))?;
        let values: ValueMap =
            bincode::deserialize(&self.data).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Record {
            id,
            entity: self.entity.clone(),
            values,
        })
    }
}
