//! Batched writes.

use crate::error::{Error, Result};
use crate::feed::ChangeEvent;
use crate::models::StoredRecord;
use crate::store::{encode_values, Store};
use indexmap::IndexMap;
use tidepool_core::{Model, ObjectId, Record, ValueMap};
use tracing::debug;

enum WriteOp {
    Insert(Record),
    Update { id: ObjectId, patch: ValueMap },
    Replace { id: ObjectId, values: ValueMap },
    Delete(ObjectId),
}

/// Writes queued against a store and committed together.
///
/// Nothing touches the store until [`save`](Self::save). A save runs in a
/// single transaction and then notifies each touched entity's listeners
/// exactly once.
pub struct WriteBatch<'a> {
    store: &'a Store,
    ops: Vec<WriteOp>,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    /// Queue a new record; its ID is assigned now.
    pub fn insert(&mut self, entity: impl Into<String>, values: ValueMap) -> ObjectId {
        let record = Record::with_values(entity, values);
        let id = record.id;
        self.ops.push(WriteOp::Insert(record));
        id
    }

    pub fn insert_model<M: Model>(&mut self, model: &M) -> ObjectId {
        self.insert(M::entity_name(), model.to_values())
    }

    /// Queue a merge of `patch` into an existing record.
    pub fn update(&mut self, id: ObjectId, patch: ValueMap) -> &mut Self {
        self.ops.push(WriteOp::Update { id, patch });
        self
    }

    /// Queue a full replacement of a record's values with `model`'s.
    pub fn replace_model<M: Model>(&mut self, id: ObjectId, model: &M) -> &mut Self {
        self.ops.push(WriteOp::Replace {
            id,
            values: model.to_values(),
        });
        self
    }

    /// Queue a delete. Missing records are skipped at save time.
    pub fn delete(&mut self, id: ObjectId) -> &mut Self {
        self.ops.push(WriteOp::Delete(id));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit every queued write.
    ///
    /// On error nothing is committed and no listener is called. Returns the
    /// change events that were emitted, one per touched entity.
    pub fn save(self) -> Result<Vec<ChangeEvent>> {
        if self.ops.is_empty() {
            return Ok(Vec::new());
        }
        let store = self.store;

        let events = {
            let _context = store.enter();
            let rw = store.db.rw_transaction()?;
            let mut events: IndexMap<String, ChangeEvent> = IndexMap::new();

            for op in self.ops {
                match op {
                    WriteOp::Insert(record) => {
                        let entity = store.entity(&record.entity)?;
                        let mut values = ValueMap::new();
                        encode_values(entity, record.values, &mut values);
                        let stored = StoredRecord::from_record(&Record {
                            id: record.id,
                            entity: record.entity,
                            values,
                        })?;
                        rw.insert(stored)?;
                        event_for(&mut events, entity.name()).inserted.push(record.id);
                    }
                    WriteOp::Update { id, patch } => {
                        let existing: Option<StoredRecord> = rw.get().primary(id.to_key())?;
                        let existing = existing.ok_or_else(|| Error::NotFound(id.to_string()))?;
                        let mut record = existing.to_record()?;
                        let entity = store.entity(&record.entity)?;
                        encode_values(entity, patch, &mut record.values);
                        rw.update(existing, StoredRecord::from_record(&record)?)?;
                        event_for(&mut events, entity.name()).updated.push(id);
                    }
                    WriteOp::Replace { id, values } => {
                        let existing: Option<StoredRecord> = rw.get().primary(id.to_key())?;
                        let existing = existing.ok_or_else(|| Error::NotFound(id.to_string()))?;
                        let entity = store.entity(&existing.entity)?;
                        let mut encoded = ValueMap::new();
                        encode_values(entity, values, &mut encoded);
                        let record = Record {
                            id,
                            entity: existing.entity.clone(),
                            values: encoded,
                        };
                        rw.update(existing, StoredRecord::from_record(&record)?)?;
                        event_for(&mut events, entity.name()).updated.push(id);
                    }
                    WriteOp::Delete(id) => {
                        let existing: Option<StoredRecord> = rw.get().primary(id.to_key())?;
                        if let Some(existing) = existing {
                            let entity = existing.entity.clone();
                            rw.remove(existing)?;
                            event_for(&mut events, &entity).deleted.push(id);
                        }
                    }
                }
            }

            rw.commit()?;
            events
        };

        debug!(
            target: "tidepool::store",
            entities = events.len(),
            "saved batch"
        );
        for event in events.values() {
            store.feed().emit(event);
        }
        Ok(events.into_values().collect())
    }
}

fn event_for<'e>(events: &'e mut IndexMap<String, ChangeEvent>, entity: &str) -> &'e mut ChangeEvent {
    events
        .entry(entity.to_string())
        .or_insert_with(|| ChangeEvent::new(entity))
}

impl Store {
    /// Load a record by ID as a model instance.
    pub fn get_model<M: Model>(&self, id: ObjectId) -> Result<Option<M>> {
        Ok(self
            .get(id)?
            .filter(|r| r.entity == M::entity_name())
            .and_then(|r| M::from_values(&r.values)))
    }

    /// Replace a record's values with `model`'s and save.
    pub fn replace_model<M: Model>(&self, id: ObjectId, model: &M) -> Result<()> {
        let mut batch = self.batch();
        batch.replace_model(id, model);
        batch.save()?;
        Ok(())
    }
}
