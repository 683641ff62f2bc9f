//! Database store wrapper.

use crate::batch::WriteBatch;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::feed::{ChangeFeed, ChangeListener, RegistrationToken};
use crate::models::*;
use native_db::*;
use parking_lot::{Mutex, MutexGuard};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tidepool_core::{
    EntityDescriptor, FetchRequest, Model, ObjectId, Record, Schema, ValueMap,
};
use tracing::{debug, info, warn};

// Static models for the database
static MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut models = Models::new();
    models.define::<StoredRecord>().unwrap();
    models
});

/// What the live query engine needs from a store.
pub trait RecordStore: Send + Sync {
    /// Fetch records of one entity, filtered and sorted as requested.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>>;

    /// Call `listener` after every save that touches `entity`.
    fn register_change_listener(&self, entity: &str, listener: ChangeListener)
        -> RegistrationToken;

    /// Remove a listener. Safe to call more than once.
    fn deregister(&self, token: RegistrationToken);
}

/// Record store over native_db.
///
/// The schema is fixed when the store is opened. All reads and writes run
/// one at a time on the store's execution context.
pub struct Store {
    pub(crate) db: Database<'static>,
    schema: Schema,
    feed: ChangeFeed,
    context: Mutex<()>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the store described by `config`.
    pub fn open(config: &StoreConfig, schema: Schema) -> Result<Self> {
        config.validate()?;
        if config.in_memory {
            return Self::in_memory(schema);
        }

        let path = config.store_path();
        let open_error = |message: String| Error::StoreOpen {
            path: path.clone(),
            message,
        };
        fs::create_dir_all(config.data_dir()).map_err(|e| open_error(e.to_string()))?;
        let db = Builder::new()
            .create(&MODELS, &path)
            .map_err(|e| open_error(e.to_string()))?;

        info!(
            target: "tidepool::store",
            path = %path.display(),
            entities = schema.len(),
            "opened store"
        );
        Ok(Self::with_database(db, schema, Some(path)))
    }

    /// Open the store file at `path` directly.
    pub fn open_path(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let path = path.as_ref();
        let db = Builder::new()
            .create(&MODELS, path)
            .map_err(|e| Error::StoreOpen {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::with_database(db, schema, Some(path.to_path_buf())))
    }

    /// Create an in-memory store.
    pub fn in_memory(schema: Schema) -> Result<Self> {
        let db = Builder::new()
            .create_in_memory(&MODELS)
            .map_err(|e| Error::StoreOpen {
                path: PathBuf::from(":memory:"),
                message: e.to_string(),
            })?;
        debug!(target: "tidepool::store", entities = schema.len(), "opened in-memory store");
        Ok(Self::with_database(db, schema, None))
    }

    fn with_database(db: Database<'static>, schema: Schema, path: Option<PathBuf>) -> Self {
        Self {
            db,
            schema,
            feed: ChangeFeed::new(),
            context: Mutex::new(()),
            path,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Store file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of registered change listeners.
    pub fn listener_count(&self) -> usize {
        self.feed.len()
    }

    pub(crate) fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Enter the store's execution context.
    pub(crate) fn enter(&self) -> MutexGuard<'_, ()> {
        self.context.lock()
    }

    pub(crate) fn entity(&self, name: &str) -> Result<&Arc<EntityDescriptor>> {
        self.schema
            .entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Start a batch of writes, committed together by [`WriteBatch::save`].
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch::new(self)
    }

    /// Insert a record and save.
    pub fn insert(&self, entity: &str, values: ValueMap) -> Result<ObjectId> {
        let mut batch = self.batch();
        let id = batch.insert(entity, values);
        batch.save()?;
        Ok(id)
    }

    /// Insert a model instance and save.
    pub fn insert_model<M: Model>(&self, model: &M) -> Result<ObjectId> {
        let mut batch = self.batch();
        let id = batch.insert_model(model);
        batch.save()?;
        Ok(id)
    }

    /// Merge `patch` into an existing record and save.
    pub fn update(&self, id: ObjectId, patch: ValueMap) -> Result<()> {
        let mut batch = self.batch();
        batch.update(id, patch);
        batch.save()?;
        Ok(())
    }

    /// Delete a record and save. Deleting a missing record does nothing.
    pub fn delete(&self, id: ObjectId) -> Result<()> {
        let mut batch = self.batch();
        batch.delete(id);
        batch.save()?;
        Ok(())
    }

    /// Load a record by ID.
    pub fn get(&self, id: ObjectId) -> Result<Option<Record>> {
        let _context = self.enter();
        let r = self.db.r_transaction()?;
        let stored: Option<StoredRecord> = r.get().primary(id.to_key())?;
        match stored {
            Some(stored) => {
                let record = stored.to_record()?;
                let entity = self.entity(&record.entity)?;
                Ok(Some(decode_record(entity, record)))
            }
            None => Ok(None),
        }
    }

    /// Fetch records of `entity` accepted by `filter`, unordered.
    pub fn fetch_where(
        &self,
        entity: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Result<Vec<Record>> {
        let mut records = self.fetch_records(&FetchRequest::new(entity))?;
        records.retain(|r| filter(r));
        Ok(records)
    }

    /// Count records matching a request.
    pub fn count(&self, request: &FetchRequest) -> Result<usize> {
        Ok(self.fetch_records(request)?.len())
    }

    fn fetch_records(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let entity = self.entity(&request.entity)?;
        let stored = {
            let _context = self.enter();
            self.scan_entity(entity.name())
                .map_err(|e| Error::Fetch(e.to_string()))?
        };

        let mut records = Vec::with_capacity(stored.len());
        for stored in stored {
            match stored.to_record() {
                Ok(record) => {
                    let record = decode_record(entity, record);
                    if request.matches(&record.values) {
                        records.push(record);
                    }
                }
                Err(e) => warn!(
                    target: "tidepool::store",
                    entity = entity.name(),
                    object_id = %stored.object_id,
                    error = %e,
                    "skipping unreadable record"
                ),
            }
        }
        request.sort(&mut records);

        debug!(
            target: "tidepool::store",
            entity = entity.name(),
            count = records.len(),
            "fetched records"
        );
        Ok(records)
    }

    fn scan_entity(&self, entity: &str) -> Result<Vec<StoredRecord>> {
        let r = self.db.r_transaction()?;
        let scan = r.scan().secondary::<StoredRecord>(StoredRecordKey::entity)?;
        let iter = scan.start_with(entity)?;
        let stored: std::result::Result<Vec<StoredRecord>, _> = iter.collect();
        let stored = stored.map_err(|e| Error::Database(e.to_string()))?;
        // start_with is a prefix match; "Note" would also find "Notebook"
        Ok(stored.into_iter().filter(|s| s.entity == entity).collect())
    }
}

impl RecordStore for Store {
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        self.fetch_records(request)
    }

    fn register_change_listener(
        &self,
        entity: &str,
        listener: ChangeListener,
    ) -> RegistrationToken {
        self.feed.register(entity, listener)
    }

    fn deregister(&self, token: RegistrationToken) {
        self.feed.deregister(token);
    }
}

/// Write `values` into `target` in storage form.
///
/// Undeclared keys are dropped. Transformable values go through their codec;
/// a value the codec rejects is removed from `target` instead of failing the
/// write.
pub(crate) fn encode_values(entity: &EntityDescriptor, values: ValueMap, target: &mut ValueMap) {
    for (name, value) in values {
        let Some(attribute) = entity.attribute(&name) else {
            debug!(
                target: "tidepool::store",
                entity = entity.name(),
                attribute = %name,
                "dropping undeclared attribute"
            );
            continue;
        };
        match attribute.encode(value) {
            Ok(stored) => {
                target.insert(name, stored);
            }
            Err(e) => {
                warn!(
                    target: "tidepool::store",
                    entity = entity.name(),
                    attribute = %name,
                    error = %e,
                    "codec failed, storing attribute as absent"
                );
                target.shift_remove(&name);
            }
        }
    }
}

/// Turn a record read from storage back into in-memory form.
///
/// Transformable values that fail to decode are left out.
pub(crate) fn decode_record(entity: &EntityDescriptor, mut record: Record) -> Record {
    let mut values = ValueMap::with_capacity(record.values.len());
    for (name, value) in std::mem::take(&mut record.values) {
        let decoded = match entity.attribute(&name) {
            Some(attribute) => attribute.decode(value),
            None => Ok(value),
        };
        match decoded {
            Ok(value) => {
                values.insert(name, value);
            }
            Err(e) => warn!(
                target: "tidepool::store",
                entity = entity.name(),
                attribute = %name,
                error = %e,
                "codec failed, reading attribute as absent"
            ),
        }
    }
    record.values = values;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tidepool_core::{field, model, Filter, Predicate, Query, SortKey, Value};
    use uuid::Uuid;

    model! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Note {
            pub id: Uuid,
            pub title: String,
            pub tags: Vec<String>,
        }
    }

    model! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Notebook {
            pub id: Uuid,
            pub name: String,
        }
    }

    fn schema() -> Schema {
        Schema::new().with::<Note>().with::<Notebook>()
    }

    fn note(title: &str, tags: &[&str]) -> Note {
        Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn titles(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.get("title").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_insert_and_get() {
        let store = Store::in_memory(schema()).unwrap();
        let original = note("groceries", &["home", "weekly"]);
        let id = store.insert_model(&original).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.entity, "Note");
        assert_eq!(Note::from_values(&record.values), Some(original));
        assert!(store.get(ObjectId::new()).unwrap().is_none());
    }

    #[test]
    fn test_transformable_stored_as_bytes() {
        let store = Store::in_memory(schema()).unwrap();
        let id = store.insert_model(&note("a", &["x"])).unwrap();

        let r = store.db.r_transaction().unwrap();
        let stored: StoredRecord = r.get().primary(id.to_key()).unwrap().unwrap();
        let raw = stored.to_record().unwrap();
        assert!(matches!(raw.get("tags"), Some(Value::Bytes(_))));
        assert!(matches!(raw.get("title"), Some(Value::String(_))));
    }

    #[test]
    fn test_round_trip_by_identifier() {
        let store = Store::in_memory(schema()).unwrap();
        let wanted = note("second", &["b"]);
        store.insert_model(&note("first", &["a"])).unwrap();
        store.insert_model(&wanted).unwrap();
        store.insert_model(&note("third", &[])).unwrap();

        let query = Query::<Note>::all().filter(Predicate::equal(field!(Note.id), wanted.id));
        let records = store.fetch(&query.fetch_request()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(Note::from_values(&records[0].values), Some(wanted));
    }

    #[test]
    fn test_fetch_sorted() {
        let store = Store::in_memory(schema()).unwrap();
        for title in ["b", "a", "c"] {
            store.insert_model(&note(title, &[])).unwrap();
        }
        let query = Query::<Note>::all().sort_by(SortKey::ascending(field!(Note.title)));
        let records = store.fetch(&query.fetch_request()).unwrap();
        assert_eq!(titles(&records), ["a", "b", "c"]);

        let query = Query::<Note>::all().sort_by(SortKey::descending(field!(Note.title)));
        let records = store.fetch(&query.fetch_request()).unwrap();
        assert_eq!(titles(&records), ["c", "b", "a"]);
    }

    #[test]
    fn test_fetch_scoped_to_exact_entity() {
        let store = Store::in_memory(schema()).unwrap();
        store.insert_model(&note("only note", &[])).unwrap();
        store
            .insert_model(&Notebook {
                id: Uuid::new_v4(),
                name: "work".into(),
            })
            .unwrap();

        assert_eq!(store.count(&FetchRequest::new("Note")).unwrap(), 1);
        assert_eq!(store.count(&FetchRequest::new("Notebook")).unwrap(), 1);
    }

    #[test]
    fn test_unknown_entity() {
        let store = Store::in_memory(schema()).unwrap();
        assert!(matches!(
            store.fetch(&FetchRequest::new("Ghost")),
            Err(Error::UnknownEntity(name)) if name == "Ghost"
        ));
        assert!(matches!(
            store.insert("Ghost", ValueMap::new()),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_update_merges_and_drops_undeclared() {
        let store = Store::in_memory(schema()).unwrap();
        let id = store.insert_model(&note("draft", &["x"])).unwrap();

        let mut patch = ValueMap::new();
        patch.insert("title".into(), Value::from("final"));
        patch.insert("colour".into(), Value::from("red"));
        store.update(id, patch).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.get("title"), Some(&Value::from("final")));
        assert_eq!(
            record.get("tags"),
            Some(&Value::List(vec![Value::from("x")]))
        );
        assert!(record.get("colour").is_none());

        assert!(matches!(
            store.update(ObjectId::new(), ValueMap::new()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_codec_failure_degrades_to_absent() {
        let store = Store::in_memory(schema()).unwrap();
        let mut values = Note::to_values(&note("bad tags", &[]));
        values.insert("tags".into(), Value::from("not a list"));
        let id = store.insert("Note", values).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert!(record.get("tags").is_none());
        assert_eq!(record.get("title"), Some(&Value::from("bad tags")));

        let typed = store.get_model::<Note>(id).unwrap().unwrap();
        assert_eq!(typed.title, "bad tags");
        assert!(typed.tags.is_empty());
    }

    #[test]
    fn test_undecodable_blob_reads_as_absent() {
        let store = Store::in_memory(schema()).unwrap();
        let mut values = Note::to_values(&note("corrupt", &[]));
        values.insert("tags".into(), Value::Bytes(vec![0xff; 3]));
        let record = Record {
            id: ObjectId::new(),
            entity: "Note".to_string(),
            values,
        };
        let rw = store.db.rw_transaction().unwrap();
        rw.insert(StoredRecord::from_record(&record).unwrap()).unwrap();
        rw.commit().unwrap();

        let loaded = store.get(record.id).unwrap().unwrap();
        assert!(loaded.get("tags").is_none());
        let typed = store.get_model::<Note>(record.id).unwrap().unwrap();
        assert_eq!(typed.title, "corrupt");
        assert!(typed.tags.is_empty());
    }

    #[test]
    fn test_map_attribute_round_trip() {
        model! {
            #[derive(Debug, Clone, PartialEq)]
            pub struct Doc {
                pub id: Uuid,
                pub meta: ValueMap,
            }
        }

        let store = Store::in_memory(Schema::new().with::<Doc>()).unwrap();
        let mut meta = ValueMap::new();
        meta.insert("pinned".into(), Value::Bool(true));
        meta.insert("labels".into(), Value::List(vec![Value::from("a")]));
        let doc = Doc {
            id: Uuid::new_v4(),
            meta,
        };
        let id = store.insert_model(&doc).unwrap();

        let r = store.db.r_transaction().unwrap();
        let stored: StoredRecord = r.get().primary(id.to_key()).unwrap().unwrap();
        assert!(matches!(stored.to_record().unwrap().get("meta"), Some(Value::Bytes(_))));
        assert_eq!(store.get_model::<Doc>(id).unwrap(), Some(doc));
    }

    #[test]
    fn test_delete_and_fetch_where() {
        let store = Store::in_memory(schema()).unwrap();
        let keep = store.insert_model(&note("keep", &[])).unwrap();
        let drop = store.insert_model(&note("drop", &[])).unwrap();
        store.delete(drop).unwrap();
        store.delete(drop).unwrap();

        let records = store
            .fetch_where("Note", |r| r.get("title").and_then(Value::as_str) == Some("keep"))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, keep);
    }

    #[test]
    fn test_change_listener_per_save() {
        let store = Store::in_memory(schema()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let token = store.register_change_listener(
            "Note",
            Arc::new(move |event: &ChangeEvent| {
                assert_eq!(event.entity, "Note");
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut batch = store.batch();
        batch.insert_model(&note("a", &[]));
        batch.insert_model(&note("b", &[]));
        batch.save().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store
            .insert_model(&Notebook {
                id: Uuid::new_v4(),
                name: "other".into(),
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.deregister(token);
        store.deregister(token);
        store.insert_model(&note("c", &[])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_raw_filter_fetch() {
        let store = Store::in_memory(schema()).unwrap();
        store.insert_model(&note("x", &[])).unwrap();
        let request = FetchRequest::new("Note").with_filter(Filter::equal("title", "x"));
        assert_eq!(store.fetch(&request).unwrap().len(), 1);
        let request = FetchRequest::new("Note").with_filter(Filter::equal("title", "y"));
        assert!(store.fetch(&request).unwrap().is_empty());
    }

    #[test]
    fn test_open_on_disk_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::named("notes").with_directory(dir.path().join("nested"));
        let original = note("persisted", &["disk"]);

        {
            let store = Store::open(&config, schema()).unwrap();
            assert_eq!(store.path(), Some(config.store_path().as_path()));
            store.insert_model(&original).unwrap();
        }

        let store = Store::open(&config, schema()).unwrap();
        let records = store.fetch(&FetchRequest::new("Note")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(Note::from_values(&records[0].values), Some(original));
    }

    #[test]
    fn test_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let config = StoreConfig::default().with_directory(blocker.join("sub"));

        let err = Store::open(&config, schema()).err().unwrap();
        assert!(matches!(err, Error::StoreOpen { .. }));
    }
}
