//! Repository over a live query.
//!
//! Keeps an always-current list of models for one query and offers
//! create/update/delete by the model's own identifier. Writes go through the
//! store and come back through the live query, so `items` catches up shortly
//! after each write rather than synchronously.

use crate::error::Result;
use crate::live::QueryEngine;
use crate::store::{RecordStore, Store};
use std::sync::Arc;
use tidepool_core::{Identifiable, Model, ObjectId, Predicate, Query, Record};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Live, identifier-addressed collection of one model type.
pub struct Repository<M: Identifiable> {
    store: Arc<Store>,
    items: watch::Receiver<Arc<Vec<M>>>,
    feed: JoinHandle<()>,
}

impl<M: Identifiable> Repository<M> {
    /// Repository over every record of `M`.
    pub fn all(store: Arc<Store>) -> Self {
        Self::new(store, Query::all())
    }

    /// Repository over the records selected by `query`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(store: Arc<Store>, query: Query<M>) -> Self {
        let engine = QueryEngine::new(store.clone());
        let mut subscription = engine.subscribe(query);
        subscription.request_unlimited();

        let (tx, items) = watch::channel(Arc::new(Vec::new()));
        let feed = tokio::spawn(async move {
            while let Some(result) = subscription.recv().await {
                let snapshot = match result {
                    Ok(models) => models,
                    Err(e) => {
                        warn!(
                            target: "tidepool::repository",
                            entity = M::entity_name(),
                            error = %e,
                            "live query failed, clearing items"
                        );
                        Vec::new()
                    }
                };
                tx.send_replace(Arc::new(snapshot));
            }
        });

        Self { store, items, feed }
    }

    /// Current items.
    pub fn items(&self) -> Arc<Vec<M>> {
        self.items.borrow().clone()
    }

    /// Receiver that sees every published item list.
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<M>>> {
        self.items.clone()
    }

    /// Wait for the next published list. `None` once the live query ended.
    pub async fn changed(&mut self) -> Option<Arc<Vec<M>>> {
        self.items.changed().await.ok()?;
        Some(self.items.borrow_and_update().clone())
    }

    pub fn item_by_id(&self, id: &M::Id) -> Option<M>
    where
        M: Clone,
    {
        self.items.borrow().iter().find(|m| m.id() == *id).cloned()
    }

    /// Insert `item` and save.
    pub fn add_item(&self, item: &M) -> Result<ObjectId> {
        self.store.insert_model(item)
    }

    /// Apply `setter` to every stored item with this identifier and save.
    ///
    /// Returns how many records were updated.
    pub fn update_item_by_id(&self, id: M::Id, mut setter: impl FnMut(&mut M)) -> Result<usize> {
        let records = self.records_by_id(id)?;
        let mut batch = self.store.batch();
        let mut updated = 0;
        for record in records {
            if let Some(mut model) = M::from_values(&record.values) {
                setter(&mut model);
                batch.replace_model(record.id, &model);
                updated += 1;
            }
        }
        batch.save()?;
        Ok(updated)
    }

    /// Delete every stored item with this identifier and save.
    ///
    /// Returns how many records were deleted.
    pub fn delete_item_by_id(&self, id: M::Id) -> Result<usize> {
        let records = self.records_by_id(id)?;
        let mut batch = self.store.batch();
        for record in &records {
            batch.delete(record.id);
        }
        batch.save()?;
        Ok(records.len())
    }

    fn records_by_id(&self, id: M::Id) -> Result<Vec<Record>> {
        let query = Query::<M>::all().filter(Predicate::equal(M::id_field(), id));
        self.store.fetch(&query.fetch_request())
    }
}

impl<M: Identifiable> Drop for Repository<M> {
    fn drop(&mut self) {
        // dropping the task drops its subscription, which deregisters it
        self.feed.abort();
    }
}
