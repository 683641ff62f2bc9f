//! Query engine: turns queries into one-shot fetches or live subscriptions.

use crate::error::Result;
use crate::live::subscription::Subscription;
use crate::store::RecordStore;
use std::sync::Arc;
use tidepool_core::{Model, Query, Record};
use tracing::debug;

/// Runs typed queries against a record store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn RecordStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Start a live query.
    ///
    /// Nothing is fetched until the returned subscription is given demand.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<M: Model>(&self, query: Query<M>) -> Subscription<M> {
        let request = query.fetch_request();
        debug!(
            target: "tidepool::live",
            entity = %request.entity,
            "subscribing"
        );
        Subscription::spawn(Arc::clone(&self.store), request)
    }

    /// Run a query once.
    pub fn fetch<M: Model>(&self, query: &Query<M>) -> Result<Vec<M>> {
        let records = self.store.fetch(&query.fetch_request())?;
        Ok(materialize(records))
    }
}

/// Convert fetched records, leaving out the ones that don't fit `M`.
pub(crate) fn materialize<M: Model>(records: Vec<Record>) -> Vec<M> {
    let total = records.len();
    let models: Vec<M> = records
        .iter()
        .filter_map(|record| M::from_values(&record.values))
        .collect();
    if models.len() < total {
        debug!(
            target: "tidepool::live",
            entity = M::entity_name(),
            skipped = total - models.len(),
            "records did not convert"
        );
    }
    models
}
