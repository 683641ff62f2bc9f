//! Tidepool DB - record store and live queries using native_db
//!
//! Provides:
//! - A schema-checked record store with batched, notifying writes
//! - A change feed keyed by entity name
//! - Live queries with demand-based delivery (`QueryEngine`, `Subscription`)
//! - An identifier-addressed `Repository` over a live query
//!
//! ```no_run
//! use std::sync::Arc;
//! use tidepool_core::{field, model, Query, Schema, SortKey};
//! use tidepool_db::{QueryEngine, Store, StoreConfig};
//! use uuid::Uuid;
//!
//! model! {
//!     #[derive(Debug, Clone)]
//!     pub struct Note {
//!         pub id: Uuid,
//!         pub title: String,
//!         pub tags: Vec<String>,
//!     }
//! }
//!
//! # async fn run() -> tidepool_db::Result<()> {
//! let store = Arc::new(Store::open(&StoreConfig::named("notes"), Schema::new().with::<Note>())?);
//! let engine = QueryEngine::new(store.clone());
//! let mut notes = engine.subscribe(Query::<Note>::all().sort_by(SortKey::ascending(field!(Note.title))));
//! notes.request_unlimited();
//! while let Some(snapshot) = notes.recv().await {
//!     println!("{} notes", snapshot?.len());
//! }
//! # Ok(())
//! # }
//! ```

mod batch;
mod config;
mod error;
mod feed;
pub mod live;
mod models;
mod repository;
mod store;

pub use batch::WriteBatch;
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use feed::{ChangeEvent, ChangeFeed, ChangeListener, RegistrationToken};
pub use live::{QueryEngine, Subscription, SubscriptionState};
pub use repository::Repository;
pub use store::{RecordStore, Store};
