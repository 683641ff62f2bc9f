//! Notes Example
//!
//! Opens a store for a `Note` model, follows a live query sorted by title
//! and edits notes through a repository, printing each snapshot.
//!
//! Run with an optional RON store config:
//! `cargo run -p notes -- notes.ron` where `notes.ron` is `(name: "notes")`.
//! Without one the store is kept in memory.

use std::sync::Arc;
use tidepool_core::{field, model, Field, Identifiable, Query, Schema, SortKey};
use tidepool_db::{QueryEngine, Repository, Store, StoreConfig, Subscription};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

model! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Note {
        pub id: Uuid,
        pub title: String,
        pub tags: Vec<String>,
    }
}

impl Identifiable for Note {
    type Id = Uuid;

    fn id_field() -> Field<Self, Uuid> {
        field!(Note.id)
    }
}

impl Note {
    fn new(title: &str, tags: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

async fn show(label: &str, live: &mut Subscription<Note>) -> tidepool_db::Result<()> {
    live.request(1);
    match live.recv().await {
        Some(snapshot) => {
            let notes = snapshot?;
            println!("{label}: {} note(s)", notes.len());
            for note in notes.iter() {
                println!("  - {} {:?}", note.title, note.tags);
            }
        }
        None => println!("{label}: subscription ended"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> tidepool_db::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidepool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Tidepool Notes Example ===\n");

    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::in_memory(),
    };
    let mut schema = Schema::new();
    schema.register::<Note>()?;
    let store = Arc::new(Store::open(&config, schema)?);
    info!(in_memory = config.in_memory, "store ready");

    println!("Schema:");
    for entity in store.schema().entities() {
        println!("  {}", entity);
    }
    println!();

    let engine = QueryEngine::new(store.clone());
    let mut live =
        engine.subscribe(Query::<Note>::all().sort_by(SortKey::ascending(field!(Note.title))));
    let repo = Repository::<Note>::all(store.clone());

    show("Initial", &mut live).await?;

    let milk = Note::new("buy milk", &["home"]);
    repo.add_item(&milk)?;
    repo.add_item(&Note::new("answer email", &["work", "urgent"]))?;
    repo.add_item(&Note::new("call plumber", &[]))?;
    show("After inserts", &mut live).await?;

    repo.update_item_by_id(milk.id, |note| {
        note.title = "buy oat milk".into();
        note.tags.push("errand".into());
    })?;
    show("After update", &mut live).await?;

    repo.delete_item_by_id(milk.id)?;
    show("After delete", &mut live).await?;

    live.cancel();
    println!("\nSubscription state: {}", live.state());
    Ok(())
}
