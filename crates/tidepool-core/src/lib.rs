//! Tidepool Core - schema reflection and query descriptors
//!
//! This crate holds everything about tidepool that does not touch storage:
//! - Dynamic value types (`Value`, `ValueMap`) and record identifiers
//! - The `Model` trait with its declared field table (`model!`, `field!`)
//! - Type tag mapping with the transformable/codec fallback
//! - Schema reflection into immutable entity descriptors
//! - Typed queries (`Query`, `Predicate`, `SortKey`) and the untyped
//!   `FetchRequest` they lower to
//!
//! The store and the live query engine live in `tidepool-db`.

mod codec;
mod convert;
mod error;
mod identity;
mod model;
pub mod query;
mod record;
pub mod schema;
mod value;

pub use codec::{ArrayCodec, BincodeCodec, CodecRef, ValueCodec};
pub use convert::{FromValue, IntoValue};
pub use error::{CodecError, Error, Result};
pub use identity::ObjectId;
pub use model::{type_base_name, DeclaredField, Field, Identifiable, Model};
pub use query::{FetchRequest, Filter, Predicate, Query, SortDescriptor, SortKey};
pub use record::Record;
pub use schema::{
    describe, AttributeDescriptor, AttributeType, EntityDescriptor, Schema, SchemaReflector,
    TypeMapper, TypeMapping,
};
pub use value::{Uri, Value, ValueMap};
