//! Schema reflection
//!
//! Storage schemas are derived from code, never from a schema file:
//! [`SchemaReflector`] walks a model's declared field table, runs each type
//! tag through the [`TypeMapper`] and produces an immutable
//! [`EntityDescriptor`]. Descriptors are collected in a [`Schema`] which the
//! store takes once, before it is opened.

pub mod attribute;
pub mod entity;
pub mod mapper;
pub mod reflect;
pub mod registry;

pub use attribute::{AttributeDescriptor, AttributeType, TypeMapping};
pub use entity::{BoundType, EntityDescriptor};
pub use mapper::{map_type_tag, TypeMapper};
pub use reflect::{describe, SchemaReflector};
pub use registry::Schema;
