//! Entity registry

use super::entity::EntityDescriptor;
use super::reflect::SchemaReflector;
use crate::error::{Error, Result};
use crate::model::Model;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::warn;

/// The set of entities a store knows about, keyed by entity name
///
/// Descriptors are shared behind `Arc` so stores and engines can hold
/// them without copying.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: IndexMap<String, Arc<EntityDescriptor>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register)
    ///
    /// Registering the same entity twice keeps the first descriptor and
    /// logs the duplicate.
    pub fn with<M: Model>(mut self) -> Self {
        if let Err(e) = self.register::<M>() {
            warn!(
                target: "tidepool::schema",
                entity = M::entity_name(),
                error = %e,
                "entity not registered"
            );
        }
        self
    }

    /// Reflect and register a model with the default mapper
    pub fn register<M: Model>(&mut self) -> Result<Arc<EntityDescriptor>> {
        self.register_with::<M>(&SchemaReflector::new())
    }

    /// Reflect and register a model with a custom reflector
    pub fn register_with<M: Model>(
        &mut self,
        reflector: &SchemaReflector,
    ) -> Result<Arc<EntityDescriptor>> {
        self.insert(reflector.describe::<M>())
    }

    /// Add an already built descriptor
    pub fn insert(&mut self, entity: EntityDescriptor) -> Result<Arc<EntityDescriptor>> {
        if self.entities.contains_key(entity.name()) {
            return Err(Error::DuplicateEntity(entity.name().to_string()));
        }
        let entity = Arc::new(entity);
        self.entities
            .insert(entity.name().to_string(), Arc::clone(&entity));
        Ok(entity)
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(name)
    }

    /// Like [`entity`](Self::entity) but failing with `UnknownEntity`
    pub fn require(&self, name: &str) -> Result<&Arc<EntityDescriptor>> {
        self.entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Registered entities in registration order
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
