//! Entity descriptors

use super::attribute::AttributeDescriptor;
use std::any::TypeId;
use std::fmt;

/// Runtime handle of the Rust type an entity was reflected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundType {
    id: TypeId,
    name: &'static str,
}

impl BoundType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// Storage description of one model type
///
/// Built once by the [`SchemaReflector`](super::SchemaReflector) and
/// immutable afterwards. Attribute names are unique and keep the model's
/// field declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    name: String,
    attributes: Vec<AttributeDescriptor>,
    bound_type: BoundType,
}

impl EntityDescriptor {
    pub(crate) fn new(
        name: impl Into<String>,
        attributes: Vec<AttributeDescriptor>,
        bound_type: BoundType,
    ) -> Self {
        Self {
            name: name.into(),
            attributes,
            bound_type,
        }
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Attribute names in declaration order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name())
    }

    pub fn bound_type(&self) -> BoundType {
        self.bound_type
    }

    /// Check whether this entity was reflected from `T`
    pub fn is_bound_to<T: 'static>(&self) -> bool {
        self.bound_type.is::<T>()
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name)?;
        for (i, attribute) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", attribute)?;
        }
        write!(f, "]")
    }
}
