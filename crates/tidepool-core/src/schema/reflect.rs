//! Schema reflection from declared field tables

use super::attribute::AttributeDescriptor;
use super::entity::{BoundType, EntityDescriptor};
use super::mapper::TypeMapper;
use crate::model::{DeclaredField, Model};
use tracing::{debug, warn};

/// Builds entity descriptors from models
#[derive(Debug, Clone, Default)]
pub struct SchemaReflector {
    mapper: TypeMapper,
}

impl SchemaReflector {
    /// Reflector using the default [`TypeMapper`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflector using a custom mapper (extra codecs)
    pub fn with_mapper(mapper: TypeMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    /// Describe a model type
    pub fn describe<M: Model>(&self) -> EntityDescriptor {
        self.describe_fields(
            M::entity_name(),
            BoundType::of::<M>(),
            &M::declared_fields(),
        )
    }

    /// Describe an explicit field table
    ///
    /// Never fails. A field with an empty type tag, or a name already
    /// used by an earlier field, is left out of the descriptor, so the
    /// attribute count can be lower than the field count.
    pub fn describe_fields(
        &self,
        entity_name: &str,
        bound_type: BoundType,
        fields: &[DeclaredField],
    ) -> EntityDescriptor {
        let mut attributes: Vec<AttributeDescriptor> = Vec::with_capacity(fields.len());

        for field in fields {
            let tag = field.type_tag().trim();
            if tag.is_empty() || field.name().trim().is_empty() {
                warn!(
                    target: "tidepool::schema",
                    entity = entity_name,
                    field = field.name(),
                    "skipping field with unparseable type tag"
                );
                continue;
            }
            if attributes.iter().any(|a| a.name() == field.name()) {
                warn!(
                    target: "tidepool::schema",
                    entity = entity_name,
                    field = field.name(),
                    "skipping duplicate field"
                );
                continue;
            }
            attributes.push(AttributeDescriptor::new(field.name(), self.mapper.map(tag)));
        }

        debug!(
            target: "tidepool::schema",
            entity = entity_name,
            attributes = attributes.len(),
            "described entity"
        );
        EntityDescriptor::new(entity_name, attributes, bound_type)
    }
}

/// Describe a model type with the default mapper
pub fn describe<M: Model>() -> EntityDescriptor {
    SchemaReflector::new().describe::<M>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArrayCodec;
    use crate::schema::AttributeType;
    use crate::value::ValueMap;
    use crate::{model, Uri};
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    model! {
        #[derive(Debug, Clone)]
        pub struct Note {
            pub id: Uuid,
            pub title: String,
            pub tags: Vec<String>,
        }
    }

    model! {
        struct Everything {
            small: i16,
            medium: i32,
            large: i64,
            ratio: f32,
            precise: f64,
            flag: bool,
            text: String,
            key: Uuid,
            at: DateTime<Utc>,
            blob: Vec<u8>,
            link: Uri,
            maybe: Option<String>,
            nested: Vec<Vec<i64>>,
        }
    }

    struct Malformed;

    impl Model for Malformed {
        fn declared_fields() -> Vec<DeclaredField> {
            vec![
                DeclaredField::new("id", "Uuid"),
                DeclaredField::new("broken", ""),
                DeclaredField::new("blank", "   "),
                DeclaredField::new("title", "String"),
                DeclaredField::new("title", "i64"),
            ]
        }

        fn to_values(&self) -> ValueMap {
            ValueMap::new()
        }

        fn from_values(_: &ValueMap) -> Option<Self> {
            Some(Malformed)
        }
    }

    #[test]
    fn test_note_scenario() {
        let entity = describe::<Note>();
        assert_eq!(entity.name(), "Note");
        assert!(entity.is_bound_to::<Note>());

        let summary: Vec<_> = entity
            .attributes()
            .iter()
            .map(|a| (a.name(), a.attribute_type()))
            .collect();
        assert_eq!(
            summary,
            [
                ("id", AttributeType::Uuid),
                ("title", AttributeType::String),
                ("tags", AttributeType::Transformable),
            ]
        );
        let tags = entity.attribute("tags").unwrap();
        assert_eq!(tags.codec().map(|c| c.name()), Some(ArrayCodec::NAME));
        assert_eq!(
            entity.to_string(),
            "Note [id:uuid, title:string, tags:transformable(ArrayCodec)]"
        );
    }

    #[test]
    fn test_every_native_type() {
        let entity = describe::<Everything>();
        let types: Vec<_> = entity.attributes().iter().map(|a| a.attribute_type()).collect();
        assert_eq!(
            types,
            [
                AttributeType::Int16,
                AttributeType::Int32,
                AttributeType::Int64,
                AttributeType::Float,
                AttributeType::Double,
                AttributeType::Bool,
                AttributeType::String,
                AttributeType::Uuid,
                AttributeType::Date,
                AttributeType::Binary,
                AttributeType::Uri,
                AttributeType::String,
                AttributeType::Transformable,
            ]
        );
        assert!(entity
            .attributes()
            .iter()
            .all(|a| a.codec().is_some() == (a.attribute_type() == AttributeType::Transformable)));
    }

    #[test]
    fn test_malformed_fields_are_skipped() {
        let entity = describe::<Malformed>();
        let names: Vec<_> = entity.attribute_names().collect();
        assert_eq!(names, ["id", "title"]);
        assert_eq!(
            entity.attribute("title").map(|a| a.attribute_type()),
            Some(AttributeType::String)
        );
        assert!(entity.attribute("broken").is_none());
    }

    #[test]
    fn test_describe_is_deterministic() {
        assert_eq!(describe::<Note>(), describe::<Note>());
        assert_eq!(describe::<Everything>(), describe::<Everything>());
    }

    proptest! {
        #[test]
        fn prop_describe_fields_is_deterministic(
            tags in proptest::collection::vec("[A-Za-z0-9<>:_ ]{0,16}", 0..12)
        ) {
            let names: Vec<&'static str> = (0..tags.len())
                .map(|i| &*Box::leak(format!("field_{i}").into_boxed_str()))
                .collect();
            let fields: Vec<DeclaredField> = names
                .iter()
                .zip(tags.iter())
                .map(|(name, tag)| DeclaredField::new(*name, Box::leak(tag.clone().into_boxed_str())))
                .collect();

            let reflector = SchemaReflector::new();
            let first = reflector.describe_fields("Generated", BoundType::of::<()>(), &fields);
            let second = reflector.describe_fields("Generated", BoundType::of::<()>(), &fields);
            prop_assert_eq!(&first, &second);

            let expected = tags.iter().filter(|t| !t.trim().is_empty()).count();
            prop_assert_eq!(first.attributes().len(), expected);
        }
    }
}
