//! Query value types
//!
//! A [`Query`] is a typed description of what to fetch: an optional equality
//! [`Predicate`] and an optional [`SortKey`]. Stores never see the typed form;
//! they get the [`FetchRequest`] it lowers to.

use crate::convert::IntoValue;
use crate::model::{Field, Model};
use crate::record::Record;
use crate::value::{Value, ValueMap};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// Raw filter expression over attribute values
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute equals a literal; a missing attribute compares as `Null`
    Equal { field: String, value: Value },
    /// Every sub-filter matches (empty matches everything)
    All(Vec<Filter>),
}

impl Filter {
    pub fn equal(field: impl Into<String>, value: impl IntoValue) -> Self {
        Filter::Equal {
            field: field.into(),
            value: value.into_value(),
        }
    }

    /// Conjunction, flattening nested `All`s
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::All(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::All(more) => parts.extend(more),
            single => parts.push(single),
        }
        Filter::All(parts)
    }

    pub fn matches(&self, values: &ValueMap) -> bool {
        match self {
            Filter::Equal { field, value } => {
                let actual = values.get(field).unwrap_or(&Value::Null);
                literal_eq(actual, value)
            }
            Filter::All(parts) => parts.iter().all(|p| p.matches(values)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equal { field, value } => write!(f, "{} == {}", field, value),
            Filter::All(parts) => {
                if parts.is_empty() {
                    return write!(f, "true");
                }
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

// Integers and floats compare numerically; everything else structurally.
fn literal_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            actual.sort_cmp(expected) == Ordering::Equal
        }
        _ => actual == expected,
    }
}

/// Typed equality predicate over a model's fields
pub struct Predicate<M> {
    filter: Filter,
    _model: PhantomData<fn() -> M>,
}

impl<M> Predicate<M> {
    /// `field == value`
    pub fn equal<V: IntoValue>(field: Field<M, V>, value: impl Into<V>) -> Self {
        Self::from_filter(Filter::equal(field.name(), value.into()))
    }

    /// Wrap a raw filter expression
    pub fn from_filter(filter: Filter) -> Self {
        Self {
            filter,
            _model: PhantomData,
        }
    }

    pub fn and(self, other: Predicate<M>) -> Self {
        Self::from_filter(self.filter.and(other.filter))
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn into_filter(self) -> Filter {
        self.filter
    }
}

impl<M> Clone for Predicate<M> {
    fn clone(&self) -> Self {
        Self::from_filter(self.filter.clone())
    }
}

impl<M> fmt::Debug for Predicate<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.filter).finish()
    }
}

/// Field plus direction
pub struct SortKey<M> {
    field: &'static str,
    ascending: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M> SortKey<M> {
    pub fn new(field: &'static str, ascending: bool) -> Self {
        Self {
            field,
            ascending,
            _model: PhantomData,
        }
    }

    pub fn ascending<V>(field: Field<M, V>) -> Self {
        Self::new(field.name(), true)
    }

    pub fn descending<V>(field: Field<M, V>) -> Self {
        Self::new(field.name(), false)
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    fn descriptor(&self) -> SortDescriptor {
        SortDescriptor {
            field: self.field.to_string(),
            ascending: self.ascending,
        }
    }
}

impl<M> Clone for SortKey<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for SortKey<M> {}

impl<M> fmt::Debug for SortKey<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortKey")
            .field("field", &self.field)
            .field("ascending", &self.ascending)
            .finish()
    }
}

/// Typed query: optional predicate and optional sort key
pub struct Query<M> {
    predicate: Option<Predicate<M>>,
    sort: Option<SortKey<M>>,
}

impl<M> Query<M> {
    /// Every record of the entity, unordered
    pub fn all() -> Self {
        Self {
            predicate: None,
            sort: None,
        }
    }

    /// Restrict the query; repeated calls are combined with `and`
    pub fn filter(mut self, predicate: Predicate<M>) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn sort_by(mut self, key: SortKey<M>) -> Self {
        self.sort = Some(key);
        self
    }

    pub fn predicate(&self) -> Option<&Predicate<M>> {
        self.predicate.as_ref()
    }

    pub fn sort_key(&self) -> Option<&SortKey<M>> {
        self.sort.as_ref()
    }
}

impl<M: Model> Query<M> {
    /// Lower to the untyped request a store executes
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            entity: M::entity_name().to_string(),
            filter: self.predicate.as_ref().map(|p| p.filter().clone()),
            sort: self.sort.as_ref().map(SortKey::descriptor),
        }
    }
}

impl<M> Default for Query<M> {
    fn default() -> Self {
        Self::all()
    }
}

impl<M> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            sort: self.sort,
        }
    }
}

impl<M> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("predicate", &self.predicate)
            .field("sort", &self.sort)
            .finish()
    }
}

/// Untyped sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

/// What a store is asked to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub entity: String,
    pub filter: Option<Filter>,
    pub sort: Option<SortDescriptor>,
}

impl FetchRequest {
    /// All records of `entity`, unordered
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filter: None,
            sort: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort = Some(SortDescriptor {
            field: field.into(),
            ascending,
        });
        self
    }

    /// Check a record's values against the filter
    pub fn matches(&self, values: &ValueMap) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(values))
    }

    /// Order records by the sort key; no-op without one
    ///
    /// The sort is stable, so records with equal keys keep their input order.
    pub fn sort(&self, records: &mut [Record]) {
        let Some(sort) = &self.sort else {
            return;
        };
        records.sort_by(|a, b| {
            let left = a.get(&sort.field).unwrap_or(&Value::Null);
            let right = b.get(&sort.field).unwrap_or(&Value::Null);
            let ordering = left.sort_cmp(right);
            if sort.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field, model};
    use uuid::Uuid;

    model! {
        #[derive(Debug, Clone)]
        struct Note {
            id: Uuid,
            title: String,
            rank: i64,
        }
    }

    fn record(title: &str, rank: i64) -> Record {
        let mut record = Record::new("Note");
        record.set("title", title);
        record.set("rank", rank);
        record
    }

    fn titles(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.get("title").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_equal_predicate_lowers_to_filter() {
        let id = Uuid::new_v4();
        let query = Query::<Note>::all().filter(Predicate::equal(field!(Note.id), id));
        let request = query.fetch_request();
        assert_eq!(request.entity, "Note");
        assert_eq!(
            request.filter,
            Some(Filter::Equal {
                field: "id".into(),
                value: Value::Uuid(id)
            })
        );
        assert!(request.sort.is_none());
    }

    #[test]
    fn test_filters_combine_with_and() {
        let query = Query::<Note>::all()
            .filter(Predicate::equal(field!(Note.title), "a"))
            .filter(Predicate::equal(field!(Note.rank), 2));
        let filter = query.fetch_request().filter.unwrap();
        assert_eq!(filter.to_string(), "title == \"a\" && rank == 2");

        assert!(filter.matches(&record("a", 2).values));
        assert!(!filter.matches(&record("a", 3).values));
        assert!(!filter.matches(&record("b", 2).values));
    }

    #[test]
    fn test_missing_attribute_matches_null() {
        let filter = Filter::equal("missing", Value::Null);
        assert!(filter.matches(&ValueMap::new()));
        assert!(!Filter::equal("missing", 1).matches(&ValueMap::new()));
    }

    #[test]
    fn test_numeric_equality_across_kinds() {
        let filter = Filter::equal("rank", 2.0);
        assert!(filter.matches(&record("x", 2).values));
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut records = vec![record("b", 1), record("a", 2), record("c", 3)];
        let query = Query::<Note>::all().sort_by(SortKey::ascending(field!(Note.title)));
        query.fetch_request().sort(&mut records);
        assert_eq!(titles(&records), ["a", "b", "c"]);

        let query = Query::<Note>::all().sort_by(SortKey::descending(field!(Note.rank)));
        query.fetch_request().sort(&mut records);
        assert_eq!(titles(&records), ["c", "a", "b"]);
    }

    #[test]
    fn test_sort_without_key_keeps_input() {
        let mut records = vec![record("b", 1), record("a", 2)];
        FetchRequest::new("Note").sort(&mut records);
        assert_eq!(titles(&records), ["b", "a"]);
    }

    #[test]
    fn test_request_without_filter_matches_everything() {
        let request = FetchRequest::new("Note").with_sort("title", true);
        assert!(request.matches(&ValueMap::new()));
        assert_eq!(request.sort.map(|s| s.field), Some("title".to_string()));
    }
}
