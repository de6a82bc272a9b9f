//! Document store contract.
//!
//! Data is addressed the way a hierarchical document database addresses it:
//! collections contain documents, documents may parent further collections.
//!
//! ```text
//! /{user}/{profile}                      profile document
//! /{user}/{profile}/buttons/{id}         message button
//! /{user}/{profile}/phoneNumber/{id}     emergency contact
//! /{user}/{profile}/timeline/{id}        timeline event
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::SortDirection;
use crate::error::StoreError;

mod schema;
mod sqlite;

pub use sqlite::{init, SqliteStore};

pub type Fields = IndexMap<String, FieldValue>;
pub type StoreHandle = Arc<dyn DocumentStore>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Placeholder replaced with the store's own clock at write time.
    ServerTimestamp,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    fn partial_cmp_same_kind(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Sub-collection `name` below document `doc_id` of this collection.
    pub fn nested(&self, doc_id: &str, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(doc_id.to_string());
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub mod paths {
    use super::{CollectionPath, DocPath};

    pub const BUTTONS: &str = "buttons";
    pub const CONTACTS: &str = "phoneNumber";
    pub const TIMELINE: &str = "timeline";

    pub fn profiles(user_id: &str) -> CollectionPath {
        CollectionPath::root(user_id)
    }

    pub fn profile(user_id: &str, profile_id: &str) -> DocPath {
        profiles(user_id).doc(profile_id)
    }

    pub fn buttons(user_id: &str, profile_id: &str) -> CollectionPath {
        profiles(user_id).nested(profile_id, BUTTONS)
    }

    pub fn contacts(user_id: &str, profile_id: &str) -> CollectionPath {
        profiles(user_id).nested(profile_id, CONTACTS)
    }

    pub fn timeline(user_id: &str, profile_id: &str) -> CollectionPath {
        profiles(user_id).nested(profile_id, TIMELINE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn timestamp(&self, field: &str) -> Option<OffsetDateTime> {
        match self.fields.get(field) {
            Some(FieldValue::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, FieldValue),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: FieldValue) -> Self {
        Filter::Eq(field.into(), value)
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Eq(field, expected) => fields.get(field) == Some(expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Applies filters and ordering to documents already read from a collection.
/// Documents without the ordering field are left out, mixed-kind values keep
/// their relative order.
pub(crate) fn select(
    mut docs: Vec<Document>,
    filters: &[Filter],
    order_by: Option<&OrderBy>,
) -> Vec<Document> {
    docs.retain(|doc| filters.iter().all(|filter| filter.matches(&doc.fields)));
    if let Some(order) = order_by {
        docs.retain(|doc| doc.fields.contains_key(&order.field));
        docs.sort_by(|a, b| {
            let ordering = match (a.fields.get(&order.field), b.fields.get(&order.field)) {
                (Some(left), Some(right)) => left
                    .partial_cmp_same_kind(right)
                    .unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            match order.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    docs
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `fields` as a new document in `collection` and returns its id.
    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<String, StoreError>;

    async fn query_collection(
        &self,
        collection: &CollectionPath,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn delete_document(&self, path: &DocPath) -> Result<(), StoreError>;
}
