use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Sort order for [`DocumentStore::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only overwrite the given top-level fields, keep the rest.
    pub merge: bool,
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

/// A hierarchical document database.
///
/// Paths alternate collection and document ids (`users/{uid}/meals`).
/// Documents are flat JSON objects; timestamps are RFC 3339 strings.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a document with a generated id and return the id.
    async fn save(&self, collection_path: &str, doc: Map<String, Value>) -> Result<String>;

    /// All documents of a collection in the given order.
    async fn query(&self, collection_path: &str, order: OrderBy) -> Result<Vec<StoredDocument>>;

    /// `None` when the document does not exist.
    async fn get(&self, doc_path: &str) -> Result<Option<Value>>;

    async fn set(&self, doc_path: &str, doc: Map<String, Value>, options: SetOptions) -> Result<()>;

    async fn delete(&self, doc_path: &str) -> Result<()>;
}
