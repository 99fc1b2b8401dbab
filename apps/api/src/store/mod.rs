//! Document store: JSON objects addressed by a collection path and a document id.
//!
//! Layout used by the service:
//!
//! ```text
//! users/{uid}                                  user record
//! users/{uid}/profile_data/{card}              one document per profile card
//! users/{uid}/profile_data/analysis_report     latest analysis report
//! users/{uid}/analysis_history/{entry}         append-only report log
//! ```

pub mod memory;
pub mod paths;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

const MAX_SEGMENT_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document at {0} must be a JSON object")]
    NotAnObject(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fully qualified address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        let id = id.into();
        validate_collection(&collection)?;
        validate_segment(&id)?;
        Ok(Self { collection, id })
    }

    pub fn collection(&self) -> &str {
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

/// A single path segment: non-empty, no separators, not a relative marker.
pub fn validate_segment(segment: &str) -> Result<(), StoreError> {
    let ok = !segment.trim().is_empty()
        && segment.len() <= MAX_SEGMENT_LEN
        && !segment.contains('/')
        && segment != "."
        && segment != "..";
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(segment.to_string()))
    }
}

/// Collections sit at odd depths: `users`, `users/{uid}/profile_data`, ...
pub fn validate_collection(collection: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.len() % 2 == 0 {
        return Err(StoreError::InvalidPath(collection.to_string()));
    }
    segments
        .iter()
        .try_for_each(|s| validate_segment(s))
        .map_err(|_| StoreError::InvalidPath(collection.to_string()))
}

/// Storage contract shared by the PostgreSQL and in-memory backends.
///
/// Carried in `AppState` as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError>;

    /// Overwrites the document, creating it if absent.
    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError>;

    /// Shallow top-level merge, creating the document if absent.
    async fn merge(&self, path: &DocPath, data: Value) -> Result<(), StoreError>;

    /// Shallow top-level merge into an existing document.
    /// Returns `NotFound` if the document does not exist.
    async fn update(&self, path: &DocPath, data: Value) -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// All documents in a collection, oldest first.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

pub(crate) fn ensure_object(path: &DocPath, data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject(path.to_string()))
    }
}

/// Replaces each top-level key of `target` with the one from `patch`.
pub(crate) fn merge_shallow(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key, value);
            }
        }
        (target, patch) => *target = patch,
    }
}
