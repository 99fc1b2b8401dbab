//! In-memory document store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    ensure_object, merge_shallow, validate_collection, DocPath, DocumentStore, StoreError,
};

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<DocPath, StoredDoc>,
    next_seq: u64,
}

#[derive(Debug)]
struct StoredDoc {
    /// Creation order; survives overwrites like `created_at` does in Postgres.
    seq: u64,
    data: Value,
}

impl Inner {
    fn upsert(&mut self, path: &DocPath, data: Value, merge: bool) {
        match self.docs.get_mut(path) {
            Some(doc) if merge => merge_shallow(&mut doc.data, data),
            Some(doc) => doc.data = data,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.docs.insert(path.clone(), StoredDoc { seq, data });
            }
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.docs.get(path).map(|doc| doc.data.clone()))
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        self.inner.write().await.upsert(path, data, false);
        Ok(())
    }

    async fn merge(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        self.inner.write().await.upsert(path, data, true);
        Ok(())
    }

    async fn update(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        let mut inner = self.inner.write().await;
        let doc = inner
            .docs
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_shallow(&mut doc.data, data);
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.inner.write().await.docs.remove(path);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        validate_collection(collection)?;
        let inner = self.inner.read().await;
        let mut docs: Vec<(u64, String, Value)> = inner
            .docs
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .map(|(path, doc)| (doc.seq, path.id().to_string(), doc.data.clone()))
            .collect();
        docs.sort_by_key(|(seq, _, _)| *seq);
        Ok(docs.into_iter().map(|(_, id, data)| (id, data)).collect())
    }
}
