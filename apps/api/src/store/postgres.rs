//! PostgreSQL-backed document store. Documents are JSONB rows keyed by
//! `(collection, doc_id)`; see `db::ensure_schema` for the table.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use super::{ensure_object, validate_collection, DocPath, DocumentStore, StoreError};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        let data: Option<Value> = sqlx::query_scalar(
            "SELECT data FROM documents WHERE collection = $1 AND doc_id = $2",
        )
        .bind(path.collection())
        .bind(path.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(data)
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, doc_id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(path.collection())
        .bind(path.id())
        .bind(&data)
        .execute(&self.pool)
        .await?;
        debug!("set {path}");
        Ok(())
    }

    async fn merge(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        // jsonb `||` is a shallow, top-level merge.
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, doc_id)
            DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(path.collection())
        .bind(path.id())
        .bind(&data)
        .execute(&self.pool)
        .await?;
        debug!("merged {path}");
        Ok(())
    }

    async fn update(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        ensure_object(path, &data)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3, updated_at = now()
            WHERE collection = $1 AND doc_id = $2
            "#,
        )
        .bind(path.collection())
        .bind(path.id())
        .bind(&data)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        debug!("updated {path}");
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(path.collection())
            .bind(path.id())
            .execute(&self.pool)
            .await?;
        debug!("deleted {path}");
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        validate_collection(collection)?;
        let rows: Vec<(String, Value)> = sqlx::query_as(
            r#"
            SELECT doc_id, data
            FROM documents
            WHERE collection = $1
            ORDER BY created_at, doc_id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
