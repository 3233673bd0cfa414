use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use super::RawDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document {0} does not exist")]
    Missing(String),

    #[error("document {0} already exists")]
    AlreadyExists(String),

    #[error("document {0} is not a JSON object")]
    NotAnObject(String),

    #[error("document {path} failed typed construction: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Slash-separated collection address, e.g. `users` or `users/{id}/keywords`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn doc(&self, id: &str) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subcollection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{}", self.collection, self.id, name))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Schemaless JSON document storage addressed by collection path and id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Option<RawDocument>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the document is present.
    async fn create(&self, path: &DocumentPath, doc: RawDocument) -> Result<(), StoreError>;

    /// All documents in `collection` whose top-level `field` equals `value`.
    async fn find_by_field(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, RawDocument)>, StoreError>;

    /// Reads the stored document and replaces it only if it differs, as one
    /// atomic unit. Fails with [`StoreError::Missing`] if the document is absent.
    async fn update_if_changed(
        &self,
        path: &DocumentPath,
        doc: RawDocument,
    ) -> Result<WriteOutcome, StoreError>;
}

fn into_object(path: &DocumentPath, value: Value) -> Result<RawDocument, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject(path.to_string())),
    }
}

/// Postgres-backed store over the `documents` table (see `db::ensure_schema`).
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
    async fn get(&self, path: &DocumentPath) -> Result<Option<RawDocument>, StoreError> {
        let data: Option<Value> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(path.collection().as_str())
                .bind(path.id())
                .fetch_optional(&self.pool)
                .await?;

        data.map(|value| into_object(path, value)).transpose()
    }

    async fn create(&self, path: &DocumentPath, doc: RawDocument) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(Value::Object(doc))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, RawDocument)>, StoreError> {
        let rows: Vec<(String, Value)> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 AND data -> $2 = $3 ORDER BY id",
        )
        .bind(collection.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, data)| {
                let path = collection.doc(&id);
                into_object(&path, data).map(|doc| (id, doc))
            })
            .collect()
    }

    async fn update_if_changed(
        &self,
        path: &DocumentPath,
        doc: RawDocument,
    ) -> Result<WriteOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Value> = sqlx::query_scalar(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Err(StoreError::Missing(path.to_string()));
        };

        let next = Value::Object(doc);
        if current == next {
            tx.commit().await?;
            debug!("Document {path} unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(&next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Document {path} written");
        Ok(WriteOutcome::Written)
    }
}

#[cfg(test)]
pub mod memory {
    //! In-process document store for tests. A single mutex makes every
    //! operation atomic, matching the transactional contract.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryDocumentStore {
        docs: Mutex<BTreeMap<DocumentPath, RawDocument>>,
        writes: AtomicUsize,
    }

    impl MemoryDocumentStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a raw document without counting it as a write.
        pub fn insert_raw(&self, path: DocumentPath, doc: RawDocument) {
            self.docs.lock().unwrap().insert(path, doc);
        }

        pub fn raw(&self, path: &DocumentPath) -> Option<RawDocument> {
            self.docs.lock().unwrap().get(path).cloned()
        }

        /// Number of successful `create` and changed `update_if_changed` calls.
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn get(&self, path: &DocumentPath) -> Result<Option<RawDocument>, StoreError> {
            Ok(self.raw(path))
        }

        async fn create(&self, path: &DocumentPath, doc: RawDocument) -> Result<(), StoreError> {
            let mut docs = self.docs.lock().unwrap();
            if docs.contains_key(path) {
                return Err(StoreError::AlreadyExists(path.to_string()));
            }
            docs.insert(path.clone(), doc);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn find_by_field(
            &self,
            collection: &CollectionPath,
            field: &str,
            value: &Value,
        ) -> Result<Vec<(String, RawDocument)>, StoreError> {
            let docs = self.docs.lock().unwrap();
            Ok(docs
                .iter()
                .filter(|(path, doc)| path.collection() == collection && doc.get(field) == Some(value))
                .map(|(path, doc)| (path.id().to_string(), doc.clone()))
                .collect())
        }

        async fn update_if_changed(
            &self,
            path: &DocumentPath,
            doc: RawDocument,
        ) -> Result<WriteOutcome, StoreError> {
            let mut docs = self.docs.lock().unwrap();
            let current = docs
                .get_mut(path)
                .ok_or_else(|| StoreError::Missing(path.to_string()))?;
            if *current == doc {
                return Ok(WriteOutcome::Unchanged);
            }
            *current = doc;
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(WriteOutcome::Written)
        }
    }
}
