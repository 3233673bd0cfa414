use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use super::documents::{CollectionPath, DocumentPath, DocumentStore, StoreError, WriteOutcome};
use super::{migrate, RawDocument, Versioned};

/// Outcome of a lookup on a field that is expected to be unique.
#[derive(Debug)]
pub enum UniqueLookup<T> {
    Found(T),
    NotFound,
    /// More than one document matched. Callers must not pick one.
    Ambiguous { matches: usize },
}

impl<T> UniqueLookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            UniqueLookup::Found(entity) => Some(entity),
            UniqueLookup::NotFound | UniqueLookup::Ambiguous { .. } => None,
        }
    }
}

/// Typed access to one collection of versioned documents.
pub struct VersionedStore<T> {
    documents: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    auto_migrate: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for VersionedStore<T> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
            collection: self.collection.clone(),
            auto_migrate: self.auto_migrate,
            _entity: PhantomData,
        }
    }
}

impl<T: Versioned> VersionedStore<T> {
    pub fn new(documents: Arc<dyn DocumentStore>, auto_migrate: bool) -> Self {
        Self::at(documents, CollectionPath::root(T::COLLECTION), auto_migrate)
    }

    /// Store for the `T::COLLECTION` sub-collection of `parent`.
    pub fn under(documents: Arc<dyn DocumentStore>, parent: &DocumentPath, auto_migrate: bool) -> Self {
        Self::at(documents, parent.subcollection(T::COLLECTION), auto_migrate)
    }

    fn at(documents: Arc<dyn DocumentStore>, collection: CollectionPath, auto_migrate: bool) -> Self {
        Self {
            documents,
            collection,
            auto_migrate,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Loads a document, runs it through the migration chain and, when
    /// auto-migrate is on and any step applied, writes the migrated form back.
    pub async fn get_and_migrate(&self, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.collection.doc(id);
        match self.documents.get(&path).await? {
            Some(raw) => self.materialize(&path, raw).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn get_by_unique_field(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<UniqueLookup<T>, StoreError> {
        let value = value.into();
        let mut matches = self
            .documents
            .find_by_field(&self.collection, field, &value)
            .await?;

        match matches.len() {
            0 => Ok(UniqueLookup::NotFound),
            1 => {
                let (id, raw) = matches.remove(0);
                let path = self.collection.doc(&id);
                self.materialize(&path, raw).await.map(UniqueLookup::Found)
            }
            n => {
                error!(
                    collection = %self.collection,
                    field,
                    %value,
                    matches = n,
                    "unique lookup matched more than one document"
                );
                Ok(UniqueLookup::Ambiguous { matches: n })
            }
        }
    }

    /// Replaces the stored document with `entity` if they differ.
    pub async fn update(&self, id: &str, entity: &T) -> Result<WriteOutcome, StoreError> {
        let path = self.collection.doc(id);
        let doc = encode(&path, entity)?;
        self.documents.update_if_changed(&path, doc).await
    }

    pub async fn create(&self, entity: T) -> Result<T, StoreError> {
        let path = self.collection.doc(entity.id());
        let doc = encode(&path, &entity)?;
        self.documents.create(&path, doc).await?;
        info!("Created {path}");
        Ok(entity)
    }

    async fn materialize(&self, path: &DocumentPath, raw: RawDocument) -> Result<T, StoreError> {
        let report = migrate::<T>(raw);

        if let Some(halted) = &report.halted {
            warn!("Migration of {path} stopped at v{}: {halted}", report.version);
        }

        if report.applied > 0 && self.auto_migrate {
            match self
                .documents
                .update_if_changed(path, report.document.clone())
                .await
            {
                Ok(outcome) => info!(
                    "Auto-migrated {path} v{} -> v{} ({outcome:?})",
                    report.from_version, report.version
                ),
                Err(e) => warn!("Auto-migrate write for {path} failed: {e}"),
            }
        }

        serde_json::from_value(Value::Object(report.document)).map_err(|source| {
            StoreError::Corrupt {
                path: path.to_string(),
                source,
            }
        })
    }
}

fn encode<T: Versioned>(path: &DocumentPath, entity: &T) -> Result<RawDocument, StoreError> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject(path.to_string())),
    }
}
