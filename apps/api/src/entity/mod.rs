//! Versioned documents: every persisted entity carries an integer schema
//! `version` and a fixed, ordered table of migration steps that lift a raw
//! document one version at a time. Migration happens lazily on read through
//! [`store::VersionedStore::get_and_migrate`].

pub mod documents;
pub mod keyword;
pub mod radio_show;
pub mod store;
pub mod user;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

pub use documents::{CollectionPath, DocumentPath, DocumentStore, StoreError, WriteOutcome};
pub use store::{UniqueLookup, VersionedStore};

/// A document as stored, before typed construction.
pub type RawDocument = serde_json::Map<String, Value>;

pub const VERSION_FIELD: &str = "version";

/// One step of a migration chain. `apply` receives a document at version
/// `from` and must return it at a strictly greater version.
#[derive(Clone, Copy)]
pub struct Migration {
    pub from: u32,
    pub apply: fn(RawDocument) -> RawDocument,
}

pub trait Versioned: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Root collection name. Sub-collections are addressed through [`VersionedStore::under`].
    const COLLECTION: &'static str;
    const CURRENT_VERSION: u32;
    const MIGRATIONS: &'static [Migration];

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("no migration registered for {collection} v{version}")]
    Missing {
        collection: &'static str,
        version: u32,
    },

    #[error("migration for {collection} v{from} did not advance the version (returned v{returned})")]
    Stalled {
        collection: &'static str,
        from: u32,
        returned: u32,
    },
}

/// Result of running a raw document through its migration chain.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub document: RawDocument,
    pub from_version: u32,
    pub version: u32,
    pub applied: usize,
    /// Set when the chain stopped before reaching the current version.
    pub halted: Option<MigrationError>,
}

/// Reads the schema version. Absent or non-integer values count as version 0.
pub fn document_version(doc: &RawDocument) -> u32 {
    doc.get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

pub fn migrate<T: Versioned>(mut doc: RawDocument) -> MigrationReport {
    if !doc.contains_key(VERSION_FIELD) {
        doc.insert(VERSION_FIELD.to_string(), Value::from(0u32));
    }
    let from_version = document_version(&doc);
    let mut version = from_version;
    let mut applied = 0;
    let mut halted = None;

    if version > T::CURRENT_VERSION {
        warn!(
            collection = T::COLLECTION,
            version,
            current = T::CURRENT_VERSION,
            "document is newer than this build knows about"
        );
    }

    while version < T::CURRENT_VERSION {
        let Some(step) = T::MIGRATIONS.iter().find(|m| m.from == version) else {
            let err = MigrationError::Missing {
                collection: T::COLLECTION,
                version,
            };
            error!("{err}");
            halted = Some(err);
            break;
        };

        let next = (step.apply)(doc.clone());
        let next_version = document_version(&next);
        if next_version <= version {
            let err = MigrationError::Stalled {
                collection: T::COLLECTION,
                from: version,
                returned: next_version,
            };
            error!("{err}");
            halted = Some(err);
            break;
        }

        debug!(
            collection = T::COLLECTION,
            from = version,
            to = next_version,
            "applied migration step"
        );
        doc = next;
        version = next_version;
        applied += 1;
    }

    MigrationReport {
        document: doc,
        from_version,
        version,
        applied,
        halted,
    }
}

/// Walks the chain from version 0 and reports the first gap. Run once at startup.
pub fn validate_chain<T: Versioned>() -> Result<(), MigrationError> {
    for version in 0..T::CURRENT_VERSION {
        if !T::MIGRATIONS.iter().any(|m| m.from == version) {
            return Err(MigrationError::Missing {
                collection: T::COLLECTION,
                version,
            });
        }
    }
    Ok(())
}

/// Validates every entity chain this service persists.
pub fn validate_all_chains() -> Result<(), MigrationError> {
    validate_chain::<user::User>()?;
    validate_chain::<radio_show::RadioShow>()?;
    validate_chain::<keyword::Keyword>()?;
    Ok(())
}

/// Inserts `value` under `key` unless the document already has that key.
pub(crate) fn set_default(doc: &mut RawDocument, key: &str, value: Value) {
    doc.entry(key.to_string()).or_insert(value);
}

pub(crate) fn set_version(doc: &mut RawDocument, version: u32) {
    doc.insert(VERSION_FIELD.to_string(), Value::from(version));
}
