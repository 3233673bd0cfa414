use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{set_default, set_version, Migration, RawDocument, Versioned};

/// A saved search phrase, stored under `users/{user_id}/keywords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    pub user_id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub text: String,
}

fn v0_to_v1(mut doc: RawDocument) -> RawDocument {
    set_default(&mut doc, "updated_at", Value::Null);
    set_version(&mut doc, 1);
    doc
}

impl Versioned for Keyword {
    const COLLECTION: &'static str = "keywords";
    const CURRENT_VERSION: u32 = 1;
    const MIGRATIONS: &'static [Migration] = &[Migration {
        from: 0,
        apply: v0_to_v1,
    }];

    fn id(&self) -> &str {
        &self.id
    }
}
