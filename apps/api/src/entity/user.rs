use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{set_default, set_version, Migration, RawDocument, Versioned};

pub const UNIQUE_FIELD: &str = "firebase_uid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Creating,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub firebase_uid: String,
    pub status: UserStatus,
    pub last_signed_in: Option<DateTime<Utc>>,
    #[serde(default)]
    pub continuous_login_count: u32,
    #[serde(default)]
    pub login_count: u32,
    pub name: Option<String>,
}

impl User {
    pub fn is_created(&self) -> bool {
        self.status == UserStatus::Created
    }
}

fn v0_to_v1(mut doc: RawDocument) -> RawDocument {
    if doc.get("status") == Some(&json!("creating")) {
        doc.insert("status".to_string(), json!("created"));
    }
    set_default(&mut doc, "updated_at", Value::Null);
    set_default(&mut doc, "last_signed_in", Value::Null);
    set_default(&mut doc, "continuous_login_count", json!(0));
    set_default(&mut doc, "login_count", json!(0));
    set_version(&mut doc, 1);
    doc
}

fn v1_to_v2(mut doc: RawDocument) -> RawDocument {
    set_default(&mut doc, "name", json!("Default Name"));
    set_version(&mut doc, 2);
    doc
}

impl Versioned for User {
    const COLLECTION: &'static str = "users";
    const CURRENT_VERSION: u32 = 2;
    const MIGRATIONS: &'static [Migration] = &[
        Migration {
            from: 0,
            apply: v0_to_v1,
        },
        Migration {
            from: 1,
            apply: v1_to_v2,
        },
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
