use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{set_default, set_version, Migration, RawDocument, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioShowStatus {
    Creating,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioShow {
    pub id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub radio_show_id: String,
    pub title: String,
    pub host: String,
    pub status: RadioShowStatus,
    pub description: Option<String>,
    pub masterdata_blob_path: Option<String>,
    pub audio_url: Option<String>,
    pub script_url: Option<String>,
    pub broadcasted_at: Option<DateTime<Utc>>,
}

impl RadioShow {
    /// A fresh show awaiting the script/audio stage.
    pub fn creating(
        id: String,
        title: String,
        host: String,
        masterdata_blob_path: String,
        broadcasted_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            radio_show_id: id.clone(),
            id,
            version: Self::CURRENT_VERSION,
            created_at: now,
            updated_at: None,
            title,
            host,
            status: RadioShowStatus::Creating,
            description: Some(String::new()),
            masterdata_blob_path: Some(masterdata_blob_path),
            audio_url: None,
            script_url: None,
            broadcasted_at: Some(broadcasted_at),
        }
    }

    pub fn is_created(&self) -> bool {
        self.status == RadioShowStatus::Created
    }
}

// First schema generation: draft / published.
fn v0_to_v1(mut doc: RawDocument) -> RawDocument {
    if doc.get("status") == Some(&json!("draft")) {
        doc.insert("status".to_string(), json!("published"));
    }
    set_default(&mut doc, "updated_at", Value::Null);
    set_default(&mut doc, "description", json!(""));
    set_version(&mut doc, 1);
    doc
}

fn v1_to_v2(mut doc: RawDocument) -> RawDocument {
    set_default(&mut doc, "title", json!("Untitled Show"));
    set_version(&mut doc, 2);
    doc
}

// Second generation: creating / created, plus pipeline artifacts.
fn v2_to_v3(mut doc: RawDocument) -> RawDocument {
    let status = match doc.get("status").and_then(Value::as_str) {
        Some("draft") => Some("creating"),
        Some("published") => Some("created"),
        _ => None,
    };
    if let Some(status) = status {
        doc.insert("status".to_string(), json!(status));
    }
    if !doc.contains_key("radio_show_id") {
        let id = doc.get("id").cloned().unwrap_or(Value::Null);
        doc.insert("radio_show_id".to_string(), id);
    }
    set_default(&mut doc, "host", json!(""));
    set_default(&mut doc, "masterdata_blob_path", Value::Null);
    set_default(&mut doc, "audio_url", Value::Null);
    set_default(&mut doc, "script_url", Value::Null);
    set_default(&mut doc, "broadcasted_at", Value::Null);
    set_version(&mut doc, 3);
    doc
}

impl Versioned for RadioShow {
    const COLLECTION: &'static str = "radio_shows";
    const CURRENT_VERSION: u32 = 3;
    const MIGRATIONS: &'static [Migration] = &[
        Migration {
            from: 0,
            apply: v0_to_v1,
        },
        Migration {
            from: 1,
            apply: v1_to_v2,
        },
        Migration {
            from: 2,
            apply: v2_to_v3,
        },
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
