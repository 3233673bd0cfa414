//! Next-stage work items. Each pipeline stage that hands off pushes an
//! [`AsyncTask`] onto a Redis list; the delivery layer posts it back to
//! `/async_task`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::retry::{RetryPolicy, Transient};
use crate::timezone::parse_instant;

pub const KIND_LATEST_ALL: &str = "latest_all";
pub const KIND_LATEST_WITH_KEYWORDS_BY_USER: &str = "latest_with_keywords_by_user";
pub const KIND_RUN_AGENT_AND_TTS: &str = "run_agent_and_tts";

/// Wire form of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncTask {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    LatestAll {
        broadcasted_at: Option<DateTime<Utc>>,
    },
    LatestWithKeywordsByUser {
        user_id: String,
        keyword_id: String,
        broadcasted_at: Option<DateTime<Utc>>,
    },
    RunAgentAndTts {
        radio_show_id: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("unknown task kind: {0}")]
    UnknownKind(String),

    #[error("task {kind} is missing `{field}`")]
    MissingField { kind: String, field: &'static str },

    #[error("task {kind} has an invalid `{field}`: {reason}")]
    InvalidField {
        kind: String,
        field: &'static str,
        reason: String,
    },
}

fn required_str(task: &AsyncTask, field: &'static str) -> Result<String, TaskError> {
    match task.data.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(TaskError::MissingField {
            kind: task.kind.clone(),
            field,
        }),
    }
}

fn optional_instant(task: &AsyncTask, field: &'static str) -> Result<Option<DateTime<Utc>>, TaskError> {
    match task.data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_instant(raw).map(Some).map_err(|e| TaskError::InvalidField {
            kind: task.kind.clone(),
            field,
            reason: e.to_string(),
        }),
        Some(other) => Err(TaskError::InvalidField {
            kind: task.kind.clone(),
            field,
            reason: format!("expected a timestamp string, got {other}"),
        }),
    }
}

impl TryFrom<&AsyncTask> for Task {
    type Error = TaskError;

    fn try_from(task: &AsyncTask) -> Result<Self, Self::Error> {
        match task.kind.as_str() {
            KIND_LATEST_ALL => Ok(Task::LatestAll {
                broadcasted_at: optional_instant(task, "broadcasted_at")?,
            }),
            KIND_LATEST_WITH_KEYWORDS_BY_USER => Ok(Task::LatestWithKeywordsByUser {
                user_id: required_str(task, "user_id")?,
                keyword_id: required_str(task, "keyword_id")?,
                broadcasted_at: optional_instant(task, "broadcasted_at")?,
            }),
            KIND_RUN_AGENT_AND_TTS => Ok(Task::RunAgentAndTts {
                radio_show_id: required_str(task, "radio_show_id")?,
            }),
            other => Err(TaskError::UnknownKind(other.to_string())),
        }
    }
}

impl From<&Task> for AsyncTask {
    fn from(task: &Task) -> Self {
        let instant = |at: &Option<DateTime<Utc>>| at.map(|t| t.to_rfc3339());
        match task {
            Task::LatestAll { broadcasted_at } => AsyncTask {
                kind: KIND_LATEST_ALL.to_string(),
                data: json!({ "broadcasted_at": instant(broadcasted_at) }),
            },
            Task::LatestWithKeywordsByUser {
                user_id,
                keyword_id,
                broadcasted_at,
            } => AsyncTask {
                kind: KIND_LATEST_WITH_KEYWORDS_BY_USER.to_string(),
                data: json!({
                    "user_id": user_id,
                    "keyword_id": keyword_id,
                    "broadcasted_at": instant(broadcasted_at),
                }),
            },
            Task::RunAgentAndTts { radio_show_id } => AsyncTask {
                kind: KIND_RUN_AGENT_AND_TTS.to_string(),
                data: json!({ "radio_show_id": radio_show_id }),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode task: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Transient for QueueError {
    fn is_transient(&self) -> bool {
        match self {
            QueueError::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            QueueError::Encode(_) => false,
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: &Task) -> Result<(), QueueError>;
}

/// Pushes tasks onto a Redis list with `RPUSH`.
#[derive(Clone)]
pub struct RedisTaskQueue {
    client: redis::Client,
    key: String,
    retry: RetryPolicy,
}

impl RedisTaskQueue {
    pub fn new(client: redis::Client, key: String, retry: RetryPolicy) -> Self {
        Self { client, key, retry }
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: &Task) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&AsyncTask::from(task))?;
        let client = &self.client;
        let key = self.key.as_str();
        let payload = payload.as_str();
        self.retry
            .run("enqueue task", || async move {
                let mut conn = client.get_multiplexed_async_connection().await?;
                conn.rpush::<_, _, ()>(key, payload).await?;
                Ok::<(), QueueError>(())
            })
            .await?;
        info!("Enqueued {payload} onto {key}");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(kind: &str, data: Value) -> AsyncTask {
        AsyncTask {
            kind: kind.to_string(),
            data,
        }
    }

    #[test]
    fn test_latest_all_naive_timestamp_is_utc() {
        let parsed = Task::try_from(&task(
            "latest_all",
            json!({"broadcasted_at": "2025-02-11T09:00:00"}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            Task::LatestAll {
                broadcasted_at: Some(Utc.with_ymd_and_hms(2025, 2, 11, 9, 0, 0).unwrap())
            }
        );
        assert_eq!(
            Task::try_from(&task("latest_all", Value::Null)).unwrap(),
            Task::LatestAll { broadcasted_at: None }
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert_eq!(
            Task::try_from(&task("reindex", json!({}))),
            Err(TaskError::UnknownKind("reindex".into()))
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(matches!(
            Task::try_from(&task("run_agent_and_tts", json!({}))),
            Err(TaskError::MissingField { field: "radio_show_id", .. })
        ));
        assert!(matches!(
            Task::try_from(&task("latest_all", json!({"broadcasted_at": 12}))),
            Err(TaskError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_wire_form_parses_back() {
        let original = Task::LatestWithKeywordsByUser {
            user_id: "u1".into(),
            keyword_id: "k1".into(),
            broadcasted_at: Some(Utc.with_ymd_and_hms(2025, 2, 11, 3, 0, 0).unwrap()),
        };
        let wire = AsyncTask::from(&original);
        assert_eq!(wire.kind, "latest_with_keywords_by_user");
        assert_eq!(Task::try_from(&wire).unwrap(), original);
    }
}
