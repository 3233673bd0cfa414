use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::entity::radio_show::RadioShow;
use crate::entity::user::User;
use crate::entity::Versioned;
use crate::errors::AppError;
use crate::queue::{AsyncTask, Task};
use crate::state::AppState;
use crate::workflow::StageOutcome;

/// The attributes of a document-created CloudEvent this service reads.
#[derive(Debug, Deserialize)]
pub struct DocumentEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub document: String,
}

/// Checks that `document` is exactly `{collection}/{uuid v4}` and returns the id.
fn document_id<'a>(event: &'a DocumentEvent, collection: &str) -> Result<&'a str, AppError> {
    let Some((found, id)) = event.document.split_once('/') else {
        error!("{}: invalid document: {:?}", event.id, event.document);
        return Err(AppError::Validation(format!("invalid document: {}", event.document)));
    };
    if found != collection || id.contains('/') {
        error!("{}: invalid document: {:?}", event.id, event.document);
        return Err(AppError::Validation(format!("invalid document: {}", event.document)));
    }
    match Uuid::parse_str(id) {
        Ok(uuid) if uuid.get_version_num() == 4 => Ok(id),
        _ => {
            error!("{}: invalid id in {}", event.id, event.document);
            Err(AppError::Validation(format!("invalid {collection} id: {id}")))
        }
    }
}

fn log_outcome(event_id: &str, what: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Completed => info!("{event_id}: finished {what}"),
        StageOutcome::AlreadyDone => info!("{event_id}: {what} was already done"),
    }
}

/// POST /add_user
pub async fn handle_add_user(
    State(state): State<AppState>,
    Json(event): Json<DocumentEvent>,
) -> Result<StatusCode, AppError> {
    info!("{}: user document event for {}", event.id, event.document);
    let user_id = document_id(&event, User::COLLECTION)?;
    let outcome = state.workflows.activate_user(user_id).await?;
    log_outcome(&event.id, &format!("activating user {user_id}"), &outcome);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /add_radio_show
pub async fn handle_add_radio_show(
    State(state): State<AppState>,
    Json(event): Json<DocumentEvent>,
) -> Result<StatusCode, AppError> {
    info!("{}: radio show document event for {}", event.id, event.document);
    let radio_show_id = document_id(&event, RadioShow::COLLECTION)?;
    let outcome = state.workflows.run_agent_and_tts(radio_show_id).await?;
    log_outcome(&event.id, &format!("producing radio show {radio_show_id}"), &outcome);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /async_task
pub async fn handle_async_task(
    State(state): State<AppState>,
    Json(body): Json<AsyncTask>,
) -> Result<StatusCode, AppError> {
    info!("Async task kind: {}, data: {}", body.kind, body.data);
    let task = Task::try_from(&body)?;
    state.workflows.run_task(task).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::entity::documents::memory::MemoryDocumentStore;
    use crate::entity::tests::raw;
    use crate::entity::CollectionPath;
    use crate::queue::memory::RecordingQueue;
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::workflow::tests::{harness, Harness};

    use super::*;

    const USER_ID: &str = "6f1c2a0e-3b7d-4c1e-9a2f-5d8e7b6a4c3d";

    struct App {
        router: axum::Router,
        documents: Arc<MemoryDocumentStore>,
        queue: Arc<RecordingQueue>,
    }

    fn app() -> App {
        let Harness {
            documents,
            queue,
            workflows,
            ..
        } = harness();
        App {
            router: build_router(AppState {
                workflows: Arc::new(workflows),
            }),
            documents,
            queue,
        }
    }

    async fn post(router: &axum::Router, uri: &str, body: Value) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        router.clone().oneshot(request).await.unwrap().status()
    }

    fn seed_user(documents: &MemoryDocumentStore, status: &str) {
        documents.insert_raw(
            CollectionPath::root("users").doc(USER_ID),
            raw(json!({
                "id": USER_ID,
                "version": 2,
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": null,
                "firebase_uid": "fb-1",
                "status": status,
                "last_signed_in": null,
                "continuous_login_count": 0,
                "login_count": 0,
                "name": "Aiko",
            })),
        );
    }

    #[test]
    fn test_document_id_requires_collection_and_uuid_v4() {
        let event = |document: &str| DocumentEvent {
            id: "evt".into(),
            document: document.into(),
        };
        assert_eq!(document_id(&event(&format!("users/{USER_ID}")), "users").unwrap(), USER_ID);
        assert!(document_id(&event(&format!("radio_shows/{USER_ID}")), "users").is_err());
        assert!(document_id(&event(&format!("users/{USER_ID}/keywords")), "users").is_err());
        assert!(document_id(&event("users/not-a-uuid"), "users").is_err());
        // Version 1 UUID.
        assert!(document_id(&event("users/c232ab00-9414-11ec-b3c8-9f6bdeced846"), "users").is_err());
        assert!(document_id(&event("users"), "users").is_err());
    }

    #[tokio::test]
    async fn test_add_user_activates_then_is_idempotent() {
        let app = app();
        seed_user(&app.documents, "creating");

        let body = json!({"id": "evt-1", "document": format!("users/{USER_ID}")});
        assert_eq!(post(&app.router, "/add_user", body.clone()).await, StatusCode::NO_CONTENT);
        let stored = app
            .documents
            .raw(&CollectionPath::root("users").doc(USER_ID))
            .unwrap();
        assert_eq!(stored["status"], json!("created"));

        let writes = app.documents.writes();
        assert_eq!(post(&app.router, "/add_user", body).await, StatusCode::NO_CONTENT);
        assert_eq!(app.documents.writes(), writes);
    }

    #[tokio::test]
    async fn test_add_user_errors() {
        let app = app();
        assert_eq!(
            post(&app.router, "/add_user", json!({"id": "e", "document": "users/abc"})).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post(
                &app.router,
                "/add_user",
                json!({"id": "e", "document": format!("users/{USER_ID}")})
            )
            .await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_add_radio_show_unknown_is_not_found() {
        let app = app();
        let body = json!({"id": "e", "document": format!("radio_shows/{USER_ID}")});
        assert_eq!(post(&app.router, "/add_radio_show", body).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_async_task_latest_all_enqueues_next_stage() {
        let app = app();
        let body = json!({"kind": "latest_all", "data": {"broadcasted_at": "2025-02-09T00:00:00"}});
        assert_eq!(post(&app.router, "/async_task", body).await, StatusCode::NO_CONTENT);

        let tasks = app.queue.tasks();
        assert_eq!(tasks.len(), 1);
        let Task::RunAgentAndTts { radio_show_id } = &tasks[0] else {
            panic!("unexpected task {:?}", tasks[0]);
        };

        let show_body = json!({"id": "e", "document": format!("radio_shows/{radio_show_id}")});
        assert_eq!(
            post(&app.router, "/add_radio_show", show_body.clone()).await,
            StatusCode::NO_CONTENT
        );
        let stored = app
            .documents
            .raw(&CollectionPath::root("radio_shows").doc(radio_show_id))
            .unwrap();
        assert_eq!(stored["status"], json!("created"));
        assert_eq!(post(&app.router, "/add_radio_show", show_body).await, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_async_task_unknown_kind_is_bad_request() {
        let app = app();
        assert_eq!(
            post(&app.router, "/async_task", json!({"kind": "reindex"})).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post(&app.router, "/async_task", json!({"kind": "run_agent_and_tts", "data": {}})).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "shelfcast-api");
    }
}
