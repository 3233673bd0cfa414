pub mod events;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Document-created events
        .route("/add_user", post(events::handle_add_user))
        .route("/add_radio_show", post(events::handle_add_radio_show))
        // Scheduled and chained pipeline stages
        .route("/async_task", post(events::handle_async_task))
        .with_state(state)
}
