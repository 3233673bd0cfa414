use std::sync::Arc;

use crate::workflow::Workflows;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline stages, built once in `main` over the live collaborators.
    pub workflows: Arc<Workflows>,
}
