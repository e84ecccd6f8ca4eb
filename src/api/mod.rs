pub mod health;
pub mod messages;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the HTTP router: `POST /v1/messages` and `GET /health`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/messages", post(messages::handler))
        .route("/health", get(health::health_handler))
        .with_state(state)
}
