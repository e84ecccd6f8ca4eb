use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let upstreams: Vec<Value> = state
        .model_router
        .upstreams()
        .iter()
        .map(|upstream| {
            json!({
                "name": upstream.name,
                "provider": upstream.adapter.name(),
                "description": upstream.description,
            })
        })
        .collect();
    Json(json!({
        "status": "ok",
        "config": {
            "upstream_services": upstreams,
            "known_models": state.model_router.known_model_count(),
            "log_level": state.config.features.log_level,
        }
    }))
}
