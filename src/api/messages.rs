use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::CONTENT_TYPE;

use crate::adapter::{ClientRequest, ClientResponse, HttpBody};
use crate::error::BridgeError;
use crate::observability::log_request_complete;
use crate::state::AppState;

/// `POST /v1/messages`.
pub async fn handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let start_time = Instant::now();
    match handle(&state, &body, start_time).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "request failed");
            err.into_response()
        }
    }
}

async fn handle(
    state: &AppState,
    body: &[u8],
    start_time: Instant,
) -> Result<Response, BridgeError> {
    let request = ClientRequest::from_slice(body)?;
    let requested_model = request.parsed.model.clone();
    let stream = request.parsed.is_stream();

    let route = state.model_router.resolve(&requested_model)?;
    let request = request.with_model(route.model)?;
    let adapter = route.adapter();
    let backend_request =
        adapter.to_backend_request(&request, route.base_url(), route.credential())?;

    let backend_response = state.transport.send(backend_request).await?;
    let client_response = adapter.to_client_response(backend_response).await?;

    log_request_complete(
        &requested_model,
        &route.upstream.name,
        client_response.status,
        stream,
        start_time,
    );
    Ok(into_axum_response(client_response))
}

fn into_axum_response(response: ClientResponse) -> Response {
    let body = match response.body {
        HttpBody::Full(bytes) => Body::from(bytes),
        HttpBody::Stream(stream) => Body::from_stream(stream),
    };
    (
        response.status,
        [(CONTENT_TYPE, response.content_type)],
        body,
    )
        .into_response()
}
