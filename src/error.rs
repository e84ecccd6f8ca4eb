use crate::protocol::error_shapes::claude_error_payload;

/// Gateway error type shared by every module.
///
/// Backend HTTP failures are deliberately absent: a non-2xx backend response
/// is forwarded to the client verbatim and never becomes a `BridgeError`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol translation error: {0}")]
    Translation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    NotFound,
    Gateway,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::MalformedRequest(_) => ErrorCategory::InvalidRequest,
            BridgeError::NotFound(_) => ErrorCategory::NotFound,
            BridgeError::Transport(_) => ErrorCategory::Gateway,
            BridgeError::Config(_) | BridgeError::Translation(_) | BridgeError::Internal(_) => {
                ErrorCategory::ServerError
            }
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::MalformedRequest(err.to_string())
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::Gateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as a Claude-style error body, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    (
        http_status_for_category(cat),
        claude_error_payload(cat, &err.to_string()),
    )
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_request_maps_to_bad_request() {
        let err = BridgeError::MalformedRequest("missing messages".to_string());
        let (status, body) = format_error(&err);
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("missing messages"));
    }

    #[test]
    fn transport_failure_maps_to_bad_gateway() {
        let (status, body) = format_error(&BridgeError::Transport("connect refused".into()));
        assert_eq!(status, http::StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "api_error");
    }

    #[test]
    fn serde_failures_are_malformed_requests() {
        let err: BridgeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);
    }
}
