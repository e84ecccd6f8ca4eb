use crate::error::ErrorCategory;

fn claude_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::NotFound => "not_found_error",
        ErrorCategory::Gateway | ErrorCategory::ServerError => "api_error",
    }
}

#[must_use]
pub(crate) fn claude_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "error": {
            "type": claude_error_type(cat),
            "message": message,
        }
    })
}
