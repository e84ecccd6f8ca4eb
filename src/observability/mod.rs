use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level and format.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
///
/// `log_format` selects `json` output; anything else is human-readable text.
pub fn init_tracing(log_level: &str, log_format: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

fn tracing_directive(log_level: &str) -> Option<&'static str> {
    match log_level.to_uppercase().as_str() {
        "DISABLED" => None,
        "DEBUG" => Some("DEBUG"),
        "WARNING" => Some("WARN"),
        "ERROR" | "CRITICAL" => Some("ERROR"),
        _ => Some("INFO"),
    }
}

/// Log one finished client request.
///
/// For streamed responses this fires when the response head is sent; the
/// stream driver logs its stop reason and usage at debug when it closes.
pub fn log_request_complete(
    model: &str,
    upstream: &str,
    status: http::StatusCode,
    stream: bool,
    start_time: Instant,
) {
    tracing::info!(
        model,
        upstream,
        status = status.as_u16(),
        stream,
        elapsed_ms = start_time.elapsed().as_millis(),
        "request complete"
    );
}
