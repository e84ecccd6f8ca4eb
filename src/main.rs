use std::sync::Arc;

use claude_bridge::api::build_router;
use claude_bridge::config::{load_config, AppConfig};
use claude_bridge::observability::init_tracing;
use claude_bridge::state::AppState;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level, &config.features.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(run(config));
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;

    let state = AppState::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize gateway: {e}");
        std::process::exit(1);
    });
    let upstream_count = state.model_router.upstreams().len();
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!(%host, port, upstream_count, "claude-bridge is ready to accept connections");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server terminated");
    }
}
