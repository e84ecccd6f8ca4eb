use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::protocol::{IdentitySanitizer, SchemaSanitizer};
use crate::routing::ModelRouter;
use crate::transport::HttpTransport;

/// Shared application state accessible to all handlers.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub model_router: ModelRouter,
}

impl AppState {
    /// Build state with the default pass-through schema sanitizer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when the router or HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, BridgeError> {
        Self::with_sanitizer(config, Arc::new(IdentitySanitizer))
    }

    /// Build state with a caller-supplied tool schema sanitizer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when the router or HTTP client cannot be built.
    pub fn with_sanitizer(
        config: AppConfig,
        sanitizer: Arc<dyn SchemaSanitizer>,
    ) -> Result<Self, BridgeError> {
        let model_router = ModelRouter::new(&config, &sanitizer)?;
        let transport = HttpTransport::new(&config.server)?;
        Ok(Self {
            config,
            transport,
            model_router,
        })
    }
}
