use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::adapter::{adapter_for, ProviderAdapter};
use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::protocol::SchemaSanitizer;

/// One configured upstream with its adapter already built.
pub struct Upstream {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub credential: String,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

/// The resolved target for a request: adapter, base URL, credential and the
/// model name the backend should receive.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRoute<'a> {
    pub upstream: &'a Upstream,
    pub model: &'a str,
}

impl ResolvedRoute<'_> {
    #[must_use]
    pub fn adapter(&self) -> &dyn ProviderAdapter {
        self.upstream.adapter.as_ref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.upstream.base_url
    }

    #[must_use]
    pub fn credential(&self) -> &str {
        &self.upstream.credential
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    upstream_index: usize,
    real_model: Arc<str>,
}

/// Pre-built model router indexing every upstream model and alias.
#[derive(Debug)]
pub struct ModelRouter {
    upstreams: Vec<Upstream>,
    /// Requested model name (or alias) to its first registered candidate.
    model_index: FxHashMap<String, Candidate>,
    default_upstream: Option<usize>,
}

impl ModelRouter {
    /// Build a `ModelRouter` from the application configuration.
    ///
    /// When several upstreams list the same model, the first one wins.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when a service names an unknown provider.
    pub fn new(
        config: &AppConfig,
        sanitizer: &Arc<dyn SchemaSanitizer>,
    ) -> Result<Self, BridgeError> {
        let mut upstreams = Vec::with_capacity(config.upstream_services.len());
        let mut model_index: FxHashMap<String, Candidate> = FxHashMap::default();
        let mut default_upstream = None;

        for (idx, svc) in config.upstream_services.iter().enumerate() {
            let provider = svc.provider_kind().ok_or_else(|| {
                BridgeError::Config(format!(
                    "Service '{}': unknown provider '{}'",
                    svc.name, svc.provider
                ))
            })?;
            upstreams.push(Upstream {
                name: svc.name.clone(),
                description: svc.description.clone(),
                base_url: svc.base_url.clone(),
                credential: svc.api_key.clone(),
                adapter: adapter_for(provider, Arc::clone(sanitizer)),
            });
            if svc.is_default && default_upstream.is_none() {
                default_upstream = Some(idx);
            }

            for entry in svc.models.iter().map(String::as_str) {
                let (requested, real) = entry.split_once(':').unwrap_or((entry, entry));
                model_index
                    .entry(requested.to_string())
                    .or_insert_with(|| Candidate {
                        upstream_index: idx,
                        real_model: Arc::from(real),
                    });
            }
        }

        Ok(Self {
            upstreams,
            model_index,
            default_upstream,
        })
    }

    #[must_use]
    pub fn upstreams(&self) -> &[Upstream] {
        &self.upstreams
    }

    #[must_use]
    pub fn known_model_count(&self) -> usize {
        self.model_index.len()
    }

    /// Resolve the upstream and backend model for a requested model.
    ///
    /// Resolution order:
    /// 1. Exact model or alias match in the index.
    /// 2. The default upstream, with the model name passed through.
    /// 3. No match: [`BridgeError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] when no route can be resolved.
    pub fn resolve<'a>(&'a self, model: &'a str) -> Result<ResolvedRoute<'a>, BridgeError> {
        if let Some(candidate) = self.model_index.get(model) {
            let upstream = self.upstream(candidate.upstream_index)?;
            tracing::debug!(
                model,
                upstream = %upstream.name,
                backend_model = %candidate.real_model,
                "resolved model route"
            );
            return Ok(ResolvedRoute {
                upstream,
                model: candidate.real_model.as_ref(),
            });
        }

        if let Some(idx) = self.default_upstream {
            let upstream = self.upstream(idx)?;
            tracing::debug!(
                model,
                upstream = %upstream.name,
                "routing unknown model to default upstream"
            );
            return Ok(ResolvedRoute { upstream, model });
        }

        Err(BridgeError::NotFound(format!(
            "No upstream found for model '{model}'"
        )))
    }

    fn upstream(&self, idx: usize) -> Result<&Upstream, BridgeError> {
        self.upstreams
            .get(idx)
            .ok_or_else(|| BridgeError::Internal(format!("upstream index {idx} out of range")))
    }
}
