use std::collections::HashSet;

use super::{AppConfig, ConfigError, ProviderKind};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream_services(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_upstream_services(config: &AppConfig) -> Result<(), ConfigError> {
    if config.upstream_services.is_empty() {
        return Err(validation_err("upstream_services cannot be empty"));
    }

    let mut names = HashSet::new();
    let mut defaults = 0usize;

    for svc in &config.upstream_services {
        if svc.name.trim().is_empty() {
            return Err(validation_err("upstream service name cannot be empty"));
        }
        if !names.insert(svc.name.as_str()) {
            return Err(validation_err(format!(
                "duplicate upstream service name '{}'",
                svc.name
            )));
        }
        validate_base_url(&svc.name, &svc.base_url)?;
        if svc.api_key.trim().is_empty() {
            return Err(validation_err(format!(
                "Service '{}': api_key cannot be empty",
                svc.name
            )));
        }
        if svc.provider_kind().is_none() {
            let known: Vec<_> = ProviderKind::ALL.iter().map(|kind| kind.as_str()).collect();
            return Err(validation_err(format!(
                "Service '{}': unknown provider '{}'. Must be one of: {}",
                svc.name,
                svc.provider,
                known.join(", ")
            )));
        }
        if svc.is_default {
            defaults += 1;
        }
        validate_models(&svc.name, &svc.models)?;
    }

    if defaults > 1 {
        return Err(validation_err(
            "at most one upstream service may set is_default",
        ));
    }
    Ok(())
}

fn validate_base_url(service_name: &str, base_url: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(base_url).map_err(|err| {
        validation_err(format!(
            "Service '{service_name}': base_url is not a valid URL: {err}"
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "Service '{service_name}': base_url must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_models(service_name: &str, models: &[String]) -> Result<(), ConfigError> {
    if models.is_empty() {
        return Err(validation_err(format!(
            "Service '{service_name}' must have at least one model"
        )));
    }

    let mut entries = HashSet::new();
    let mut regular = HashSet::new();
    let mut aliases = Vec::new();

    for model in models {
        if model.trim().is_empty() {
            return Err(validation_err(format!(
                "Service '{service_name}': model name cannot be empty"
            )));
        }
        if !entries.insert(model.as_str()) {
            return Err(validation_err(format!(
                "Service '{service_name}': duplicate model entry '{model}'"
            )));
        }
        match model.split_once(':') {
            Some((alias, real)) => {
                if alias.trim().is_empty() || real.trim().is_empty() {
                    return Err(validation_err(format!(
                        "Invalid alias format in '{model}'. Both parts must not be empty."
                    )));
                }
                aliases.push(alias);
            }
            None => {
                regular.insert(model.as_str());
            }
        }
    }

    if let Some(alias) = aliases.into_iter().find(|alias| regular.contains(alias)) {
        return Err(validation_err(format!(
            "Alias name '{alias}' conflicts with a regular model name"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    let format = config.features.log_format.to_ascii_lowercase();
    if !matches!(format.as_str(), "text" | "json") {
        return Err(validation_err("log_format must be 'text' or 'json'"));
    }
    Ok(())
}
