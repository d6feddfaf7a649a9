//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration.
///
/// A missing path yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            parse_config(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML without validating.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `GATEWAY_*` overrides using the given variable lookup.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(secret) = lookup("GATEWAY_JWT_SECRET") {
        config.security.jwt.secret = Some(secret);
    }
    for upstream in &mut config.upstreams {
        let key = format!(
            "GATEWAY_UPSTREAM_{}_URL",
            upstream.name.to_uppercase().replace('-', "_")
        );
        if let Some(url) = lookup(&key) {
            tracing::debug!(upstream = %upstream.name, url = %url, "Upstream URL overridden from environment");
            upstream.url = url;
        }
    }
}
