//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Validation is a pure
//! function returning every error found, not just the first.

use std::collections::{HashMap, HashSet};
use std::fmt;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a host:port address", config.listener.bind_address),
        ));
    }

    let mut upstream_names = HashSet::new();
    for upstream in &config.upstreams {
        if !upstream_names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::new(
                format!("upstreams.{}", upstream.name),
                "duplicate upstream name",
            ));
        }
        match Url::parse(&upstream.url) {
            Ok(url) if url.scheme() == "http" && url.host().is_some() && url.query().is_none() => {}
            _ => errors.push(ValidationError::new(
                format!("upstreams.{}.url", upstream.name),
                format!("'{}' is not an absolute http URL", upstream.url),
            )),
        }
    }

    let mut route_ids = HashSet::new();
    let mut policy_per_upstream: HashMap<&str, Option<&str>> = HashMap::new();
    for route in &config.routes {
        let field = format!("routes.{}", route.id);

        if !route_ids.insert(route.id.as_str()) {
            errors.push(ValidationError::new(&field, "duplicate route id"));
        }
        if !route.path.starts_with('/') {
            errors.push(ValidationError::new(format!("{field}.path"), "must start with '/'"));
        }
        if let Some(pos) = route.path.find('*') {
            if !route.path.ends_with("/**") || pos != route.path.len() - 2 {
                errors.push(ValidationError::new(
                    format!("{field}.path"),
                    "wildcards are only supported as a trailing '/**'",
                ));
            }
        }
        for method in &route.methods {
            if method.parse::<axum::http::Method>().is_err() {
                errors.push(ValidationError::new(
                    format!("{field}.methods"),
                    format!("'{method}' is not an HTTP method"),
                ));
            }
        }
        if !upstream_names.contains(route.upstream.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.upstream"),
                format!("unknown upstream '{}'", route.upstream),
            ));
        }
        if let Some(policy) = &route.circuit_breaker {
            if !config.circuit_breakers.contains_key(policy) {
                errors.push(ValidationError::new(
                    format!("{field}.circuit_breaker"),
                    format!("unknown circuit breaker policy '{policy}'"),
                ));
            }
        }

        let policy = route.circuit_breaker.as_deref();
        match policy_per_upstream.get(route.upstream.as_str()) {
            Some(existing) if *existing != policy => errors.push(ValidationError::new(
                format!("{field}.circuit_breaker"),
                format!(
                    "upstream '{}' is already guarded by a different breaker policy",
                    route.upstream
                ),
            )),
            Some(_) => {}
            None => {
                policy_per_upstream.insert(route.upstream.as_str(), policy);
            }
        }
    }

    for (name, policy) in &config.circuit_breakers {
        let field = format!("circuit_breakers.{name}");
        if policy.failure_threshold == 0 {
            errors.push(ValidationError::new(&field, "failure_threshold must be > 0"));
        }
        if policy.half_open_trials == 0 {
            errors.push(ValidationError::new(&field, "half_open_trials must be > 0"));
        }
        if policy.success_threshold == 0 || policy.success_threshold > policy.half_open_trials {
            errors.push(ValidationError::new(
                &field,
                "success_threshold must be between 1 and half_open_trials",
            ));
        }
        for code in &policy.failure_status_codes {
            if !(100..=599).contains(code) {
                errors.push(ValidationError::new(
                    &field,
                    format!("{code} is not an HTTP status code"),
                ));
            }
        }
    }

    if !matches!(config.security.missing_roles_status, 401 | 403) {
        errors.push(ValidationError::new(
            "security.missing_roles_status",
            "must be 401 or 403",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Socket address or `host:port`; hostnames are resolved when binding.
fn is_bind_address(address: &str) -> bool {
    if address.parse::<std::net::SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && port.parse::<u16>().is_ok()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BreakerPolicy, RouteConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_bind_address_accepts_hostnames() {
        for address in ["localhost:8080", "gateway.internal:80", "[::1]:8080", "0.0.0.0:0"] {
            let mut config = GatewayConfig::default();
            config.listener.bind_address = address.into();
            assert_eq!(validate_config(&config), Ok(()), "{address}");
        }
        for address in ["localhost", ":8080", "localhost:http", "a b:80"] {
            let mut config = GatewayConfig::default();
            config.listener.bind_address = address.into();
            assert!(validate_config(&config).is_err(), "{address}");
        }
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.routes.push(RouteConfig::new("ghost", "/api/ghost/**", "ghost-service"));
        config.routes.push(RouteConfig::new("bad-glob", "/api/*/x", "auth-service"));
        config.security.missing_roles_status = 500;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"routes.ghost.upstream"));
        assert!(fields.contains(&"routes.bad-glob.path"));
        assert!(fields.contains(&"security.missing_roles_status"));
    }

    #[test]
    fn test_conflicting_breaker_policies_on_one_upstream() {
        let mut config = GatewayConfig::default();
        config
            .circuit_breakers
            .insert("other".into(), BreakerPolicy::default());
        config.routes.push(
            RouteConfig::new("auth-extra", "/api/login/**", "auth-service").with_circuit_breaker("other"),
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes.auth-extra.circuit_breaker");
    }

    #[test]
    fn test_breaker_thresholds() {
        let mut config = GatewayConfig::default();
        config.circuit_breakers.insert(
            "broken".into(),
            BreakerPolicy {
                failure_threshold: 0,
                half_open_trials: 1,
                success_threshold: 2,
                ..BreakerPolicy::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
