//! Startup preflight.
//!
//! # Responsibilities
//! - Build the runtime pieces that can still fail after config validation
//! - Give `--check` the same verdict a real start would
//!
//! # Design Decisions
//! - Fail fast: any error here is fatal and reported before the listener binds

use std::sync::Arc;

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::routing::{RouteTable, RouteTableError};
use crate::security::{JwtValidator, TokenError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Routes(#[from] RouteTableError),
}

/// Build the token validator and compile the route table.
pub fn prepare(config: &GatewayConfig) -> Result<Arc<JwtValidator>, StartupError> {
    let validator = JwtValidator::from_config(&config.security.jwt)?;
    let routes = RouteTable::from_config(config)?;
    tracing::debug!(routes = routes.len(), "Route table compiled");
    Ok(Arc::new(validator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn with_secret() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.security.jwt.secret = Some("startup-secret".into());
        config
    }

    #[test]
    fn test_default_config_without_key_fails() {
        let result = prepare(&GatewayConfig::default());
        assert!(matches!(
            result,
            Err(StartupError::Token(TokenError::Misconfigured(_)))
        ));
    }

    #[test]
    fn test_default_config_with_secret_passes() {
        assert!(prepare(&with_secret()).is_ok());
    }

    #[test]
    fn test_malformed_public_key_fails() {
        let mut config = with_secret();
        config.security.jwt.public_key_pem = Some("not a pem".into());
        assert!(matches!(
            prepare(&config),
            Err(StartupError::Token(TokenError::Misconfigured(_)))
        ));
    }

    #[test]
    fn test_unknown_upstream_fails() {
        let mut config = with_secret();
        config
            .routes
            .push(RouteConfig::new("library", "/api/library/**", "library-service"));
        assert!(matches!(prepare(&config), Err(StartupError::Routes(_))));
    }
}
