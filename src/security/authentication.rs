//! Authentication stage.
//!
//! # Responsibilities
//! - Let public endpoints through without a header check
//! - Require `Authorization: Bearer <token>` everywhere else
//! - Validate the token and inject `X-User-Id` / `X-User-Roles`
//!
//! # Design Decisions
//! - Client-supplied identity headers are always dropped first
//! - The stage keeps no state between requests

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderValue};

use crate::config::SecurityConfig;
use crate::error::{AuthenticationError, GatewayError};
use crate::pipeline::context::{RequestContext, X_USER_ID, X_USER_ROLES};
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::routing::Route;
use crate::security::token::{TokenError, TokenValidator};

const BEARER_PREFIX: &str = "Bearer ";

/// Validates bearer tokens and attaches the caller's identity.
pub struct AuthenticationStage {
    validator: Arc<dyn TokenValidator>,
    public_paths: Vec<String>,
    forward_authorization: bool,
}

impl AuthenticationStage {
    pub fn new(validator: Arc<dyn TokenValidator>, config: &SecurityConfig) -> Self {
        Self {
            validator,
            public_paths: config.public_paths.clone(),
            forward_authorization: config.forward_authorization,
        }
    }

    /// True if the path contains any configured public substring.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.contains(p.as_str()))
    }

    fn reject(&self, ctx: &RequestContext, error: AuthenticationError, detail: &str) -> GatewayError {
        tracing::error!(
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            path = %ctx.original_path,
            reason = %error,
            detail,
            "Authentication rejected"
        );
        error.into()
    }
}

#[async_trait]
impl Stage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn apply(&self, route: &Route, ctx: RequestContext) -> Result<StageOutcome, GatewayError> {
        let ctx = ctx.without_identity_headers();

        if !route.authenticate || self.is_public(&ctx.original_path) {
            tracing::debug!(path = %ctx.original_path, route = %route.id, "Public endpoint, skipping authentication");
            return Ok(StageOutcome::Continue(ctx));
        }

        let Some(header) = ctx.headers.get(AUTHORIZATION) else {
            return Err(self.reject(&ctx, AuthenticationError::MissingHeader, "no header"));
        };
        let token = match header.to_str().ok().and_then(|v| v.strip_prefix(BEARER_PREFIX)) {
            Some(token) => token.trim().to_string(),
            None => {
                return Err(self.reject(&ctx, AuthenticationError::MalformedScheme, "not a bearer credential"))
            }
        };

        let claims = match self.validator.validate(&token).await {
            Ok(claims) => claims,
            Err(e @ (TokenError::Expired | TokenError::Invalid(_))) => {
                return Err(self.reject(&ctx, AuthenticationError::InvalidToken, &e.to_string()))
            }
            Err(e) => {
                return Err(self.reject(&ctx, AuthenticationError::ValidatorFailure, &e.to_string()))
            }
        };

        let roles = claims.roles.join(",");
        let (Ok(user_id), Ok(user_roles)) = (
            HeaderValue::from_str(&claims.subject),
            HeaderValue::from_str(&roles),
        ) else {
            return Err(self.reject(
                &ctx,
                AuthenticationError::InvalidToken,
                "claims are not representable as header values",
            ));
        };

        tracing::info!(
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            subject = %claims.subject,
            roles = ?claims.roles,
            "User authenticated"
        );

        let mut ctx = ctx
            .with_header(X_USER_ID, user_id)
            .with_header(X_USER_ROLES, user_roles);
        if !self.forward_authorization {
            ctx.headers.remove(AUTHORIZATION);
        }
        Ok(StageOutcome::Continue(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::pipeline::testing::{context, route, CountingValidator};
    use crate::security::token::tests::{token, SECRET};
    use crate::security::token::JwtValidator;

    fn stage() -> AuthenticationStage {
        AuthenticationStage::new(
            Arc::new(JwtValidator::hs256(SECRET)),
            &GatewayConfig::default().security,
        )
    }

    fn expect_continue(outcome: Result<StageOutcome, GatewayError>) -> RequestContext {
        match outcome {
            Ok(StageOutcome::Continue(ctx)) => ctx,
            other => panic!("expected continue, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_header() {
        let result = stage()
            .apply(&route("/api/students/**", &["ADMIN"]), context("/api/students/5", &[]))
            .await;
        assert!(matches!(
            result,
            Err(GatewayError::Authentication(AuthenticationError::MissingHeader))
        ));
    }

    #[tokio::test]
    async fn test_malformed_scheme() {
        let ctx = context("/api/students/5", &[("authorization", "Basic dXNlcjpwYXNz")]);
        let result = stage().apply(&route("/api/students/**", &["ADMIN"]), ctx).await;
        assert!(matches!(
            result,
            Err(GatewayError::Authentication(AuthenticationError::MalformedScheme))
        ));
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let ctx = context("/api/students/5", &[("authorization", "Bearer nope")]);
        let result = stage().apply(&route("/api/students/**", &["ADMIN"]), ctx).await;
        assert!(matches!(
            result,
            Err(GatewayError::Authentication(AuthenticationError::InvalidToken))
        ));
    }

    #[tokio::test]
    async fn test_validator_failure() {
        let validator = Arc::new(CountingValidator::unavailable());
        let stage = AuthenticationStage::new(validator.clone(), &GatewayConfig::default().security);
        let ctx = context("/api/students/5", &[("authorization", "Bearer anything")]);

        let result = stage.apply(&route("/api/students/**", &[]), ctx).await;
        assert!(matches!(
            result,
            Err(GatewayError::Authentication(AuthenticationError::ValidatorFailure))
        ));
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_valid_token_injects_identity() {
        let bearer = format!("Bearer {}", token("alice", &["ADMIN", "TEACHER"], 3600));
        let ctx = context(
            "/api/students/5",
            &[("authorization", bearer.as_str()), ("x-user-roles", "FORGED")],
        );

        let ctx = expect_continue(stage().apply(&route("/api/students/**", &["ADMIN"]), ctx).await);
        assert_eq!(ctx.header_str("x-user-id"), Some("alice"));
        assert_eq!(ctx.header_str("x-user-roles"), Some("ADMIN,TEACHER"));
        assert!(ctx.header_str("authorization").is_some());
    }

    #[tokio::test]
    async fn test_public_path_skips_header_check() {
        let validator = Arc::new(CountingValidator::unavailable());
        let stage = AuthenticationStage::new(validator.clone(), &GatewayConfig::default().security);
        let ctx = context("/api/auth/login", &[("x-user-id", "mallory")]);

        let ctx = expect_continue(stage.apply(&route("/api/auth/**", &[]), ctx).await);
        assert!(ctx.header_str("x-user-id").is_none());
        assert_eq!(validator.calls(), 0);
    }

    #[tokio::test]
    async fn test_authorization_header_can_be_dropped() {
        let mut security = GatewayConfig::default().security;
        security.forward_authorization = false;
        let stage = AuthenticationStage::new(Arc::new(JwtValidator::hs256(SECRET)), &security);
        let bearer = format!("Bearer {}", token("alice", &["ADMIN"], 3600));
        let ctx = context("/api/auth/me", &[("authorization", bearer.as_str())]);

        let ctx = expect_continue(stage.apply(&route("/api/auth/me", &[]), ctx).await);
        assert!(ctx.header_str("authorization").is_none());
        assert_eq!(ctx.header_str("x-user-id"), Some("alice"));
    }
}
