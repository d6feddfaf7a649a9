//! Authorization stage: role-based access control per route.

use std::collections::BTreeSet;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::config::SecurityConfig;
use crate::error::{AuthorizationError, GatewayError};
use crate::pipeline::context::{RequestContext, X_USER_ROLES};
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::routing::Route;

/// Compares `X-User-Roles` with the route's required roles.
pub struct AuthorizationStage {
    missing_roles_status: StatusCode,
}

impl AuthorizationStage {
    pub fn new(config: &SecurityConfig) -> Self {
        let missing_roles_status =
            StatusCode::from_u16(config.missing_roles_status).unwrap_or(StatusCode::UNAUTHORIZED);
        Self {
            missing_roles_status,
        }
    }
}

/// Split a comma-joined roles header into a set.
pub fn parse_roles(header: &str) -> BTreeSet<&str> {
    header
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect()
}

#[async_trait]
impl Stage for AuthorizationStage {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn apply(&self, route: &Route, ctx: RequestContext) -> Result<StageOutcome, GatewayError> {
        if route.is_unrestricted() {
            return Ok(StageOutcome::Continue(ctx));
        }

        let user_roles = ctx
            .headers
            .get(X_USER_ROLES)
            .and_then(|v| v.to_str().ok())
            .map(parse_roles)
            .unwrap_or_default();

        if user_roles.is_empty() {
            tracing::error!(
                route = %route.id,
                path = %ctx.original_path,
                "Authorization error: missing user roles"
            );
            return Err(AuthorizationError::MissingRolesHeader {
                status: self.missing_roles_status,
            }
            .into());
        }

        let allowed = route
            .required_roles
            .iter()
            .any(|required| user_roles.contains(required.as_str()));

        if !allowed {
            tracing::info!(
                route = %route.id,
                user_roles = ?user_roles,
                required = ?route.required_roles,
                "User roles denied"
            );
            return Err(AuthorizationError::InsufficientRoles.into());
        }

        tracing::info!(
            route = %route.id,
            user_roles = ?user_roles,
            required = ?route.required_roles,
            "User roles allowed"
        );
        Ok(StageOutcome::Continue(ctx))
    }
}
