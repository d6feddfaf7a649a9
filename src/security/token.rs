//! Bearer token validation.
//!
//! The gateway never issues tokens; it only validates them through the
//! [`TokenValidator`] capability wired in at construction time.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::config::JwtConfig;

/// Identity decoded from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: String,
    /// May contain duplicates; consumers treat it as a set.
    pub roles: Vec<String>,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: i64,
}

/// Why a token was not accepted.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid: {0}")]
    Invalid(String),

    #[error("token validator unavailable: {0}")]
    Unavailable(String),

    #[error("token validator misconfigured: {0}")]
    Misconfigured(String),
}

/// External capability that turns a bearer token into claims.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    exp: i64,
}

/// Validates JWTs signed with HS256 (shared secret) or RS256 (public key).
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Build a validator from configuration. A public key wins over a secret.
    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let (key, algorithm) = if let Some(pem) = config.public_key_pem.as_deref() {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| TokenError::Misconfigured(format!("invalid RSA public key: {e}")))?;
            tracing::info!("JWT validation using RS256 public key");
            (key, Algorithm::RS256)
        } else if let Some(secret) = config.secret.as_deref().filter(|s| !s.trim().is_empty()) {
            tracing::info!("JWT validation using HS256 shared secret");
            (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
        } else {
            return Err(TokenError::Misconfigured(
                "set security.jwt.secret (GATEWAY_JWT_SECRET) or security.jwt.public_key_pem".into(),
            ));
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            // `iss` is only compared when present unless it is also required.
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Ok(Self { key, validation })
    }

    /// HS256 validator for a shared secret.
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Ok(TokenClaims {
            subject: data.claims.sub,
            roles: data.claims.roles,
            expires_at: data.claims.exp,
        })
    }
}
