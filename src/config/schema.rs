//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file yields the stock route table.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend services the gateway forwards to.
    pub upstreams: Vec<UpstreamConfig>,

    /// Route definitions, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Named circuit breaker policies referenced by routes.
    pub circuit_breakers: BTreeMap<String, BreakerPolicy>,

    /// Authentication and authorization settings.
    pub security: SecurityConfig,

    /// Upstream timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut circuit_breakers = BTreeMap::new();
        circuit_breakers.insert("authService".to_string(), BreakerPolicy::default());
        circuit_breakers.insert("studentService".to_string(), BreakerPolicy::default());

        Self {
            listener: ListenerConfig::default(),
            upstreams: vec![
                UpstreamConfig::new("auth-service", "http://localhost:8081").with_fallback_message(
                    "The authentication service is temporarily unavailable. Please try again in a few moments.",
                ),
                UpstreamConfig::new("student-service", "http://localhost:8082").with_fallback_message(
                    "The student service is temporarily unavailable. Please try again in a few moments.",
                ),
                UpstreamConfig::new("teacher-service", "http://localhost:8083"),
                UpstreamConfig::new("classroom-service", "http://localhost:8084"),
                UpstreamConfig::new("course-service", "http://localhost:8085"),
            ],
            routes: vec![
                RouteConfig::new("auth-service-me", "/api/auth/me", "auth-service")
                    .with_circuit_breaker("authService"),
                RouteConfig::new("auth-service", "/api/auth/**", "auth-service")
                    .with_circuit_breaker("authService"),
                RouteConfig::new("student-service", "/api/students/**", "student-service")
                    .with_roles(&["ADMIN"])
                    .with_circuit_breaker("studentService"),
                RouteConfig::new("teacher-service", "/api/teachers/**", "teacher-service")
                    .with_roles(&["ADMIN"]),
                RouteConfig::new("classroom-service", "/api/classrooms/**", "classroom-service")
                    .with_roles(&["ADMIN"]),
                RouteConfig::new("discipline-service", "/api/disciplines/**", "classroom-service")
                    .with_roles(&["ADMIN"]),
                RouteConfig::new("course-service", "/api/courses/**", "course-service")
                    .with_roles(&["ADMIN"]),
            ],
            circuit_breakers,
            security: SecurityConfig::default(),
            timeouts: TimeoutConfig::default(),
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Look up an upstream by name.
    pub fn upstream(&self, name: &str) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A backend service the gateway forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream name; also the circuit breaker key and fallback service name.
    pub name: String,

    /// Base URL (e.g., "http://student-service:8080").
    pub url: String,

    /// Message returned by the fallback responder for this upstream.
    #[serde(default)]
    pub fallback_message: Option<String>,
}

impl UpstreamConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fallback_message: None,
        }
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }
}

/// Route configuration mapping a path pattern to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub id: String,

    /// Literal path or prefix wildcard ending in `/**`.
    pub path: String,

    /// Allowed methods; empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Number of leading path segments removed before forwarding.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: usize,

    /// Upstream name to forward to.
    pub upstream: String,

    /// Whether the authentication stage applies to this route.
    #[serde(default = "default_true")]
    pub authenticate: bool,

    /// Roles of which the caller must hold at least one. Empty = no restriction.
    #[serde(default)]
    pub required_roles: Vec<String>,

    /// Name of the circuit breaker policy guarding this route, if any.
    #[serde(default)]
    pub circuit_breaker: Option<String>,
}

impl RouteConfig {
    pub fn new(id: impl Into<String>, path: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            methods: Vec::new(),
            strip_prefix: default_strip_prefix(),
            upstream: upstream.into(),
            authenticate: true,
            required_roles: Vec::new(),
            circuit_breaker: None,
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.required_roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_circuit_breaker(mut self, policy: impl Into<String>) -> Self {
        self.circuit_breaker = Some(policy.into());
        self
    }
}

fn default_strip_prefix() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Circuit breaker policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerPolicy {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,

    /// A failure arriving this long after the previous one restarts the count.
    pub failure_window_secs: u64,

    /// Time the breaker stays open before allowing trial requests.
    pub open_duration_ms: u64,

    /// Trial requests admitted while half-open.
    pub half_open_trials: u32,

    /// Trial successes required to close the breaker.
    pub success_threshold: u32,

    /// Upstream statuses counted as failures.
    pub failure_status_codes: Vec<u16>,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window_secs: 60,
            open_duration_ms: 10_000,
            half_open_trials: 1,
            success_threshold: 1,
            failure_status_codes: vec![500, 502, 503, 504],
        }
    }
}

impl BreakerPolicy {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }
}

/// Authentication and authorization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Path substrings that bypass authentication.
    pub public_paths: Vec<String>,

    /// Status returned when a protected route sees no role claim (401 or 403).
    pub missing_roles_status: u16,

    /// Keep the inbound Authorization header on the upstream request.
    pub forward_authorization: bool,

    /// Token validation settings.
    pub jwt: JwtConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            public_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/actuator".to_string(),
                "/swagger".to_string(),
                "/api-docs".to_string(),
            ],
            missing_roles_status: 401,
            forward_authorization: true,
            jwt: JwtConfig::default(),
        }
    }
}

/// JWT validation settings. Exactly one of `secret` or `public_key_pem` is used.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 shared secret.
    pub secret: Option<String>,

    /// RS256 public key in PEM form. Takes precedence over `secret`.
    pub public_key_pem: Option<String>,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Clock skew tolerance for `exp`.
    pub leeway_secs: u64,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream request timeout (until response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    /// `*` allows any header.
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:4200".to_string(),
                "http://localhost:8080".to_string(),
            ],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
