//! In-process doubles shared by unit tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use parking_lot::Mutex;

use crate::proxy::client::{UpstreamClient, UpstreamError};
use crate::routing::matcher::{strip_segments, MethodMatcher, PathPattern};
use crate::routing::Route;
use crate::security::token::{TokenClaims, TokenError, TokenValidator};

use super::context::RequestContext;

/// Context for `path_and_query` with one leading segment stripped.
pub fn context(path_and_query: &str, headers: &[(&str, &str)]) -> RequestContext {
    let mut builder = Request::builder().uri(path_and_query);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).unwrap();
    let forward = strip_segments(request.uri().path(), 1);
    RequestContext::from_request(request, forward)
}

/// Route on `student-service` that accepts any method.
pub fn route(pattern: &str, roles: &[&str]) -> Route {
    Route {
        id: pattern.to_string(),
        pattern: PathPattern::parse(pattern),
        methods: MethodMatcher::new(Vec::new()),
        strip_prefix: 1,
        upstream: "student-service".to_string(),
        upstream_url: "http://127.0.0.1:1".parse().unwrap(),
        authenticate: true,
        required_roles: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
        circuit_breaker: None,
    }
}

/// Validator double that counts calls.
///
/// In accepting mode a token `subject:ROLE_A,ROLE_B` yields those claims and
/// `expired` yields [`TokenError::Expired`].
pub struct CountingValidator {
    available: bool,
    calls: AtomicUsize,
}

impl CountingValidator {
    pub fn accepting() -> Self {
        Self {
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenValidator for CountingValidator {
    async fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(TokenError::Unavailable("identity provider down".into()));
        }
        if token == "expired" {
            return Err(TokenError::Expired);
        }
        let (subject, roles) = token
            .split_once(':')
            .ok_or_else(|| TokenError::Invalid("unrecognised test token".into()))?;
        Ok(TokenClaims {
            subject: subject.to_string(),
            roles: roles
                .split(',')
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
            expires_at: i64::MAX,
        })
    }
}

/// A request as seen by [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, Copy)]
enum Scripted {
    Status(StatusCode),
    TransportError,
}

/// Upstream double answering from a script, then with its default.
pub struct MockUpstream {
    script: Mutex<VecDeque<Scripted>>,
    default: Scripted,
    recorded: Mutex<Vec<RecordedRequest>>,
}

impl MockUpstream {
    /// Answers with `statuses` in order, then 200.
    pub fn with_statuses(statuses: &[StatusCode]) -> Self {
        Self {
            script: Mutex::new(statuses.iter().copied().map(Scripted::Status).collect()),
            default: Scripted::Status(StatusCode::OK),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails at the transport level.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Scripted::TransportError,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        self.recorded.lock().push(RecordedRequest {
            method: request.method().clone(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
        });

        let next = self.script.lock().pop_front().unwrap_or(self.default);
        match next {
            Scripted::Status(status) => Ok(Response::builder()
                .status(status)
                .header("x-upstream", "mock")
                .body(Body::from(format!("upstream:{}", status.as_u16())))
                .unwrap()),
            Scripted::TransportError => Err(UpstreamError::Transport("connection refused".into())),
        }
    }
}
