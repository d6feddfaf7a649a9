//! Per-request context passed between stages.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request};

use crate::http::request::RequestId;

/// Identity headers injected by the authentication stage.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");

/// Everything a stage needs to know about one request.
///
/// Headers are an owned copy of the inbound headers; stages consume the
/// context and hand a derived one onward, so the inbound request is never
/// mutated in place.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Path as received by the gateway.
    pub original_path: String,
    /// Path after prefix stripping; this is what the upstream sees.
    pub forward_path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub request_id: Option<String>,
    pub client_addr: Option<SocketAddr>,
}

impl RequestContext {
    /// Build a context from an inbound request and the stripped path.
    pub fn from_request(request: Request<Body>, forward_path: String) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body, forward_path)
    }

    fn from_parts(parts: Parts, body: Body, forward_path: String) -> Self {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.as_str().to_string());
        let client_addr = parts
            .extensions
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Self {
            method: parts.method,
            original_path: parts.uri.path().to_string(),
            forward_path,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
            request_id,
            client_addr,
        }
    }

    /// First value of a header as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Return a copy of this context with an extra header set.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Remove identity headers the client may have supplied itself.
    pub fn without_identity_headers(mut self) -> Self {
        self.headers.remove(&X_USER_ID);
        self.headers.remove(&X_USER_ROLES);
        self
    }

    /// Path plus query as sent upstream.
    pub fn forward_path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.forward_path, q),
            None => self.forward_path.clone(),
        }
    }
}
