//! Header rules for requests forwarded upstream.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (and any named by `Connection`)
//! - Drop `Host` so the client sets the upstream authority
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host, X-Forwarded-Prefix
//!
//! # Design Decisions
//! - Preserve the client IP chain in X-Forwarded-For (append, never replace)
//! - Identity headers set by the stages pass through untouched

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

/// Remove hop-by-hop headers, including those listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Rewrite inbound headers for the upstream request.
pub fn prepare_upstream_headers(
    headers: &mut HeaderMap,
    client_addr: Option<SocketAddr>,
    stripped_prefix: &str,
) {
    strip_hop_by_hop(headers);

    if let Some(host) = headers.remove(header::HOST) {
        if !headers.contains_key(&X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    if !stripped_prefix.is_empty() {
        if let Ok(value) = HeaderValue::from_str(stripped_prefix) {
            headers.insert(X_FORWARDED_PREFIX, value);
        }
    }
}

/// The leading part of `original` removed to produce `forwarded`.
pub fn stripped_prefix<'a>(original: &'a str, forwarded: &str) -> &'a str {
    if forwarded == "/" {
        return original.trim_end_matches('/');
    }
    original.strip_suffix(forwarded).unwrap_or("")
}
