//! Route matching logic.
//!
//! # Responsibilities
//! - Match request paths against literal or prefix-wildcard patterns
//! - Match request methods against an optional allow-list
//! - Remove leading path segments before forwarding
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/prefix/**` matches `/prefix` itself and everything below it
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// Specificity tier of a pattern. Literal patterns are evaluated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    Literal,
    Wildcard,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches exactly this path.
    Exact(String),
    /// Matches the prefix and any deeper path (`/api/students/**`).
    Prefix(String),
}

impl PathPattern {
    /// Compile a configured pattern.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn specificity(&self) -> Specificity {
        match self {
            PathPattern::Exact(_) => Specificity::Literal,
            PathPattern::Prefix(_) => Specificity::Wildcard,
        }
    }

    /// Returns true if the path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
                None => false,
            },
        }
    }
}

/// Matches the request method. An empty list accepts any method.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    allowed: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(allowed: Vec<Method>) -> Self {
        Self { allowed }
    }

    pub fn matches(&self, method: &Method) -> bool {
        self.allowed.is_empty() || self.allowed.contains(method)
    }
}

/// Remove `count` leading segments from `path`, keeping a leading slash.
///
/// Stripping more segments than the path has yields `/`.
pub fn strip_segments(path: &str, count: usize) -> String {
    if count == 0 {
        return path.to_string();
    }

    let trailing_slash = path.len() > 1 && path.ends_with('/');
    let remaining: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .skip(count)
        .collect();

    if remaining.is_empty() {
        return "/".to_string();
    }

    let mut stripped = format!("/{}", remaining.join("/"));
    if trailing_slash {
        stripped.push('/');
    }
    stripped
}
