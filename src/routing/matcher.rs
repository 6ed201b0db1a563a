//! Path matching logic.
//!
//! # Responsibilities
//! - Match path prefixes and exact paths (case-sensitive)
//! - Recognize static assets served without admission checks
//! - Combine conditions with OR semantics
//!
//! # Design Decisions
//! - Matchers see only the path; query strings never affect routing
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches one path exactly, ignoring a single trailing slash.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path.as_str());
        Self {
            path: trimmed.to_string(),
        }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        path == self.path
    }
}

/// Build-output assets and images, which bypass the gate.
#[derive(Debug, Clone)]
pub struct StaticAssetMatcher {
    prefixes: Vec<&'static str>,
    extensions: Vec<&'static str>,
}

impl Default for StaticAssetMatcher {
    fn default() -> Self {
        Self {
            prefixes: vec!["/_next/static", "/_next/image", "/favicon.ico"],
            extensions: vec!["svg", "png", "jpg", "jpeg", "gif", "webp"],
        }
    }
}

impl Matcher for StaticAssetMatcher {
    fn matches(&self, path: &str) -> bool {
        if self.prefixes.iter().any(|p| path.starts_with(p)) {
            return true;
        }
        let last = path.rsplit('/').next().unwrap_or(path);
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.extensions.iter().any(|e| *e == ext),
            _ => false,
        }
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// One exact matcher per listed path.
    pub fn exact_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|p| Box::new(ExactPathMatcher::new(p)) as Box<dyn Matcher>)
                .collect(),
        )
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
