//! Static table of which routes need a token and which roles they accept.

use std::collections::HashMap;

use axum::http::Method;

use super::authorize::RolePredicate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Reachable without a token; the handler sees no identity.
    Public,
    /// Needs a valid token whose roles satisfy the predicate.
    Protected(RolePredicate),
}

/// Keyed by method and the router's path template (`/missions/{id}`, not the concrete path).
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    entries: HashMap<(Method, String), RouteAccess>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(self, method: Method, path: &str) -> Self {
        self.with(method, path, RouteAccess::Public)
    }

    pub fn protect(self, method: Method, path: &str, predicate: RolePredicate) -> Self {
        self.with(method, path, RouteAccess::Protected(predicate))
    }

    pub fn with(mut self, method: Method, path: &str, access: RouteAccess) -> Self {
        self.entries.insert((method, path.to_string()), access);
        self
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<&RouteAccess> {
        self.entries.get(&(method.clone(), path.to_string()))
    }
}
