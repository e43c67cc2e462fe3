//! APIRouter for grouping routes under a shared prefix.
//!
//! ```ignore
//! let demos = APIRouter::new()
//!     .prefix("/demos")
//!     .post("/body-api", handler!(body_api));
//!
//! let app = App::builder().include_router(demos).build()?;
//! ```

use crate::app::RouteEntry;
use apikit_core::{BoxFuture, Method, Request, RequestContext, Response};

/// A group of routes mounted together.
#[derive(Debug, Default, Clone)]
pub struct APIRouter {
    prefix: String,
    routes: Vec<RouteEntry>,
}

impl APIRouter {
    /// Create an empty router with no prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path prefix. A missing leading `/` is added and a trailing
    /// `/` is dropped.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// The normalized prefix (empty when unset).
    #[must_use]
    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    /// Add a route.
    #[must_use]
    pub fn route<H>(mut self, method: Method, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.routes.push(RouteEntry::new(method, path, handler));
        self
    }

    /// Add a GET route.
    #[must_use]
    pub fn get<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    /// Add a POST route.
    #[must_use]
    pub fn post<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Post, path, handler)
    }

    /// Nest another router; its prefix is appended to this one's.
    #[must_use]
    pub fn include_router(mut self, other: APIRouter) -> Self {
        self.routes.extend(other.into_route_entries());
        self
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the router has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Consume the router, yielding entries with the prefix applied.
    pub(crate) fn into_route_entries(self) -> Vec<RouteEntry> {
        let prefix = self.prefix;
        self.routes
            .into_iter()
            .map(|entry| {
                let path = join_path(&prefix, &entry.path);
                entry.with_path(path)
            })
            .collect()
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path) {
        (true, "") => String::from("/"),
        (true, path) => path.to_string(),
        (false, "" | "/") => prefix.to_string(),
        (false, path) if path.starts_with('/') => format!("{prefix}{path}"),
        (false, path) => format!("{prefix}/{path}"),
    }
}
