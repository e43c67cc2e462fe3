//! Route patterns and the route table.

use crate::r#match::{AllowedMethods, RouteLookup, RouteMatch};
use apikit_core::Method;
use std::fmt;

/// Errors raised while registering routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// The pattern is malformed.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Another route already handles this method and path shape.
    #[error("route {method} {pattern} conflicts with {method} {existing}")]
    Conflict {
        /// Method of both routes.
        method: Method,
        /// Pattern being registered.
        pattern: String,
        /// Pattern already registered.
        existing: String,
    },
}

/// One `/`-separated piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text that must match exactly.
    Static(String),
    /// `{name}` capturing one non-empty path segment.
    Param(String),
}

impl Segment {
    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Param(_), Self::Param(_)) => true,
            _ => false,
        }
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
}

impl Route {
    /// Parse `pattern` for `method`.
    pub fn new(method: Method, pattern: impl Into<String>) -> Result<Self, RouterError> {
        let pattern = pattern.into();
        let segments = parse_pattern(&pattern)?;
        Ok(Self {
            method,
            pattern,
            segments,
        })
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The pattern as registered.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.pattern
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the path parameters, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.method == other.method
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.same_shape(b))
    }

    /// Match a path against this pattern, ignoring the method.
    fn match_path<'a>(&'a self, path: &'a str) -> Option<Vec<(&'a str, &'a str)>> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(text) if text == part => {}
                Segment::Param(name) if !part.is_empty() => params.push((name.as_str(), part)),
                _ => return None,
            }
        }
        Some(params)
    }

    /// Sort key preferring literal segments over captures, left to right.
    fn specificity(&self) -> Vec<bool> {
        self.segments
            .iter()
            .map(|s| matches!(s, Segment::Static(_)))
            .collect()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    match path.strip_prefix('/') {
        Some("") | None => Vec::new(),
        Some(rest) => rest.split('/').collect(),
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouterError> {
    let invalid = |reason| RouterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };
    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut segments = Vec::new();
    for part in split_path(pattern) {
        let segment = if let Some(inner) = part.strip_prefix('{') {
            let name = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid("unclosed '{'"))?;
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            if name.contains(['{', '}']) {
                return Err(invalid("nested braces"));
            }
            if segments
                .iter()
                .any(|s| matches!(s, Segment::Param(existing) if existing == name))
            {
                return Err(invalid("duplicate parameter name"));
            }
            Segment::Param(name.to_string())
        } else {
            if part.contains(['{', '}']) {
                return Err(invalid("braces must enclose a whole segment"));
            }
            Segment::Static(part.to_string())
        };
        segments.push(segment);
    }
    Ok(segments)
}

/// Route table.
///
/// Literal segments win over captures when several patterns match a path.
/// `HEAD` requests fall back to the `GET` route for the same path.
#[derive(Debug, Default, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route, returning its index.
    pub fn add(&mut self, method: Method, pattern: &str) -> Result<usize, RouterError> {
        let route = Route::new(method, pattern)?;
        if let Some(existing) = self.routes.iter().find(|r| r.conflicts_with(&route)) {
            return Err(RouterError::Conflict {
                method,
                pattern: route.pattern,
                existing: existing.pattern.clone(),
            });
        }
        self.routes.push(route);
        Ok(self.routes.len() - 1)
    }

    /// Find the route for `path` and `method`.
    #[must_use]
    pub fn lookup<'a>(&'a self, path: &'a str, method: Method) -> RouteLookup<'a> {
        let candidates: Vec<_> = self
            .routes
            .iter()
            .enumerate()
            .filter_map(|(index, route)| route.match_path(path).map(|p| (index, route, p)))
            .collect();
        if candidates.is_empty() {
            return RouteLookup::NotFound;
        }

        let best = |m: Method| {
            candidates
                .iter()
                .filter(|(_, route, _)| route.method == m)
                .max_by_key(|(_, route, _)| route.specificity())
        };
        let found = best(method).or_else(|| {
            if method == Method::Head {
                best(Method::Get)
            } else {
                None
            }
        });

        match found {
            Some((index, route, params)) => RouteLookup::Match(RouteMatch {
                route: *route,
                index: *index,
                params: params.clone(),
            }),
            None => RouteLookup::MethodNotAllowed {
                allowed: AllowedMethods::new(
                    candidates.iter().map(|(_, route, _)| route.method).collect(),
                ),
            },
        }
    }

    /// Registered routes, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(routes: &[(Method, &str)]) -> Router {
        let mut router = Router::new();
        for (method, pattern) in routes {
            router.add(*method, pattern).expect("valid route");
        }
        router
    }

    #[test]
    fn root_and_static_match() {
        let router = router(&[(Method::Get, "/"), (Method::Get, "/protected")]);
        match router.lookup("/", Method::Get) {
            RouteLookup::Match(m) => {
                assert_eq!(m.index, 0);
                assert!(m.params.is_empty());
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert!(matches!(
            router.lookup("/protected", Method::Get),
            RouteLookup::Match(m) if m.route.path() == "/protected"
        ));
    }

    #[test]
    fn param_capture() {
        let router = router(&[(Method::Get, "/items/{item_id}")]);
        let RouteLookup::Match(m) = router.lookup("/items/42", Method::Get) else {
            panic!("expected match");
        };
        assert_eq!(m.get_param("item_id"), Some("42"));
        assert_eq!(
            m.owned_params(),
            vec![("item_id".to_string(), "42".to_string())]
        );
    }

    #[test]
    fn captured_params_are_percent_decoded() {
        let router = router(&[(Method::Get, "/files/{name}")]);
        let RouteLookup::Match(m) = router.lookup("/files/a%20b+c%2Fd", Method::Get) else {
            panic!("expected match");
        };
        assert_eq!(m.get_param("name"), Some("a%20b+c%2Fd"));
        assert_eq!(
            m.owned_params(),
            vec![("name".to_string(), "a b+c/d".to_string())]
        );
    }

    #[test]
    fn empty_segment_does_not_capture() {
        let router = router(&[(Method::Get, "/items/{item_id}")]);
        assert!(matches!(
            router.lookup("/items/", Method::Get),
            RouteLookup::NotFound
        ));
        assert!(matches!(
            router.lookup("/items", Method::Get),
            RouteLookup::NotFound
        ));
    }

    #[test]
    fn static_beats_param() {
        let router = router(&[(Method::Get, "/items/{item_id}"), (Method::Get, "/items/latest")]);
        let RouteLookup::Match(m) = router.lookup("/items/latest", Method::Get) else {
            panic!("expected match");
        };
        assert_eq!(m.route.path(), "/items/latest");
        assert!(m.params.is_empty());
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let router = router(&[(Method::Get, "/items/{id}"), (Method::Post, "/items")]);
        match router.lookup("/items/1", Method::Delete) {
            RouteLookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed.header_value(), "GET, HEAD");
            }
            other => panic!("expected 405, got {other:?}"),
        }
        match router.lookup("/items", Method::Get) {
            RouteLookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed.header_value(), "POST");
            }
            other => panic!("expected 405, got {other:?}"),
        }
    }

    #[test]
    fn head_falls_back_to_get() {
        let router = router(&[(Method::Get, "/")]);
        assert!(matches!(
            router.lookup("/", Method::Head),
            RouteLookup::Match(m) if m.route.method() == Method::Get
        ));
    }

    #[test]
    fn conflicting_shapes_rejected() {
        let mut router = router(&[(Method::Get, "/items/{item_id}")]);
        let err = router.add(Method::Get, "/items/{id}").expect_err("conflict");
        assert!(matches!(err, RouterError::Conflict { .. }));
        assert!(router.add(Method::Post, "/items/{id}").is_ok());
    }

    #[test]
    fn invalid_patterns_rejected() {
        let mut router = Router::new();
        for pattern in ["items", "/items/{}", "/items/{id", "/a/{x}/{x}", "/a/b{c}"] {
            assert!(
                matches!(
                    router.add(Method::Get, pattern),
                    Err(RouterError::InvalidPattern { .. })
                ),
                "{pattern} should be rejected"
            );
        }
        assert!(router.is_empty());
    }

    #[test]
    fn param_names_in_order() {
        let route = Route::new(Method::Get, "/users/{user_id}/posts/{post_id}").expect("valid");
        assert_eq!(route.param_names().collect::<Vec<_>>(), vec!["user_id", "post_id"]);
        assert_eq!(route.to_string(), "GET /users/{user_id}/posts/{post_id}");
    }
}
