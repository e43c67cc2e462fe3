//! Application assembly and in-process dispatch.
//!
//! An [`App`] owns the route table, one boxed handler per route, the shared
//! [`StateContainer`] and the [`AppConfig`]. [`App::handle`] runs one request
//! through lookup, dependency resolution and the handler, then drains the
//! request's cleanup stack.

use crate::api_router::APIRouter;
use apikit_core::{
    AppConfig, BoxFuture, HttpError, IntoResponse, Method, OverrideSnapshot, Request,
    RequestContext, Response, ResponseBody, StateContainer, StatusCode,
};
use apikit_router::{RouteLookup, Router, RouterError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;

/// A type-erased route handler.
///
/// Build one from an `async fn(&RequestContext, &mut Request) -> impl
/// IntoResponse` with [`handler!`](crate::handler).
pub type BoxHandler = Arc<
    dyn for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
        + Send
        + Sync,
>;

/// A route waiting to be registered.
#[derive(Clone)]
pub struct RouteEntry {
    /// HTTP method.
    pub method: Method,
    /// Path pattern.
    pub path: String,
    handler: BoxHandler,
}

impl RouteEntry {
    /// Create a route entry.
    pub fn new<H>(method: Method, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Builder for [`App`].
#[derive(Default)]
pub struct AppBuilder {
    config: AppConfig,
    routes: Vec<RouteEntry>,
    state: StateContainer,
}

impl AppBuilder {
    /// Create a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a value with every request, retrievable with `State<T>`.
    #[must_use]
    pub fn state<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.state.insert(value);
        self
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

    /// Add a PUT route.
    #[must_use]
    pub fn put<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Put, path, handler)
    }

    /// Add a DELETE route.
    #[must_use]
    pub fn delete<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Delete, path, handler)
    }

    /// Add a PATCH route.
    #[must_use]
    pub fn patch<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: for<'a> Fn(&'a RequestContext, &'a mut Request) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Patch, path, handler)
    }

    /// Mount every route of `router` under its prefix.
    #[must_use]
    pub fn include_router(mut self, router: APIRouter) -> Self {
        self.routes.extend(router.into_route_entries());
        self
    }

    /// Register the routes and freeze the application.
    pub fn build(self) -> Result<App, RouterError> {
        let mut router = Router::new();
        let mut handlers = Vec::with_capacity(self.routes.len());
        for entry in self.routes {
            let index = router.add(entry.method, &entry.path)?;
            debug_assert_eq!(index, handlers.len());
            handlers.push(entry.handler);
        }
        tracing::debug!(
            app = %self.config.name,
            routes = handlers.len(),
            "application built"
        );
        Ok(App {
            config: self.config,
            router,
            handlers,
            state: Arc::new(self.state),
            next_request_id: AtomicU64::new(1),
        })
    }
}

/// An assembled application.
///
/// The production entry point [`App::handle`] never consults dependency
/// overrides; only the test client supplies a snapshot.
pub struct App {
    config: AppConfig,
    router: Router,
    handlers: Vec<BoxHandler>,
    state: Arc<StateContainer>,
    next_request_id: AtomicU64,
}

impl App {
    /// Start building an application.
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// The application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared application state.
    #[must_use]
    pub fn state(&self) -> &StateContainer {
        &self.state
    }

    /// Registered `(method, pattern)` pairs in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.router.routes().iter().map(|r| (r.method(), r.path()))
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Handle a request with the real providers.
    pub async fn handle(&self, req: Request) -> Response {
        self.dispatch(req, Arc::new(OverrideSnapshot::empty())).await
    }

    /// Handle a request, resolving dependencies against `overrides` first.
    pub(crate) async fn dispatch(&self, req: Request, overrides: Arc<OverrideSnapshot>) -> Response {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!(
            "request",
            request_id,
            method = %req.method(),
            path = %req.path(),
        );
        let head = req.method() == Method::Head;
        let response = self
            .dispatch_inner(request_id, req, overrides)
            .instrument(span)
            .await;
        // HEAD keeps the status and headers of the GET response, never its body.
        if head {
            response.body(ResponseBody::Empty)
        } else {
            response
        }
    }

    async fn dispatch_inner(
        &self,
        request_id: u64,
        mut req: Request,
        overrides: Arc<OverrideSnapshot>,
    ) -> Response {
        let (index, params) = match self.router.lookup(req.path(), req.method()) {
            RouteLookup::Match(found) => (found.index, found.owned_params()),
            RouteLookup::MethodNotAllowed { allowed } => {
                tracing::debug!(allow = %allowed.header_value(), "method not allowed");
                return HttpError::new(StatusCode::METHOD_NOT_ALLOWED)
                    .with_header("allow", allowed.header_value())
                    .into_response();
            }
            RouteLookup::NotFound => {
                tracing::debug!("no route matched");
                return HttpError::not_found().into_response();
            }
        };
        let Some(handler) = self.handlers.get(index) else {
            tracing::error!(index, "route has no handler");
            return HttpError::internal().into_response();
        };

        if !overrides.is_empty() {
            tracing::debug!(overrides = ?overrides.names(), "dependency overrides active");
        }
        let ctx = RequestContext::new(request_id)
            .with_overrides(overrides)
            .with_state(Arc::clone(&self.state))
            .with_body_limit(self.config.max_body_size);
        req.set_path_params(params);

        let response = handler(&ctx, &mut req).await;
        let cleaned = ctx.cleanup_stack().run();
        tracing::debug!(
            status = response.status().as_u16(),
            cleanups = cleaned,
            "request completed"
        );
        response
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.config.name)
            .field("routes", &self.router.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
