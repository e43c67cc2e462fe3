//! In-process web application toolkit with testable dependency injection.
//!
//! apikit provides:
//!
//! - **Typed dependency injection**: a dependency is a type implementing
//!   [`FromDependency`]; handlers resolve it with [`Depends`]
//! - **Per-client overrides**: [`TestClient`] owns a [`DependencyOverrides`]
//!   registry and snapshots it into every request it sends
//! - **Scoped teardown**: overrides return an [`OverrideGuard`] that removes
//!   the registration on drop, including during a panic
//! - **Structured errors**: validation failures render as 422 responses that
//!   list every failing field
//!
//! # Quick Start
//!
//! ```ignore
//! use apikit::prelude::*;
//!
//! async fn read_root(_ctx: &RequestContext, _req: &mut Request) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({"message": "Hello World"}))
//! }
//!
//! let app = App::builder().get("/", handler!(read_root)).build()?;
//! let client = TestClient::new(app);
//! assert_status!(client.get("/").send(), 200);
//! ```
//!
//! # Crate Structure
//!
//! - [`apikit_core`]: request, response, errors, extractors, dependency injection
//! - [`apikit_router`]: path-pattern router

#![forbid(unsafe_code)]

mod api_router;
mod app;
pub mod cases;
pub mod testing;

// Re-export crates
pub use apikit_core as core;
pub use apikit_router as router;

#[doc(hidden)]
pub use serde_json as __serde_json;

pub use api_router::APIRouter;
pub use app::{App, AppBuilder, BoxHandler, RouteEntry};
pub use cases::{CaseFailure, CaseTable};
pub use testing::{RequestBuilder, TestClient, TestResponse};

// Re-export commonly used types
pub use apikit_core::{
    AppConfig, BoxFuture, ConfigError, DefaultConfig, DefaultDependencyConfig,
    DependencyOverrides, DependencyScope, Depends, DependsConfig, FromDependency, FromRequest,
    HttpError, IntoResponse, LocItem, LogConfig, LoggingError, Method, NoCache, OverrideGuard,
    Request, RequestContext, Response, ResponseBody, StateContainer, StatusCode,
    ValidationError, ValidationErrors,
};
pub use apikit_router::RouterError;

/// Turn an `async fn(&RequestContext, &mut Request) -> impl IntoResponse`
/// into a route handler.
///
/// ```ignore
/// async fn read_item(ctx: &RequestContext, req: &mut Request) -> Result<Json<Item>, HttpError> {
///     // ...
/// }
///
/// App::builder().get("/items/{item_id}", handler!(read_item));
/// ```
#[macro_export]
macro_rules! handler {
    ($func:path) => {{
        fn __apikit_handler<'a>(
            ctx: &'a $crate::RequestContext,
            req: &'a mut $crate::Request,
        ) -> $crate::BoxFuture<'a, $crate::Response> {
            ::std::boxed::Box::pin(async move {
                $crate::IntoResponse::into_response($func(ctx, req).await)
            })
        }
        __apikit_handler
    }};
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::extract::{Cookies, FormParams, Json, PathParams, QueryParams, State};
    pub use crate::{
        APIRouter, App, AppBuilder, AppConfig, CaseTable, Depends, FromDependency, FromRequest,
        HttpError, IntoResponse, Method, NoCache, OverrideGuard, Request, RequestContext,
        Response, StatusCode, TestClient, TestResponse, ValidationError, ValidationErrors,
        assert_json, assert_status, handler,
    };
    pub use serde::{Deserialize, Serialize};
}

/// Extractors module for request data extraction.
pub mod extract {
    pub use apikit_core::{
        Cookies, FormParams, Json, ParamMap, PathParams, QueryParams, State, bearer_token,
        snake_to_header_case,
    };
}
