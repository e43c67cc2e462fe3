//! HTTP router for apikit.
//!
//! Routes are `/`-separated patterns where a `{name}` segment captures one
//! non-empty path segment (`/items/{item_id}`). Lookup distinguishes a path
//! that no route knows (404) from a known path requested with the wrong
//! method (405, with the allowed methods).

#![forbid(unsafe_code)]

mod r#match;
mod route;

pub use r#match::{AllowedMethods, RouteLookup, RouteMatch};
pub use route::{Route, Router, RouterError, Segment};
