//! Core types and traits for apikit.
//!
//! This crate provides the fundamental building blocks:
//! - [`Request`] and [`Response`] types
//! - [`RequestContext`], the per-request view handlers and providers receive
//! - [`FromRequest`] for extractors and [`FromDependency`] for injectable
//!   dependencies, resolved through [`Depends`]
//! - [`DependencyOverrides`], the registry tests use to swap providers
//! - Error types and the [`IntoResponse`] trait
//!
//! # Design Principles
//!
//! - A dependency is identified by its type; no string keys
//! - Overrides are snapshotted per request and never global
//! - All types support `Send + Sync`

#![forbid(unsafe_code)]

pub mod config;
mod context;
mod dependency;
pub mod error;
mod extract;
pub mod logging;
pub mod query;
mod request;
mod response;
mod state;

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use config::{AppConfig, ConfigError};
pub use context::{BodyLimitConfig, DEFAULT_MAX_BODY_SIZE, RequestContext};
pub use dependency::{
    CleanupStack, DefaultConfig, DefaultDependencyConfig, DependencyCache, DependencyOverrides,
    DependencyScope, Depends, DependsConfig, FromDependency, NoCache, OverrideGuard,
    OverrideProvider, OverrideSnapshot, RegistrationId,
};
pub use error::{HttpError, LocItem, ValidationError, ValidationErrors};
pub use extract::{
    Cookies, FormParams, FromRequest, Json, ParamMap, PathParams, QueryParams, State,
    bearer_token, snake_to_header_case,
};
pub use logging::{LogConfig, LoggingError};
pub use request::{Body, Headers, Method, Request};
pub use response::{IntoResponse, Response, ResponseBody, StatusCode};
pub use state::StateContainer;
