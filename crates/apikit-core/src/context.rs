//! Request-scoped context.
//!
//! A [`RequestContext`] is created for every dispatched request and passed by
//! reference to handlers, extractors and dependency providers. It carries the
//! request id, the per-request dependency cache and cleanup stack, the
//! application state, and an immutable snapshot of dependency overrides.

use std::sync::Arc;

use crate::dependency::{CleanupStack, DependencyCache, OverrideSnapshot};
use crate::state::StateContainer;

/// Default maximum body size: 1MB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Configuration for request body limits.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimitConfig {
    max_size: usize,
}

impl Default for BodyLimitConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl BodyLimitConfig {
    /// Creates a new body limit config with the specified maximum size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Returns the maximum body size in bytes.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Request context handed to handlers and dependency providers.
///
/// Overrides are a snapshot taken when the request was dispatched, so
/// registering or removing an override while a request is in flight never
/// changes which provider that request uses.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: u64,
    dependency_cache: Arc<DependencyCache>,
    dependency_overrides: Arc<OverrideSnapshot>,
    cleanup_stack: Arc<CleanupStack>,
    state: Arc<StateContainer>,
    body_limit: BodyLimitConfig,
}

impl RequestContext {
    /// Creates a context with no overrides, empty state and the default body limit.
    #[must_use]
    pub fn new(request_id: u64) -> Self {
        Self {
            request_id,
            dependency_cache: Arc::new(DependencyCache::new()),
            dependency_overrides: Arc::new(OverrideSnapshot::empty()),
            cleanup_stack: Arc::new(CleanupStack::new()),
            state: Arc::new(StateContainer::new()),
            body_limit: BodyLimitConfig::default(),
        }
    }

    /// Use the given override snapshot for this request.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Arc<OverrideSnapshot>) -> Self {
        self.dependency_overrides = overrides;
        self
    }

    /// Share application state with this request.
    #[must_use]
    pub fn with_state(mut self, state: Arc<StateContainer>) -> Self {
        self.state = state;
        self
    }

    /// Set the maximum accepted body size.
    #[must_use]
    pub fn with_body_limit(mut self, max_body_size: usize) -> Self {
        self.body_limit = BodyLimitConfig::new(max_body_size);
        self
    }

    /// Returns the unique request identifier.
    #[must_use]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Returns the dependency cache for this request.
    #[must_use]
    pub fn dependency_cache(&self) -> &DependencyCache {
        &self.dependency_cache
    }

    /// Returns the override snapshot for this request.
    #[must_use]
    pub fn dependency_overrides(&self) -> &OverrideSnapshot {
        &self.dependency_overrides
    }

    /// Returns the cleanup stack.
    ///
    /// Cleanup functions run after the handler completes in LIFO order.
    #[must_use]
    pub fn cleanup_stack(&self) -> &CleanupStack {
        &self.cleanup_stack
    }

    /// Returns the shared application state.
    #[must_use]
    pub fn state(&self) -> &StateContainer {
        &self.state
    }

    /// Returns the body limit configuration for this request.
    #[must_use]
    pub fn body_limit(&self) -> &BodyLimitConfig {
        &self.body_limit
    }

    /// Returns the maximum body size in bytes for this request.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.body_limit.max_size()
    }
}
