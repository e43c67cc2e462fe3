//! Dependency injection support.
//!
//! A dependency is a type implementing [`FromDependency`]; its `TypeId` is the
//! handle routes and overrides agree on. Handlers ask for one through the
//! [`Depends`] extractor, which resolves it in this order:
//!
//! 1. an override from the request's [`OverrideSnapshot`], if registered;
//! 2. the per-request [`DependencyCache`], for cacheable dependencies;
//! 3. the default provider, [`FromDependency::from_dependency`].
//!
//! Exactly one provider runs for a given resolution. A provider error aborts
//! the handler and becomes the response.
//!
//! Overrides are registered on a [`DependencyOverrides`] registry (usually
//! owned by the test client) and copied into an immutable snapshot when each
//! request is dispatched. [`OverrideGuard`] removes a registration when it is
//! dropped, including during a panic unwind.

use crate::BoxFuture;
use crate::context::RequestContext;
use crate::extract::FromRequest;
use crate::request::Request;
use crate::response::IntoResponse;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dependency resolution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyScope {
    /// No request-level caching; resolve on each call.
    Function,
    /// Cache for the lifetime of the request.
    Request,
}

/// Configuration for `Depends` resolution.
pub trait DependsConfig {
    /// Whether to use caching.
    const USE_CACHE: bool;
    /// Optional scope override.
    const SCOPE: Option<DependencyScope>;
}

/// Default dependency configuration (cache per request).
#[derive(Debug, Clone, Copy)]
pub struct DefaultDependencyConfig;

/// Backwards-friendly alias for the default config.
pub type DefaultConfig = DefaultDependencyConfig;

impl DependsConfig for DefaultDependencyConfig {
    const USE_CACHE: bool = true;
    const SCOPE: Option<DependencyScope> = None;
}

/// Disable caching for this dependency.
#[derive(Debug, Clone, Copy)]
pub struct NoCache;

impl DependsConfig for NoCache {
    const USE_CACHE: bool = false;
    const SCOPE: Option<DependencyScope> = Some(DependencyScope::Function);
}

/// Dependency injection extractor.
#[derive(Debug, Clone)]
pub struct Depends<T, C = DefaultDependencyConfig>(pub T, PhantomData<C>);

impl<T, C> Depends<T, C> {
    /// Create a new `Depends` wrapper.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(value, PhantomData)
    }

    /// Unwrap the inner value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, C> Deref for Depends<T, C> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, C> DerefMut for Depends<T, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Trait for types that can be injected as dependencies.
///
/// The implementing type is the dependency handle; `from_dependency` is its
/// default provider. Overrides must produce the same `Self` and `Self::Error`.
pub trait FromDependency: Clone + Send + Sync + 'static {
    /// Error type when dependency resolution fails.
    type Error: IntoResponse + Send + Sync + 'static;

    /// Resolve the dependency.
    fn from_dependency(
        ctx: &RequestContext,
        req: &mut Request,
    ) -> impl Future<Output = Result<Self, Self::Error>> + Send;
}

impl<T, C> FromRequest for Depends<T, C>
where
    T: FromDependency,
    C: DependsConfig,
{
    type Error = T::Error;

    async fn from_request(ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        let dependency = std::any::type_name::<T>();

        if let Some(provider) = ctx.dependency_overrides().resolve::<T>() {
            tracing::debug!(
                request_id = ctx.request_id(),
                dependency,
                source = "override",
                "resolving dependency"
            );
            return match provider.call(ctx, req).await {
                Ok(value) => Ok(Depends::new(value)),
                Err(err) => {
                    tracing::warn!(
                        request_id = ctx.request_id(),
                        dependency,
                        source = "override",
                        "dependency provider failed; handler skipped"
                    );
                    Err(err)
                }
            };
        }

        let scope = C::SCOPE.unwrap_or(DependencyScope::Request);
        let use_cache = C::USE_CACHE && scope == DependencyScope::Request;

        if use_cache {
            if let Some(cached) = ctx.dependency_cache().get::<T>() {
                tracing::trace!(
                    request_id = ctx.request_id(),
                    dependency,
                    source = "cache",
                    "resolving dependency"
                );
                return Ok(Depends::new(cached));
            }
        }

        tracing::debug!(
            request_id = ctx.request_id(),
            dependency,
            source = "default",
            "resolving dependency"
        );
        let value = match T::from_dependency(ctx, req).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    request_id = ctx.request_id(),
                    dependency,
                    source = "default",
                    "dependency provider failed; handler skipped"
                );
                return Err(err);
            }
        };

        if use_cache {
            ctx.dependency_cache().insert::<T>(value.clone());
        }

        Ok(Depends::new(value))
    }
}

/// Request-scoped dependency cache.
pub struct DependencyCache {
    inner: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl DependencyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Get a cached dependency by type.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.inner
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Insert a dependency into the cache.
    pub fn insert<T: Clone + Send + Sync + 'static>(&self, value: T) {
        self.inner.write().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Clear all cached dependencies.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Return the number of cached dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no dependencies are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DependencyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCache")
            .field("size", &self.len())
            .finish()
    }
}

type CleanupFn = Box<dyn FnOnce() + Send>;

/// Cleanup actions for request-scoped resources.
///
/// Providers that acquire something (a database session, a lock) push a
/// release action here. The dispatcher runs the stack after the handler
/// returns, whether it succeeded or a dependency failed; anything still
/// pending runs on drop.
pub struct CleanupStack {
    actions: Mutex<Vec<CleanupFn>>,
}

impl CleanupStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Register a cleanup action.
    pub fn push<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.lock().push(Box::new(action));
    }

    /// Run every pending action, most recent first. Returns how many ran.
    ///
    /// A panicking action does not stop the ones after it. The first panic
    /// is resumed once every action has run, unless the thread is already
    /// unwinding, in which case it is only logged.
    pub fn run(&self) -> usize {
        let actions = std::mem::take(&mut *self.actions.lock());
        let count = actions.len();
        let mut first_panic = None;
        for action in actions.into_iter().rev() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(action)) {
                tracing::error!("cleanup action panicked");
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic.filter(|_| !std::thread::panicking()) {
            panic::resume_unwind(payload);
        }
        count
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CleanupStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupStack")
            .field("pending", &self.len())
            .finish()
    }
}

type ProviderFn<T> = dyn Fn(&RequestContext, &mut Request) -> BoxFuture<'static, Result<T, <T as FromDependency>::Error>>
    + Send
    + Sync;

/// A registered replacement provider for dependency `T`.
pub struct OverrideProvider<T: FromDependency> {
    provider: Arc<ProviderFn<T>>,
}

impl<T: FromDependency> OverrideProvider<T> {
    /// Invoke the provider for the current request.
    pub fn call(
        &self,
        ctx: &RequestContext,
        req: &mut Request,
    ) -> BoxFuture<'static, Result<T, T::Error>> {
        (self.provider)(ctx, req)
    }
}

impl<T: FromDependency> Clone for OverrideProvider<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<T: FromDependency> std::fmt::Debug for OverrideProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideProvider")
            .field("dependency", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// Identifies one call to [`DependencyOverrides::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

#[derive(Clone)]
struct OverrideEntry {
    registration: RegistrationId,
    name: &'static str,
    // Always an `OverrideProvider<T>` for the `TypeId` it is keyed under.
    provider: Arc<dyn Any + Send + Sync>,
}

impl OverrideEntry {
    fn provider<T: FromDependency>(&self) -> Option<OverrideProvider<T>> {
        self.provider.downcast_ref::<OverrideProvider<T>>().cloned()
    }
}

/// Immutable view of the overrides in effect for one request.
#[derive(Clone, Default)]
pub struct OverrideSnapshot {
    entries: HashMap<TypeId, OverrideEntry>,
}

impl OverrideSnapshot {
    /// A snapshot with no overrides.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up the override for `T`.
    #[must_use]
    pub fn resolve<T: FromDependency>(&self) -> Option<OverrideProvider<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(OverrideEntry::provider::<T>)
    }

    /// Returns true if `T` is overridden.
    #[must_use]
    pub fn contains<T: FromDependency>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Type names of the overridden dependencies, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }

    /// Number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for OverrideSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideSnapshot")
            .field("overrides", &self.names())
            .finish()
    }
}

/// Dependency override registry (primarily for testing).
///
/// Keys are dependency types; a later registration for the same type
/// replaces the earlier one. Overriding a dependency that no route uses is
/// harmless.
pub struct DependencyOverrides {
    inner: RwLock<HashMap<TypeId, OverrideEntry>>,
    next_registration: AtomicU64,
}

impl DependencyOverrides {
    /// Create an empty overrides registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            next_registration: AtomicU64::new(1),
        }
    }

    /// Install or replace the override provider for `T`.
    pub fn register<T, F, Fut>(&self, f: F) -> RegistrationId
    where
        T: FromDependency,
        F: Fn(&RequestContext, &mut Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, T::Error>> + Send + 'static,
    {
        let provider: Arc<ProviderFn<T>> = Arc::new(
            move |ctx: &RequestContext,
                  req: &mut Request|
                  -> BoxFuture<'static, Result<T, T::Error>> { Box::pin(f(ctx, req)) },
        );
        let registration =
            RegistrationId(self.next_registration.fetch_add(1, Ordering::Relaxed));
        let entry = OverrideEntry {
            registration,
            name: std::any::type_name::<T>(),
            provider: Arc::new(OverrideProvider { provider }),
        };

        let replaced = self.inner.write().insert(TypeId::of::<T>(), entry).is_some();
        tracing::debug!(
            dependency = std::any::type_name::<T>(),
            replaced,
            "registered dependency override"
        );
        registration
    }

    /// Register a fixed override value for `T`.
    pub fn register_value<T>(&self, value: T) -> RegistrationId
    where
        T: FromDependency,
    {
        self.register::<T, _, _>(move |_ctx, _req| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// Remove the override for `T`. Returns whether one was present.
    pub fn remove<T: FromDependency>(&self) -> bool {
        let removed = self.inner.write().remove(&TypeId::of::<T>()).is_some();
        if removed {
            tracing::debug!(
                dependency = std::any::type_name::<T>(),
                "removed dependency override"
            );
        }
        removed
    }

    /// Remove the override for `T` only if it is still `registration`.
    ///
    /// A newer registration for the same dependency is left in place.
    pub fn remove_registration<T: FromDependency>(&self, registration: RegistrationId) -> bool {
        let mut guard = self.inner.write();
        let key = TypeId::of::<T>();
        let current = guard.get(&key).map(|entry| entry.registration);
        if current == Some(registration) {
            guard.remove(&key);
            true
        } else {
            false
        }
    }

    /// Look up the override for `T` without invoking it.
    #[must_use]
    pub fn resolve<T: FromDependency>(&self) -> Option<OverrideProvider<T>> {
        self.inner
            .read()
            .get(&TypeId::of::<T>())
            .and_then(OverrideEntry::provider::<T>)
    }

    /// Returns true if `T` is overridden.
    #[must_use]
    pub fn contains<T: FromDependency>(&self) -> bool {
        self.inner.read().contains_key(&TypeId::of::<T>())
    }

    /// Copy the current overrides for one request.
    #[must_use]
    pub fn snapshot(&self) -> OverrideSnapshot {
        OverrideSnapshot {
            entries: self.inner.read().clone(),
        }
    }

    /// Clear all overrides.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Return the number of overrides registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no overrides are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DependencyOverrides {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyOverrides")
            .field("size", &self.len())
            .finish()
    }
}

/// Removes one override registration when dropped.
///
/// Hold the guard for the duration of a test case; teardown then happens on
/// both the passing path and the panicking path.
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct OverrideGuard {
    overrides: Arc<DependencyOverrides>,
    registration: RegistrationId,
    remove: fn(&DependencyOverrides, RegistrationId) -> bool,
    name: &'static str,
}

impl OverrideGuard {
    /// Guard the given registration of dependency `T`.
    pub fn new<T: FromDependency>(
        overrides: Arc<DependencyOverrides>,
        registration: RegistrationId,
    ) -> Self {
        Self {
            overrides,
            registration,
            remove: DependencyOverrides::remove_registration::<T>,
            name: std::any::type_name::<T>(),
        }
    }

    /// The guarded registration.
    #[must_use]
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        if (self.remove)(&self.overrides, self.registration) {
            tracing::debug!(dependency = self.name, "override guard released");
        }
    }
}

impl std::fmt::Debug for OverrideGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideGuard")
            .field("dependency", &self.name)
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::request::Method;
    use std::sync::atomic::AtomicUsize;

    fn test_context(overrides: Option<&DependencyOverrides>) -> RequestContext {
        let ctx = RequestContext::new(1);
        match overrides {
            Some(overrides) => ctx.with_overrides(Arc::new(overrides.snapshot())),
            None => ctx,
        }
    }

    fn empty_request() -> Request {
        Request::new(Method::Get, "/")
    }

    #[derive(Debug, Clone)]
    struct CounterDep {
        value: usize,
    }

    impl FromDependency for CounterDep {
        type Error = HttpError;

        async fn from_dependency(
            _ctx: &RequestContext,
            _req: &mut Request,
        ) -> Result<Self, Self::Error> {
            Ok(CounterDep { value: 1 })
        }
    }

    #[test]
    fn depends_basic_resolution() {
        let ctx = test_context(None);
        let mut req = empty_request();
        let dep = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect("dependency resolution failed");
        assert_eq!(dep.value, 1);
    }

    #[derive(Clone)]
    struct CountingDep;

    impl FromDependency for CountingDep {
        type Error = HttpError;

        async fn from_dependency(
            ctx: &RequestContext,
            _req: &mut Request,
        ) -> Result<Self, Self::Error> {
            let count = ctx
                .dependency_cache()
                .get::<Arc<AtomicUsize>>()
                .unwrap_or_else(|| Arc::new(AtomicUsize::new(0)));
            count.fetch_add(1, Ordering::SeqCst);
            ctx.dependency_cache().insert(Arc::clone(&count));
            Ok(CountingDep)
        }
    }

    #[test]
    fn depends_caches_per_request() {
        let ctx = test_context(None);
        let mut req = empty_request();

        for _ in 0..2 {
            futures_executor::block_on(Depends::<CountingDep>::from_request(&ctx, &mut req))
                .expect("resolution failed");
        }

        let counter = ctx
            .dependency_cache()
            .get::<Arc<AtomicUsize>>()
            .expect("missing counter");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn depends_no_cache_config() {
        let ctx = test_context(None);
        let mut req = empty_request();

        for _ in 0..2 {
            futures_executor::block_on(Depends::<CountingDep, NoCache>::from_request(
                &ctx, &mut req,
            ))
            .expect("resolution failed");
        }

        let counter = ctx
            .dependency_cache()
            .get::<Arc<AtomicUsize>>()
            .expect("missing counter");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[derive(Clone)]
    struct DepB;

    impl FromDependency for DepB {
        type Error = HttpError;

        async fn from_dependency(
            _ctx: &RequestContext,
            _req: &mut Request,
        ) -> Result<Self, Self::Error> {
            Ok(DepB)
        }
    }

    #[derive(Clone)]
    struct DepA;

    impl FromDependency for DepA {
        type Error = HttpError;

        async fn from_dependency(
            ctx: &RequestContext,
            req: &mut Request,
        ) -> Result<Self, Self::Error> {
            let _ = Depends::<DepB>::from_request(ctx, req).await?;
            Ok(DepA)
        }
    }

    #[test]
    fn depends_nested_resolution() {
        let ctx = test_context(None);
        let mut req = empty_request();
        futures_executor::block_on(Depends::<DepA>::from_request(&ctx, &mut req))
            .expect("nested resolution failed");
        assert_eq!(ctx.dependency_cache().len(), 2);
    }

    #[test]
    fn override_value_substitution() {
        let overrides = DependencyOverrides::new();
        overrides.register_value(CounterDep { value: 42 });
        let ctx = test_context(Some(&overrides));
        let mut req = empty_request();

        let dep = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect("override resolution failed");
        assert_eq!(dep.value, 42);
        // The default provider never ran, so nothing was cached.
        assert!(ctx.dependency_cache().is_empty());
    }

    #[test]
    fn override_error_short_circuits() {
        let overrides = DependencyOverrides::new();
        overrides.register::<CounterDep, _, _>(|_ctx, _req| async {
            Err(HttpError::unauthorized().with_detail("Invalid token"))
        });
        let ctx = test_context(Some(&overrides));
        let mut req = empty_request();

        let err = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect_err("override should fail");
        assert_eq!(err.status.as_u16(), 401);
    }

    #[test]
    fn override_reads_request_inputs() {
        let overrides = DependencyOverrides::new();
        overrides.register::<CounterDep, _, _>(|_ctx, req| {
            let value = req.query().map_or(0, str::len);
            async move { Ok(CounterDep { value }) }
        });
        let ctx = test_context(Some(&overrides));
        let mut req = Request::new(Method::Get, "/?abc");

        let dep = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect("override resolution failed");
        assert_eq!(dep.value, 3);
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let overrides = DependencyOverrides::new();
        overrides.register_value(CounterDep { value: 1 });
        overrides.register_value(CounterDep { value: 2 });
        assert_eq!(overrides.len(), 1);

        let ctx = test_context(Some(&overrides));
        let mut req = empty_request();
        let dep = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect("override resolution failed");
        assert_eq!(dep.value, 2);
    }

    #[test]
    fn remove_is_idempotent_and_restores_default() {
        let overrides = DependencyOverrides::new();
        overrides.register_value(CounterDep { value: 9 });
        assert!(overrides.remove::<CounterDep>());
        assert!(!overrides.remove::<CounterDep>());
        assert!(overrides.resolve::<CounterDep>().is_none());

        let ctx = test_context(Some(&overrides));
        let mut req = empty_request();
        let dep = futures_executor::block_on(Depends::<CounterDep>::from_request(&ctx, &mut req))
            .expect("default resolution failed");
        assert_eq!(dep.value, 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_changes() {
        let overrides = DependencyOverrides::new();
        overrides.register_value(CounterDep { value: 5 });
        let snapshot = overrides.snapshot();

        overrides.clear();
        overrides.register_value(DepB);

        assert!(snapshot.contains::<CounterDep>());
        assert!(!snapshot.contains::<DepB>());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.names()[0].ends_with("CounterDep"));
    }

    #[test]
    fn guard_removes_its_registration() {
        let overrides = Arc::new(DependencyOverrides::new());
        let id = overrides.register_value(CounterDep { value: 3 });
        {
            let _guard = OverrideGuard::new::<CounterDep>(Arc::clone(&overrides), id);
            assert!(overrides.contains::<CounterDep>());
        }
        assert!(!overrides.contains::<CounterDep>());
    }

    #[test]
    fn guard_leaves_newer_registration_alone() {
        let overrides = Arc::new(DependencyOverrides::new());
        let first = overrides.register_value(CounterDep { value: 1 });
        let guard = OverrideGuard::new::<CounterDep>(Arc::clone(&overrides), first);
        let second = overrides.register_value(CounterDep { value: 2 });
        assert_ne!(guard.registration(), second);

        drop(guard);
        assert!(overrides.contains::<CounterDep>());
    }

    #[test]
    fn guard_releases_on_panic() {
        let overrides = Arc::new(DependencyOverrides::new());
        let shared = Arc::clone(&overrides);
        let result: std::thread::Result<()> =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                let id = shared.register_value(CounterDep { value: 1 });
                let _guard = OverrideGuard::new::<CounterDep>(Arc::clone(&shared), id);
                panic!("assertion failed inside test case");
            }));
        assert!(result.is_err());
        assert!(overrides.is_empty());
    }

    #[test]
    fn cleanup_stack_runs_lifo_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stack = CleanupStack::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            stack.push(move || order.lock().push(i));
        }
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.run(), 3);
        assert_eq!(stack.run(), 0);
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn cleanup_stack_runs_pending_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let stack = CleanupStack::new();
            let released = Arc::clone(&released);
            stack.push(move || {
                released.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_stack_panic_does_not_skip_remaining_actions() {
        let released = Arc::new(AtomicUsize::new(0));
        let stack = CleanupStack::new();
        let counter = Arc::clone(&released);
        stack.push(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        stack.push(|| panic!("release failed"));

        let result = panic::catch_unwind(AssertUnwindSafe(|| stack.run()));
        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn cleanup_stack_drop_during_unwind_does_not_abort() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let result = panic::catch_unwind(move || {
            let stack = CleanupStack::new();
            stack.push(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            stack.push(|| panic!("release failed"));
            panic!("handler failed");
        });
        let payload = result.expect_err("handler panic propagates");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"handler failed"));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[derive(Clone, Debug)]
    struct ErrorDep;

    impl FromDependency for ErrorDep {
        type Error = HttpError;

        async fn from_dependency(
            _ctx: &RequestContext,
            _req: &mut Request,
        ) -> Result<Self, Self::Error> {
            Err(HttpError::bad_request().with_detail("boom"))
        }
    }

    #[test]
    fn depends_error_propagation() {
        let ctx = test_context(None);
        let mut req = empty_request();
        let err = futures_executor::block_on(Depends::<ErrorDep>::from_request(&ctx, &mut req))
            .expect_err("expected dependency error");
        assert_eq!(err.status.as_u16(), 400);
    }
}
