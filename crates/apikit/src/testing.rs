//! In-process test client.
//!
//! [`TestClient`] sends requests straight into an [`App`] without a socket
//! and owns the [`DependencyOverrides`] registry those requests are resolved
//! against. Every request takes a snapshot of the registry when it is sent,
//! so overrides installed after `send()` do not affect it.
//!
//! ```ignore
//! let client = TestClient::new(app);
//! let _auth = client.override_value(FakeAuthentication::allow("tester"));
//! let response = client.get("/protected").query("token", "anything").send();
//! assert_status!(response, 200);
//! ```

use crate::app::App;
use apikit_core::query::percent_encode;
use apikit_core::{
    Body, DependencyOverrides, FromDependency, Method, OverrideGuard, Request, RequestContext,
    ResponseBody, StatusCode,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Client that dispatches requests to an [`App`] in-process.
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    overrides: Arc<DependencyOverrides>,
}

impl TestClient {
    /// Create a client with an empty override registry.
    #[must_use]
    pub fn new(app: App) -> Self {
        Self::from_shared(Arc::new(app))
    }

    /// Create a client for an already shared application.
    ///
    /// Each client gets its own override registry, so two clients over the
    /// same app never see each other's overrides.
    #[must_use]
    pub fn from_shared(app: Arc<App>) -> Self {
        Self {
            app,
            overrides: Arc::new(DependencyOverrides::new()),
        }
    }

    /// The application under test.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Direct access to this client's override registry.
    #[must_use]
    pub fn overrides(&self) -> &DependencyOverrides {
        &self.overrides
    }

    /// Replace dependency `T` with `provider` until the guard is dropped.
    pub fn override_dependency<T, F, Fut>(&self, provider: F) -> OverrideGuard
    where
        T: FromDependency,
        F: Fn(&RequestContext, &mut Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, T::Error>> + Send + 'static,
    {
        let registration = self.overrides.register::<T, F, Fut>(provider);
        OverrideGuard::new::<T>(Arc::clone(&self.overrides), registration)
    }

    /// Replace dependency `T` with a fixed value until the guard is dropped.
    pub fn override_value<T: FromDependency>(&self, value: T) -> OverrideGuard {
        let registration = self.overrides.register_value::<T>(value);
        OverrideGuard::new::<T>(Arc::clone(&self.overrides), registration)
    }

    /// Remove every override.
    pub fn clear_overrides(&self) {
        self.overrides.clear();
    }

    /// Start a request.
    #[must_use]
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path.into())
    }

    /// Start a GET request.
    #[must_use]
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Get, path)
    }

    /// Start a HEAD request.
    #[must_use]
    pub fn head(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Head, path)
    }

    /// Start a POST request.
    #[must_use]
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Post, path)
    }

    /// Start a PUT request.
    #[must_use]
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Put, path)
    }

    /// Start a DELETE request.
    #[must_use]
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Delete, path)
    }

    /// Start a PATCH request.
    #[must_use]
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Patch, path)
    }
}

/// A request being assembled by a [`TestClient`].
#[derive(Debug)]
#[must_use = "requests do nothing until `send()` is called"]
pub struct RequestBuilder<'c> {
    client: &'c TestClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, Vec<u8>)>,
    cookies: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'c> RequestBuilder<'c> {
    fn new(client: &'c TestClient, method: Method, path: String) -> Self {
        Self {
            client,
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter; it is percent-encoded.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body and `content-type: application/json`.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized as JSON.
    #[track_caller]
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => panic!("request body failed to serialize as JSON: {err}"),
        };
        self.header("content-type", b"application/json".to_vec())
            .body(bytes)
    }

    /// Set an urlencoded form body.
    pub fn form<K: AsRef<str>, V: AsRef<str>>(self, fields: &[(K, V)]) -> Self {
        let encoded = encode_pairs(
            fields
                .iter()
                .map(|(k, v)| (k.as_ref(), v.as_ref())),
        );
        self.header(
            "content-type",
            b"application/x-www-form-urlencoded".to_vec(),
        )
        .body(encoded.into_bytes())
    }

    /// Set a raw body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Dispatch the request and wait for the response.
    #[must_use]
    pub fn send(self) -> TestResponse {
        let mut target = self.path;
        if !self.query.is_empty() {
            let separator = if target.contains('?') { '&' } else { '?' };
            target.push(separator);
            target.push_str(&encode_pairs(
                self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            ));
        }

        let mut request = Request::new(self.method, target);
        for (name, value) in self.headers {
            request.headers_mut().insert(name, value);
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request.headers_mut().insert("cookie", cookie.into_bytes());
        }
        if let Some(body) = self.body {
            request.set_body(Body::Bytes(body));
        }

        let snapshot = Arc::new(self.client.overrides.snapshot());
        let response = futures_executor::block_on(self.client.app.dispatch(request, snapshot));
        let (status, headers, body) = response.into_parts();
        let body = match body {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Bytes(bytes) => bytes,
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A response captured by the [`TestClient`].
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
}

impl TestResponse {
    /// The status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// First header with this name (case-insensitive), as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// All headers in response order.
    #[must_use]
    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }

    /// The raw body.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as text (invalid UTF-8 replaced).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Assert a [`TestResponse`] has the given status code.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {{
        let response = &$response;
        let expected: u16 = $status;
        assert_eq!(
            response.status().as_u16(),
            expected,
            "unexpected status; body: {}",
            response.text()
        );
    }};
}

/// Assert a [`TestResponse`] body equals the given JSON value exactly.
#[macro_export]
macro_rules! assert_json {
    ($response:expr, $expected:expr) => {{
        let response = &$response;
        let actual: $crate::__serde_json::Value = match response.json() {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON ({err}): {}", response.text()),
        };
        assert_eq!(actual, $expected);
    }};
}
