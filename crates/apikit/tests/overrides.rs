//! Dependency resolution through a small application built in the test.

use apikit::prelude::*;
use serde_json::{Value, json};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};

static DEFAULT_CALLS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, PartialEq)]
struct Greeting(String);

impl FromDependency for Greeting {
    type Error = HttpError;

    async fn from_dependency(ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        DEFAULT_CALLS.fetch_add(1, Ordering::SeqCst);
        let State(prefix) = State::<String>::from_request(ctx, req).await?;
        Ok(Self(format!("{prefix}, world")))
    }
}

async fn greet(ctx: &RequestContext, req: &mut Request) -> Result<Json<Value>, HttpError> {
    let Greeting(text) = Depends::<Greeting>::from_request(ctx, req).await?.into_inner();
    Ok(Json(json!({ "greeting": text })))
}

async fn greet_twice_cached(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<Json<Value>, HttpError> {
    let first = Depends::<Greeting>::from_request(ctx, req).await?.into_inner();
    let second = Depends::<Greeting>::from_request(ctx, req).await?.into_inner();
    Ok(Json(json!({ "same": first == second })))
}

async fn greet_twice_uncached(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<Json<Value>, HttpError> {
    Depends::<Greeting, NoCache>::from_request(ctx, req).await?;
    Depends::<Greeting, NoCache>::from_request(ctx, req).await?;
    Ok(Json(json!({})))
}

fn client() -> TestClient {
    let app = App::builder()
        .state(String::from("hello"))
        .get("/greet", handler!(greet))
        .get("/greet/cached", handler!(greet_twice_cached))
        .get("/greet/uncached", handler!(greet_twice_uncached))
        .build()
        .expect("routes are valid");
    TestClient::new(app)
}

#[test]
#[serial]
fn default_provider_reads_application_state() {
    DEFAULT_CALLS.store(0, Ordering::SeqCst);
    let response = client().get("/greet").send();
    assert_status!(response, 200);
    assert_json!(response, json!({"greeting": "hello, world"}));
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn override_replaces_default_provider() {
    DEFAULT_CALLS.store(0, Ordering::SeqCst);
    let client = client();
    let _greeting = client.override_value(Greeting("hi from a test".into()));

    let response = client.get("/greet").send();
    assert_json!(response, json!({"greeting": "hi from a test"}));
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn cached_dependency_resolves_once_per_request() {
    DEFAULT_CALLS.store(0, Ordering::SeqCst);
    let client = client();
    assert_json!(client.get("/greet/cached").send(), json!({"same": true}));
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 1);

    assert_status!(client.get("/greet/cached").send(), 200);
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
#[serial]
fn uncached_dependency_resolves_every_time() {
    DEFAULT_CALLS.store(0, Ordering::SeqCst);
    assert_status!(client().get("/greet/uncached").send(), 200);
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn override_error_becomes_the_response() {
    let client = client();
    let _greeting = client.override_dependency::<Greeting, _, _>(|_ctx, _req| async {
        Err::<Greeting, _>(
            HttpError::new(StatusCode::from_u16(503)).with_detail("greeter offline"),
        )
    });

    let response = client.get("/greet").send();
    assert_status!(response, 503);
    assert_json!(response, json!({"detail": "greeter offline"}));
}

#[test]
fn override_provider_sees_the_request() {
    let client = client();
    let _greeting = client.override_dependency::<Greeting, _, _>(|_ctx, req| {
        let name = QueryParams::from_request_ref(req)
            .get("name")
            .unwrap_or("nobody")
            .to_string();
        async move { Ok::<_, HttpError>(Greeting(format!("hello, {name}"))) }
    });

    let response = client.get("/greet").query("name", "ferris").send();
    assert_json!(response, json!({"greeting": "hello, ferris"}));
}

#[test]
#[serial]
fn clear_overrides_restores_defaults() {
    let client = client();
    let guard = client.override_value(Greeting("overridden".into()));
    client.clear_overrides();
    assert!(client.overrides().is_empty());

    assert_json!(client.get("/greet").send(), json!({"greeting": "hello, world"}));
    drop(guard);
    assert!(client.overrides().is_empty());
}

#[test]
fn snapshot_is_taken_when_the_request_is_sent() {
    let client = client();
    let request = client.get("/greet");
    let _greeting = client.override_value(Greeting("late".into()));
    assert_json!(request.send(), json!({"greeting": "late"}));
}

#[test]
#[serial]
fn production_handle_ignores_client_overrides() {
    let client = client();
    let _greeting = client.override_value(Greeting("test only".into()));

    let response = futures_executor::block_on(
        client.app().handle(Request::new(Method::Get, "/greet")),
    );
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body_ref().as_bytes()).expect("json body");
    assert_eq!(body, json!({"greeting": "hello, world"}));
}
