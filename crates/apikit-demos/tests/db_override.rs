//! Swapping the request-scoped database session.

use apikit::{AppConfig, HttpError, TestClient, assert_json, assert_status};
use apikit_demos::app_with;
use apikit_demos::db::{Database, DbSession};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    client: TestClient,
    main: Arc<Database>,
}

fn fixture() -> Fixture {
    let main = Arc::new(Database::new("main"));
    let app = app_with(AppConfig::new(), Arc::clone(&main)).expect("demo routes are valid");
    Fixture {
        client: TestClient::new(app),
        main,
    }
}

#[test]
fn overridden_session_writes_to_test_database() {
    let Fixture { client, main } = fixture();
    let test_db = Arc::new(Database::new("test"));
    let provider_db = Arc::clone(&test_db);
    let _db = client.override_dependency::<DbSession, _, _>(move |ctx, _req| {
        let session = DbSession::open_scoped(ctx, &provider_db);
        async move { Ok::<_, HttpError>(session) }
    });

    let response = client.post("/items").json(&json!({"name": "Item"})).send();
    assert_status!(response, 201);
    assert_json!(response, json!({"id": 1, "name": "Item"}));

    assert_eq!(test_db.items().len(), 1);
    assert!(main.items().is_empty());
    assert_eq!(main.sessions_opened(), 0);
}

#[test]
fn overridden_session_is_released_after_the_request() {
    let Fixture { client, .. } = fixture();
    let test_db = Arc::new(Database::new("test"));
    let provider_db = Arc::clone(&test_db);
    let _db = client.override_dependency::<DbSession, _, _>(move |ctx, _req| {
        let session = DbSession::open_scoped(ctx, &provider_db);
        async move { Ok::<_, HttpError>(session) }
    });

    assert_status!(client.post("/items").json(&json!({"name": "Item"})).send(), 201);
    assert_eq!(test_db.sessions_opened(), 1);
    assert_eq!(test_db.open_sessions(), 0);
}

#[test]
fn session_is_released_when_the_body_is_rejected() {
    let Fixture { client, .. } = fixture();
    let test_db = Arc::new(Database::new("test"));
    let provider_db = Arc::clone(&test_db);
    let _db = client.override_dependency::<DbSession, _, _>(move |ctx, _req| {
        let session = DbSession::open_scoped(ctx, &provider_db);
        async move { Ok::<_, HttpError>(session) }
    });

    let response = client.post("/items").json(&json!({})).send();
    assert_status!(response, 422);
    assert_json!(
        response,
        json!({"detail": [{"type": "missing", "loc": ["body", "name"], "msg": "Field required"}]})
    );
    assert!(test_db.items().is_empty());
    assert_eq!(test_db.sessions_opened(), 1);
    assert_eq!(test_db.open_sessions(), 0);
}

#[test]
fn default_provider_uses_application_database() {
    let Fixture { client, main } = fixture();

    let first = client.post("/items").json(&json!({"name": "first"})).send();
    let second = client.post("/items").json(&json!({"name": "second"})).send();
    assert_status!(first, 201);
    assert_json!(second, json!({"id": 2, "name": "second"}));

    assert_eq!(main.items().len(), 2);
    assert_eq!(main.sessions_opened(), 2);
    assert_eq!(main.open_sessions(), 0);
}

#[test]
fn each_request_gets_a_fresh_session() {
    let Fixture { client, .. } = fixture();
    let test_db = Arc::new(Database::new("test"));
    let provider_db = Arc::clone(&test_db);
    let _db = client.override_dependency::<DbSession, _, _>(move |ctx, _req| {
        let session = DbSession::open_scoped(ctx, &provider_db);
        async move { Ok::<_, HttpError>(session) }
    });

    for name in ["a", "b", "c"] {
        assert_status!(client.post("/items").json(&json!({ "name": name })).send(), 201);
    }
    assert_eq!(test_db.sessions_opened(), 3);
    assert_eq!(test_db.sessions_closed(), 3);
}

#[test]
fn failing_session_provider_short_circuits() {
    let Fixture { client, main } = fixture();
    let _db = client.override_dependency::<DbSession, _, _>(|_ctx, _req| async {
        Err::<DbSession, _>(HttpError::internal().with_detail("database unavailable"))
    });

    let response = client.post("/items").json(&json!({"name": "Item"})).send();
    assert_status!(response, 500);
    assert_json!(response, json!({"detail": "database unavailable"}));
    assert!(main.items().is_empty());
}
