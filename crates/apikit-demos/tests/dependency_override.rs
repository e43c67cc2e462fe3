//! Replacing the authentication dependency from tests.

use apikit::{HttpError, TestClient, assert_json, assert_status};
use apikit_demos::app;
use apikit_demos::auth::{FakeAuthentication, VALID_TOKEN, token_from_request, unauthorized};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn client() -> TestClient {
    TestClient::new(app().expect("demo routes are valid"))
}

#[test]
fn mock_authentication_accepts_any_request() {
    let client = client();
    let _auth = client.override_value(FakeAuthentication::allow("mock"));

    let response = client.get("/protected").send();
    assert_status!(response, 200);
    assert_json!(response, serde_json::json!({"message": "Authenticated!"}));
}

#[test]
fn failing_override_rejects_invalid_token() {
    let client = client();
    let _auth = client.override_dependency::<FakeAuthentication, _, _>(|_ctx, req| {
        let token = token_from_request(req);
        async move {
            match token.as_deref() {
                Some("invalid-token") => Err(unauthorized("Invalid token")),
                _ => Ok(FakeAuthentication::allow("mock")),
            }
        }
    });

    let response = client.get("/protected").query("token", "invalid-token").send();
    assert_status!(response, 401);
    assert_json!(response, serde_json::json!({"detail": "Invalid token"}));
    assert_eq!(response.header("www-authenticate"), Some("Bearer"));
}

#[test]
fn succeeding_override_accepts_valid_token() {
    let client = client();
    let _auth = client.override_dependency::<FakeAuthentication, _, _>(|_ctx, req| {
        let token = token_from_request(req);
        async move {
            match token.as_deref() {
                Some(VALID_TOKEN) => Ok(FakeAuthentication::allow("tester")),
                _ => Err(unauthorized("Invalid token")),
            }
        }
    });

    let response = client.get("/protected").query("token", VALID_TOKEN).send();
    assert_status!(response, 200);
    assert_json!(response, serde_json::json!({"message": "Authenticated!"}));
}

#[test]
fn exactly_one_provider_runs() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _auth = client.override_dependency::<FakeAuthentication, _, _>(move |_ctx, _req| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, HttpError>(FakeAuthentication::allow("counted")) }
    });

    // The default provider would reject this request; the override must win.
    let response = client.get("/protected").query("token", "wrong").send();
    assert_status!(response, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn override_is_removed_when_guard_drops() {
    let client = client();
    {
        let _auth = client.override_value(FakeAuthentication::allow("scoped"));
        assert_status!(client.get("/protected").send(), 200);
    }
    assert!(client.overrides().is_empty());
    let response = client.get("/protected").send();
    assert_status!(response, 401);
    assert_json!(response, serde_json::json!({"detail": "Not authenticated"}));
}

#[test]
fn override_is_removed_when_test_body_panics() {
    let client = client();
    let result: std::thread::Result<()> = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _auth = client.override_value(FakeAuthentication::allow("doomed"));
        assert_status!(client.get("/protected").send(), 200);
        panic!("assertion failure inside the case");
    }));
    assert!(result.is_err());
    assert!(client.overrides().is_empty());
    assert_status!(client.get("/protected").send(), 401);
}

#[test]
fn sequential_cases_do_not_observe_each_other() {
    let client = client();

    {
        let _deny = client.override_dependency::<FakeAuthentication, _, _>(|_ctx, _req| async {
            Err::<FakeAuthentication, _>(unauthorized("Invalid token"))
        });
        assert_status!(client.get("/protected").query("token", VALID_TOKEN).send(), 401);
    }
    {
        let _allow = client.override_value(FakeAuthentication::allow("second"));
        assert_status!(client.get("/protected").query("token", "anything").send(), 200);
    }
    assert_status!(client.get("/protected").query("token", "anything").send(), 401);
}

#[test]
fn register_then_remove_matches_never_registering() {
    let client = client();
    let baseline = client.get("/protected").query("token", "nope").send();

    let registration = client
        .overrides()
        .register_value(FakeAuthentication::allow("temporary"));
    assert!(client.overrides().contains::<FakeAuthentication>());
    assert!(
        client
            .overrides()
            .remove_registration::<FakeAuthentication>(registration)
    );
    assert!(!client.overrides().remove::<FakeAuthentication>());

    let after = client.get("/protected").query("token", "nope").send();
    assert_eq!(after.status(), baseline.status());
    assert_eq!(after.text(), baseline.text());
    assert!(client.overrides().is_empty());
}

#[test]
fn clients_do_not_share_overrides() {
    let overridden = client();
    let plain = client();
    let _auth = overridden.override_value(FakeAuthentication::allow("only-here"));

    assert_status!(overridden.get("/protected").send(), 200);
    assert_status!(plain.get("/protected").send(), 401);
}

#[test]
fn later_registration_replaces_earlier() {
    let client = client();
    let first = client.override_dependency::<FakeAuthentication, _, _>(|_ctx, _req| async {
        Err::<FakeAuthentication, _>(unauthorized("Invalid token"))
    });
    let second = client.override_value(FakeAuthentication::allow("replacement"));
    assert_eq!(client.overrides().len(), 1);
    assert_status!(client.get("/protected").send(), 200);

    // Dropping the stale guard must not remove the newer override.
    drop(first);
    assert_status!(client.get("/protected").send(), 200);
    drop(second);
    assert!(client.overrides().is_empty());
}

#[test]
fn default_provider_without_overrides() {
    let client = client();
    assert_status!(client.get("/protected").query("token", VALID_TOKEN).send(), 200);

    let bearer = client
        .get("/protected")
        .header("authorization", format!("Bearer {VALID_TOKEN}"))
        .send();
    assert_status!(bearer, 200);

    let wrong = client.get("/protected").query("token", "invalid-token").send();
    assert_status!(wrong, 401);
    assert_json!(wrong, serde_json::json!({"detail": "Invalid token"}));
}
