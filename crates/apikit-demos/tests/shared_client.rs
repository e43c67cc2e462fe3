//! Overrides installed on a client shared by several tests.
//!
//! The tests mutate one registry, so they run serially and each leaves it
//! empty through its guard.

use apikit::{TestClient, assert_json, assert_status};
use apikit_demos::app;
use apikit_demos::auth::FakeAuthentication;
use serde_json::json;
use serial_test::serial;
use std::sync::LazyLock;

static CLIENT: LazyLock<TestClient> =
    LazyLock::new(|| TestClient::new(app().expect("demo routes are valid")));

#[test]
#[serial]
fn shared_client_starts_without_overrides() {
    assert!(CLIENT.overrides().is_empty());
    assert_status!(CLIENT.get("/protected").send(), 401);
}

#[test]
#[serial]
fn shared_client_override_is_scoped_to_test() {
    let _auth = CLIENT.override_value(FakeAuthentication::allow("shared"));
    let response = CLIENT.get("/protected").send();
    assert_status!(response, 200);
    assert_json!(response, json!({"message": "Authenticated!"}));
}

#[test]
#[serial]
fn shared_client_sees_no_leftover_from_other_tests() {
    {
        let _auth = CLIENT.override_value(FakeAuthentication::allow("first"));
        assert_eq!(CLIENT.overrides().len(), 1);
    }
    assert!(CLIENT.overrides().is_empty());
    let response = CLIENT.get("/protected").query("token", "not-valid").send();
    assert_status!(response, 401);
    assert_json!(response, json!({"detail": "Invalid token"}));
}

#[test]
#[serial]
fn clones_share_the_registry() {
    let clone = CLIENT.clone();
    let auth = clone.override_value(FakeAuthentication::allow("via-clone"));
    assert_status!(CLIENT.get("/protected").send(), 200);
    drop(auth);
    assert_status!(CLIENT.get("/protected").send(), 401);
}
