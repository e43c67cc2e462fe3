//! Demo application.
//!
//! - `GET /`, `GET /items/{item_id}`, `POST /items`: the toy item API
//! - `GET /protected`: token authentication through [`auth::FakeAuthentication`]
//! - `/body-api`, `/header-api`, `/query-api`, `/cookie-api`, `/form-data`:
//!   one route per parameter source
//!
//! Tests drive it through [`apikit::TestClient`] and replace
//! [`auth::FakeAuthentication`] and [`db::DbSession`] with overrides.

#![forbid(unsafe_code)]

pub mod annotations;
pub mod auth;
pub mod db;
pub mod items;

use apikit::{App, AppConfig, RouterError, handler};
use db::Database;
use std::sync::Arc;

/// Build the application over a fresh `main` database.
pub fn app() -> Result<App, RouterError> {
    app_with(AppConfig::new().name("apikit-demos"), Arc::new(Database::new("main")))
}

/// Build the application with explicit configuration and database.
pub fn app_with(config: AppConfig, database: Arc<Database>) -> Result<App, RouterError> {
    App::builder()
        .config(config)
        .state(database)
        .get("/", handler!(items::read_root))
        .get("/items/{item_id}", handler!(items::read_item))
        .post("/items", handler!(items::create_item))
        .get("/protected", handler!(auth::protected_route))
        .include_router(annotations::router())
        .build()
}
