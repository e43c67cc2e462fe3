//! Walk through the demo routes with and without overrides.
//!
//! Configuration comes from `apikit.toml` and `APIKIT_*` variables; set
//! `RUST_LOG=debug` to watch dependency resolution.
//!
//! Run with: cargo run --example tour -p apikit-demos

use apikit::core::logging;
use apikit::{AppConfig, LogConfig, TestClient};
use apikit_demos::app_with;
use apikit_demos::auth::{FakeAuthentication, VALID_TOKEN};
use apikit_demos::db::Database;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    logging::init(&LogConfig::from(&config))?;

    let database = Arc::new(Database::new("main"));
    let client = TestClient::new(app_with(config, Arc::clone(&database))?);
    println!("{} routes:", client.app().route_count());
    for (method, path) in client.app().routes() {
        println!("   {method} {path}");
    }

    println!("\n1. Item API");
    let response = client.get("/items/42").query("q", "tour").send();
    println!("   GET /items/42?q=tour -> {} {}", response.status().as_u16(), response.text());
    let response = client.get("/items/forty-two").send();
    println!("   GET /items/forty-two -> {}", response.status().as_u16());

    println!("\n2. Authentication");
    for token in [Some(VALID_TOKEN), Some("invalid-token"), None] {
        let mut request = client.get("/protected");
        if let Some(token) = token {
            request = request.query("token", token);
        }
        let response = request.send();
        println!(
            "   token={} -> {} {}",
            token.unwrap_or("<none>"),
            response.status().as_u16(),
            response.text()
        );
    }

    println!("\n3. With an authentication override");
    {
        let _auth = client.override_value(FakeAuthentication::allow("tour"));
        let response = client.get("/protected").send();
        println!("   no token -> {} {}", response.status().as_u16(), response.text());
    }
    let response = client.get("/protected").send();
    println!("   guard dropped -> {}", response.status().as_u16());

    println!("\n4. Writes");
    let response = client
        .post("/items")
        .json(&serde_json::json!({"name": "Tour item"}))
        .send();
    println!("   POST /items -> {} {}", response.status().as_u16(), response.text());
    println!(
        "   sessions opened={} open={}",
        database.sessions_opened(),
        database.open_sessions()
    );

    Ok(())
}
