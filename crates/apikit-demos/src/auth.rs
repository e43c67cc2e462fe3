//! Token authentication for `/protected`.
//!
//! The token is read from the `token` query parameter, falling back to an
//! `Authorization: Bearer` header. Only [`VALID_TOKEN`] is accepted by the
//! default provider; tests swap [`FakeAuthentication`] out entirely.

use apikit::extract::{Json, QueryParams, bearer_token};
use apikit::{Depends, FromDependency, FromRequest, HttpError, Request, RequestContext};
use serde_json::{Value, json};

/// The one token the default provider accepts.
pub const VALID_TOKEN: &str = "valid-token";

/// Identity produced by a successful authentication check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAuthentication {
    /// Authenticated user name.
    pub username: String,
}

impl FakeAuthentication {
    /// An identity for `username`, for use as an override value.
    #[must_use]
    pub fn allow(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// 401 with a `www-authenticate: Bearer` challenge.
#[must_use]
pub fn unauthorized(detail: &str) -> HttpError {
    HttpError::unauthorized()
        .with_detail(detail)
        .with_header("www-authenticate", b"Bearer".to_vec())
}

/// The token presented by the request, if any.
#[must_use]
pub fn token_from_request(req: &Request) -> Option<String> {
    QueryParams::from_request_ref(req)
        .get("token")
        .map(str::to_string)
        .or_else(|| bearer_token(req).map(str::to_string))
}

/// Accept [`VALID_TOKEN`]; reject anything else.
pub fn check_token(token: Option<&str>) -> Result<FakeAuthentication, HttpError> {
    match token {
        None => Err(unauthorized("Not authenticated")),
        Some(VALID_TOKEN) => Ok(FakeAuthentication::allow("demo-user")),
        Some(_) => Err(unauthorized("Invalid token")),
    }
}

impl FromDependency for FakeAuthentication {
    type Error = HttpError;

    async fn from_dependency(_ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        check_token(token_from_request(req).as_deref())
    }
}

/// `GET /protected`
pub async fn protected_route(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<Json<Value>, HttpError> {
    let user = Depends::<FakeAuthentication>::from_request(ctx, req)
        .await?
        .into_inner();
    tracing::debug!(user = %user.username, "authenticated request");
    Ok(Json(json!({"message": "Authenticated!"})))
}
