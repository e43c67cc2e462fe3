//! The toy item API: `/`, `/items/{item_id}` and `POST /items`.

use crate::db::{DbSession, StoredItem};
use apikit::extract::{Json, PathParams, QueryParams};
use apikit::{
    Depends, FromRequest, HttpError, Request, RequestContext, StatusCode, ValidationError,
    ValidationErrors,
};
use serde::Serialize;
use serde_json::{Value, json};

/// Body of `GET /items/{item_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResponse {
    /// The path id, parsed as an integer.
    pub item_id: i64,
    /// The `q` query parameter, `null` when absent.
    pub q: Option<String>,
}

/// A validated `POST /items` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Item name.
    pub name: String,
}

/// Validate a `POST /items` body: an object with a string `name`.
pub fn parse_new_item(body: &Value) -> Result<NewItem, ValidationErrors> {
    let Some(fields) = body.as_object() else {
        return Err(ValidationError::dict_type(["body"], body.clone()).into());
    };
    match fields.get("name") {
        None => Err(ValidationError::missing(["body", "name"]).into()),
        Some(Value::String(name)) => Ok(NewItem { name: name.clone() }),
        Some(other) => Err(ValidationError::string_type(["body", "name"], other.clone()).into()),
    }
}

/// `GET /`
pub async fn read_root(_ctx: &RequestContext, _req: &mut Request) -> Json<Value> {
    Json(json!({"message": "Hello World"}))
}

/// `GET /items/{item_id}?q=`
pub async fn read_item(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<Json<ItemResponse>, HttpError> {
    let path = PathParams::from_request(ctx, req).await?;
    let query = QueryParams::from_request(ctx, req).await?;
    let item_id = path
        .integer("item_id")
        .map_err(ValidationErrors::from)?;
    Ok(Json(ItemResponse {
        item_id,
        q: query.get("q").map(str::to_string),
    }))
}

/// `POST /items`
///
/// The session is resolved before the body is validated, so a rejected
/// body still opens (and releases) one session.
pub async fn create_item(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<(StatusCode, Json<StoredItem>), HttpError> {
    let session = Depends::<DbSession>::from_request(ctx, req)
        .await?
        .into_inner();
    let Json(body) = Json::<Value>::from_request(ctx, req).await?;
    let new_item = parse_new_item(&body)?;
    let stored = session.insert_item(new_item.name)?;
    tracing::info!(
        id = stored.id,
        database = %session.database_name(),
        "item created"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}
