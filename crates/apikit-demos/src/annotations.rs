//! Parameter-source demos: body, header, query, cookie and form.
//!
//! Each schema has a `parse` function that reads its source and collects
//! every field error before returning, so a 422 lists all of them.

use apikit::extract::{Cookies, FormParams, Json, ParamMap, QueryParams, snake_to_header_case};
use apikit::{
    APIRouter, FromRequest, HttpError, Request, RequestContext, ValidationError,
    ValidationErrors, handler,
};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Embedded body of `POST /body-api`, sent as `{"body": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyData {
    /// Item name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Price, strictly positive.
    pub price: f64,
    /// Optional tax.
    pub tax: Option<f64>,
}

impl BodyData {
    /// Parse the embedded `body` object out of a request payload.
    pub fn parse(payload: &Value) -> Result<Self, ValidationErrors> {
        let body = match payload.get("body") {
            Some(body) => body,
            None => return Err(ValidationError::missing(["body", "body"]).into()),
        };
        let Some(fields) = body.as_object() else {
            return Err(ValidationError::dict_type(["body", "body"], body.clone()).into());
        };

        let mut errors = ValidationErrors::new();
        let name = required_string(fields, "name", &mut errors);
        let description = optional_string(fields, "description", &mut errors);
        let tax = optional_number(fields, "tax", &mut errors);
        let price = match fields.get("price") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::missing(["price"]));
                None
            }
            Some(value) => match value.as_f64() {
                Some(price) if price > 0.0 => Some(price),
                Some(_) => {
                    errors.push(ValidationError::greater_than(["price"], 0, value.clone()));
                    None
                }
                None => {
                    errors.push(ValidationError::float_type(["price"], value.clone()));
                    None
                }
            },
        };

        match (name, price) {
            (Some(name), Some(price)) if errors.is_empty() => Ok(Self {
                name,
                description,
                price,
                tax,
            }),
            _ => Err(errors.with_prefix(["body", "body"])),
        }
    }
}

fn required_string(
    fields: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => {
            errors.push(ValidationError::missing([key]));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            errors.push(ValidationError::string_type([key], other.clone()));
            None
        }
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            errors.push(ValidationError::string_type([key], other.clone()));
            None
        }
    }
}

fn optional_number(
    fields: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => value.as_f64().or_else(|| {
            errors.push(ValidationError::float_type([key], value.clone()));
            None
        }),
    }
}

/// Sort column accepted by `POST /query-api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Creation time (the default).
    #[default]
    CreatedAt,
    /// Last update time.
    UpdatedAt,
}

impl OrderBy {
    const CHOICES: [&'static str; 2] = ["created_at", "updated_at"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

/// Query model of `POST /query-api`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterData {
    /// Page size, `0 < limit <= 100`.
    pub limit: i64,
    /// Rows to skip, `>= 0`.
    pub offset: i64,
    /// Sort column.
    pub order_by: OrderBy,
    /// Tag filter; repeated `tags` parameters.
    pub tags: Vec<String>,
}

impl Default for FilterData {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            order_by: OrderBy::CreatedAt,
            tags: Vec::new(),
        }
    }
}

impl FilterData {
    /// Parse and range-check the query string.
    pub fn parse(query: &ParamMap) -> Result<Self, ValidationErrors> {
        let defaults = Self::default();
        let mut errors = ValidationErrors::new();
        let loc = |field: &str| [query.source().to_string(), field.to_string()];

        let limit = match query.optional_int("limit") {
            Ok(Some(limit)) if limit <= 0 => {
                errors.push(ValidationError::greater_than(loc("limit"), 0, limit));
                defaults.limit
            }
            Ok(Some(limit)) if limit > 100 => {
                errors.push(ValidationError::less_than_equal(loc("limit"), 100, limit));
                defaults.limit
            }
            Ok(Some(limit)) => limit,
            Ok(None) => defaults.limit,
            Err(err) => {
                errors.push(err);
                defaults.limit
            }
        };

        let offset = match query.optional_int("offset") {
            Ok(Some(offset)) if offset < 0 => {
                errors.push(ValidationError::greater_than_equal(loc("offset"), 0, offset));
                defaults.offset
            }
            Ok(Some(offset)) => offset,
            Ok(None) => defaults.offset,
            Err(err) => {
                errors.push(err);
                defaults.offset
            }
        };

        let order_by = match query.get("order_by") {
            None => defaults.order_by,
            Some(raw) => OrderBy::from_name(raw).unwrap_or_else(|| {
                errors.push(ValidationError::literal_error(
                    loc("order_by"),
                    &OrderBy::CHOICES,
                    raw,
                ));
                defaults.order_by
            }),
        };

        let tags = query
            .get_all("tags")
            .into_iter()
            .map(str::to_string)
            .collect();

        if errors.is_empty() {
            Ok(Self {
                limit,
                offset,
                order_by,
                tags,
            })
        } else {
            Err(errors)
        }
    }
}

/// Form model of `POST /form-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormData {
    /// Login name.
    pub username: String,
    /// Password, echoed back verbatim.
    pub password: String,
}

impl FormData {
    /// Read both required fields from an urlencoded form.
    pub fn parse(form: &ParamMap) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let username = form
            .required("username")
            .map_err(|err| errors.push(err))
            .ok();
        let password = form
            .required("password")
            .map_err(|err| errors.push(err))
            .ok();
        match (username, password) {
            (Some(username), Some(password)) => Ok(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

/// `POST /body-api`
pub async fn body_api(ctx: &RequestContext, req: &mut Request) -> Result<Json<BodyData>, HttpError> {
    let Json(payload) = Json::<Value>::from_request(ctx, req).await?;
    Ok(Json(BodyData::parse(&payload)?))
}

/// `POST /header-api`
pub async fn header_api(_ctx: &RequestContext, req: &mut Request) -> Json<Value> {
    let token = req
        .headers()
        .get_str(&snake_to_header_case("x_csrf_token"))
        .map(str::to_string);
    Json(json!({ "X-CSRF-Token": token }))
}

/// `POST /query-api`
pub async fn query_api(
    ctx: &RequestContext,
    req: &mut Request,
) -> Result<Json<FilterData>, HttpError> {
    let query = QueryParams::from_request(ctx, req).await?;
    Ok(Json(FilterData::parse(&query)?))
}

/// `GET /cookie-api`
pub async fn cookie_api(ctx: &RequestContext, req: &mut Request) -> Result<Json<Value>, HttpError> {
    let cookies = Cookies::from_request(ctx, req).await?;
    Ok(Json(json!({ "ads_id": cookies.get("ads_id") })))
}

/// `POST /form-data`
pub async fn form_data(ctx: &RequestContext, req: &mut Request) -> Result<Json<FormData>, HttpError> {
    let form = FormParams::from_request(ctx, req).await?;
    Ok(Json(FormData::parse(&form)?))
}

/// The annotation demo routes, mounted at the application root.
#[must_use]
pub fn router() -> APIRouter {
    APIRouter::new()
        .post("/body-api", handler!(body_api))
        .post("/header-api", handler!(header_api))
        .post("/query-api", handler!(query_api))
        .get("/cookie-api", handler!(cookie_api))
        .post("/form-data", handler!(form_data))
}
