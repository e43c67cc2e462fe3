//! Request extractors.
//!
//! Extractors pull typed data out of a [`Request`]. Failures carry a
//! response: a missing or malformed field is a 422 with a located
//! [`ValidationError`], an oversized body is a 413.

use crate::context::RequestContext;
use crate::error::{HttpError, ValidationError, ValidationErrors};
use crate::query::QueryString;
use crate::request::Request;
use crate::response::{IntoResponse, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::ops::Deref;

/// Types that can be extracted from a request.
pub trait FromRequest: Sized {
    /// Error returned when extraction fails.
    type Error: IntoResponse + Send + Sync + 'static;

    /// Extract from the request.
    fn from_request(
        ctx: &RequestContext,
        req: &mut Request,
    ) -> impl Future<Output = Result<Self, Self::Error>> + Send;
}

/// Read the body, enforcing the context's size limit.
fn read_body(ctx: &RequestContext, req: &mut Request) -> Result<Vec<u8>, HttpError> {
    let limit = ctx.max_body_size();
    if req.body().len() > limit {
        tracing::debug!(
            request_id = ctx.request_id(),
            size = req.body().len(),
            limit,
            "request body exceeds limit"
        );
        return Err(HttpError::payload_too_large());
    }
    Ok(req.take_body().into_bytes())
}

fn content_type_is(req: &Request, expected: &str) -> bool {
    req.headers()
        .get_str("content-type")
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(expected))
}

/// JSON body extractor and JSON response wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwrap the inner value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned + Send,
{
    type Error = HttpError;

    async fn from_request(ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        let bytes = read_body(ctx, req)?;
        if bytes.is_empty() {
            return Err(ValidationErrors::from(ValidationError::missing(["body"])).into());
        }
        serde_json::from_slice(&bytes).map(Json).map_err(|err| {
            ValidationErrors::from(ValidationError::json_invalid(["body"], err)).into()
        })
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        Response::json(StatusCode::OK, &self.0)
    }
}

/// Decoded `key=value` parameters from one request source.
///
/// `source` is the first segment of every error location this map reports
/// (`"query"` for the query string, `"body"` for form fields).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    source: &'static str,
    pairs: Vec<(String, String)>,
}

impl ParamMap {
    /// Parse and decode a raw `key=value&...` string.
    #[must_use]
    pub fn parse(source: &'static str, raw: &str) -> Self {
        let pairs = QueryString::parse(raw)
            .pairs_decoded()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { source, pairs }
    }

    /// Where these parameters came from.
    #[must_use]
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Value for `name`. When the key repeats, the last value wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Value for `name`, or a `missing` error located at it.
    pub fn required(&self, name: &str) -> Result<&str, ValidationError> {
        self.get(name)
            .ok_or_else(|| ValidationError::missing([self.source, name]))
    }

    /// Parse `name` as an integer if present.
    pub fn optional_int(&self, name: &str) -> Result<Option<i64>, ValidationError> {
        self.get(name)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ValidationError::int_parsing([self.source, name], raw))
            })
            .transpose()
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Query-string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(ParamMap);

impl QueryParams {
    /// Parse a raw query string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(ParamMap::parse("query", raw))
    }

    /// Parameters of the given request.
    #[must_use]
    pub fn from_request_ref(req: &Request) -> Self {
        Self::parse(req.query().unwrap_or(""))
    }
}

impl Deref for QueryParams {
    type Target = ParamMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for QueryParams {
    type Error = HttpError;

    async fn from_request(_ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        Ok(Self::from_request_ref(req))
    }
}

/// `application/x-www-form-urlencoded` body fields.
///
/// A body with any other content type yields no fields, so required fields
/// report as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams(ParamMap);

impl Deref for FormParams {
    type Target = ParamMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for FormParams {
    type Error = HttpError;

    async fn from_request(ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        if !content_type_is(req, "application/x-www-form-urlencoded") {
            return Ok(Self(ParamMap::parse("body", "")));
        }
        let bytes = read_body(ctx, req)?;
        let raw = String::from_utf8_lossy(&bytes);
        Ok(Self(ParamMap::parse("body", &raw)))
    }
}

/// Path parameters captured by the router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Decoded value of a captured segment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a captured segment as an integer.
    pub fn integer(&self, name: &str) -> Result<i64, ValidationError> {
        let raw = self
            .get(name)
            .ok_or_else(|| ValidationError::missing(["path", name]))?;
        raw.parse::<i64>()
            .map_err(|_| ValidationError::int_parsing(["path", name], raw))
    }
}

impl FromRequest for PathParams {
    type Error = HttpError;

    async fn from_request(_ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        Ok(Self(req.path_params().to_vec()))
    }
}

/// Cookies sent in the `cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(Vec<(String, String)>);

impl Cookies {
    /// Parse a `cookie` header value (`a=1; b=2`).
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let pairs = header
            .split(';')
            .filter_map(|part| {
                let (name, value) = part.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect();
        Self(pairs)
    }

    /// Value of the named cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no cookies were sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromRequest for Cookies {
    type Error = HttpError;

    async fn from_request(_ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        Ok(req
            .headers()
            .get_str("cookie")
            .map(Self::parse)
            .unwrap_or_default())
    }
}

/// Shared application state of type `T`.
#[derive(Debug, Clone)]
pub struct State<T>(pub T);

impl<T> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> FromRequest for State<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Error = HttpError;

    async fn from_request(ctx: &RequestContext, _req: &mut Request) -> Result<Self, Self::Error> {
        ctx.state().get::<T>().map(State).ok_or_else(|| {
            tracing::error!(
                state = std::any::type_name::<T>(),
                "application state not registered"
            );
            HttpError::internal()
        })
    }
}

/// Convert a snake_case parameter name to its header spelling.
///
/// `x_csrf_token` becomes `X-Csrf-Token`.
#[must_use]
pub fn snake_to_header_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
#[must_use]
pub fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get_str("authorization")?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
