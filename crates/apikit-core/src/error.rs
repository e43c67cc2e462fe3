//! Error types that map onto HTTP responses.
//!
//! [`HttpError`] is the general short-circuit error: handlers and dependency
//! providers return it to abort a request with a status code and a
//! `{"detail": ...}` body. [`ValidationErrors`] collects field-level problems
//! and renders as a 422 response listing every failing field.

use crate::response::{IntoResponse, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// An error that short-circuits request handling with an HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    /// Response status code.
    pub status: StatusCode,
    /// Optional `detail` payload. Defaults to the reason phrase.
    pub detail: Option<Value>,
    /// Extra response headers (e.g. `www-authenticate`).
    pub headers: Vec<(String, Vec<u8>)>,
}

impl HttpError {
    /// Create an error with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            detail: None,
            headers: Vec::new(),
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE).with_detail("Request body too large")
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Set a textual detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(Value::String(detail.into()));
        self
    }

    /// Add a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The detail as it will appear in the response body.
    #[must_use]
    pub fn detail_value(&self) -> Value {
        self.detail
            .clone()
            .unwrap_or_else(|| Value::String(self.status.canonical_reason().to_string()))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(Value::String(detail)) => write!(f, "{}: {detail}", self.status),
            Some(detail) => write!(f, "{}: {detail}", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.detail_value() });
        let mut response = Response::json(self.status, &body);
        for (name, value) in self.headers {
            response = response.header(name, value);
        }
        response
    }
}

impl From<ValidationErrors> for HttpError {
    fn from(errors: ValidationErrors) -> Self {
        let detail = serde_json::to_value(&errors.errors).unwrap_or(Value::Null);
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: Some(detail),
            headers: Vec::new(),
        }
    }
}

/// One segment of an error location, e.g. `["body", "tags", 0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocItem {
    /// Named field or source (`"query"`, `"limit"`).
    Field(String),
    /// Sequence index.
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(value: &str) -> Self {
        Self::Field(value.to_string())
    }
}

impl From<String> for LocItem {
    fn from(value: String) -> Self {
        Self::Field(value)
    }
}

impl From<usize> for LocItem {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Machine-readable error kind (`missing`, `int_parsing`, ...).
    #[serde(rename = "type")]
    pub error_type: String,
    /// Location of the failing input.
    pub loc: Vec<LocItem>,
    /// Human-readable message.
    pub msg: String,
    /// The offending input, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl ValidationError {
    /// Create an error of an arbitrary kind.
    pub fn new<L, I>(error_type: impl Into<String>, loc: L, msg: impl Into<String>) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self {
            error_type: error_type.into(),
            loc: loc.into_iter().map(Into::into).collect(),
            msg: msg.into(),
            input: None,
        }
    }

    /// Attach the offending input.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Required field absent.
    pub fn missing<L, I>(loc: L) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new("missing", loc, "Field required")
    }

    /// Text that should have been an integer.
    pub fn int_parsing<L, I>(loc: L, input: &str) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new(
            "int_parsing",
            loc,
            "Input should be a valid integer, unable to parse string as an integer",
        )
        .with_input(input)
    }

    /// JSON value that should have been a number.
    pub fn float_type<L, I>(loc: L, input: Value) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new("float_type", loc, "Input should be a valid number").with_input(input)
    }

    /// JSON value that should have been a string.
    pub fn string_type<L, I>(loc: L, input: Value) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new("string_type", loc, "Input should be a valid string").with_input(input)
    }

    /// JSON value that should have been an object.
    pub fn dict_type<L, I>(loc: L, input: Value) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new("dict_type", loc, "Input should be a valid dictionary").with_input(input)
    }

    /// Value not strictly greater than `limit`.
    pub fn greater_than<L, I>(loc: L, limit: impl fmt::Display, input: impl Into<Value>) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new(
            "greater_than",
            loc,
            format!("Input should be greater than {limit}"),
        )
        .with_input(input)
    }

    /// Value below the inclusive lower bound.
    pub fn greater_than_equal<L, I>(
        loc: L,
        limit: impl fmt::Display,
        input: impl Into<Value>,
    ) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new(
            "greater_than_equal",
            loc,
            format!("Input should be greater than or equal to {limit}"),
        )
        .with_input(input)
    }

    /// Value above the inclusive upper bound.
    pub fn less_than_equal<L, I>(loc: L, limit: impl fmt::Display, input: impl Into<Value>) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new(
            "less_than_equal",
            loc,
            format!("Input should be less than or equal to {limit}"),
        )
        .with_input(input)
    }

    /// Value outside a fixed set of literals.
    pub fn literal_error<L, I>(loc: L, expected: &[&str], input: &str) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        let quoted: Vec<String> = expected.iter().map(|e| format!("'{e}'")).collect();
        let msg = match quoted.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                format!("Input should be {} or {last}", rest.join(", "))
            }
            Some((only, _)) => format!("Input should be {only}"),
            None => "Input should be one of the allowed values".to_string(),
        };
        Self::new("literal_error", loc, msg).with_input(input)
    }

    /// Body that failed to decode.
    pub fn json_invalid<L, I>(loc: L, reason: impl fmt::Display) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        Self::new("json_invalid", loc, format!("JSON decode error: {reason}"))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc: Vec<String> = self
            .loc
            .iter()
            .map(|item| match item {
                LocItem::Field(name) => name.clone(),
                LocItem::Index(idx) => idx.to_string(),
            })
            .collect();
        write!(f, "{}: {}", loc.join("."), self.msg)
    }
}

/// An ordered collection of field validation failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record every failure from another collection.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over the failures.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Prepend location segments to every failure.
    #[must_use]
    pub fn with_prefix<L, I>(mut self, prefix: L) -> Self
    where
        L: IntoIterator<Item = I>,
        I: Into<LocItem>,
    {
        let prefix: Vec<LocItem> = prefix.into_iter().map(Into::into).collect();
        for error in &mut self.errors {
            let mut loc = prefix.clone();
            loc.append(&mut error.loc);
            error.loc = loc;
        }
        self
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}
