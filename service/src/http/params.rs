//! Request parameters: query string merged with JSON or form body fields.
//!
//! Body fields take precedence over query fields with the same name. The
//! decrypt middleware attaches the merged set (including decrypted fields) as
//! a request extension; handlers read it with the [`RequestParams`] extractor.

use std::borrow::Cow;
use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap},
};
use serde_json::{Map, Value};

/// An immutable set of request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    values: Map<String, Value>,
}

impl RequestParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parse a raw query string (without the leading `?`).
    #[must_use]
    pub fn from_query(query: Option<&str>) -> Self {
        query.map_or_else(Self::new, |q| Self::from_map(parse_form(q)))
    }

    /// A copy of these parameters with `extra` merged on top.
    ///
    /// Keys in `extra` overwrite existing keys; all other keys are kept in
    /// their original order.
    #[must_use]
    pub fn with_params(&self, extra: Map<String, Value>) -> Self {
        let mut values = self.values.clone();
        values.extend(extra);
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of `key`, if present and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestParams {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(|| Self::from_query(parts.uri.query())))
    }
}

/// How a request body carries parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `application/json` or any `+json` media type.
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// Anything else; the body is left alone.
    Other,
}

impl BodyKind {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(mime) = content_type(headers) else {
            return Self::Other;
        };
        if is_json_mime(&mime) {
            Self::Json
        } else if mime == "application/x-www-form-urlencoded" {
            Self::Form
        } else {
            Self::Other
        }
    }

    /// Parse body fields. Returns `None` unless the body is a parameter
    /// mapping (a JSON object or a form); an empty body counts as an empty
    /// mapping.
    #[must_use]
    pub fn parse(self, body: &[u8]) -> Option<Map<String, Value>> {
        match self {
            Self::Json if body.iter().all(u8::is_ascii_whitespace) => Some(Map::new()),
            Self::Json => match serde_json::from_slice(body) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            Self::Form => std::str::from_utf8(body).ok().map(parse_form),
            Self::Other => None,
        }
    }

    /// Serialize fields back into a body of this kind, so the original
    /// `Content-Type` stays accurate.
    #[must_use]
    pub fn encode(self, fields: &Map<String, Value>) -> Option<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec(fields).ok(),
            Self::Form => Some(encode_form(fields).into_bytes()),
            Self::Other => None,
        }
    }
}

/// Lower-cased media type without parameters.
fn content_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = raw.split(';').next().unwrap_or_default().trim();
    Some(mime.to_ascii_lowercase())
}

fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || mime.ends_with("+json")
}

/// Whether the headers declare a JSON body.
#[must_use]
pub fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|mime| is_json_mime(&mime))
}

/// Decode `application/x-www-form-urlencoded` text. Later duplicates win.
#[must_use]
pub fn parse_form(input: &str) -> Map<String, Value> {
    let mut values = Map::new();
    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let (Some(key), Some(value)) = (decode_component(key), decode_component(value)) else {
            continue;
        };
        if !key.is_empty() {
            values.insert(key, Value::String(value));
        }
    }
    values
}

/// Encode fields as `application/x-www-form-urlencoded`. Values that are not
/// strings are written as JSON text.
#[must_use]
pub fn encode_form(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => Cow::Borrowed(s.as_str()),
                other => Cow::Owned(other.to_string()),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}
