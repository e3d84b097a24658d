//! REST API handlers and `OpenAPI` documentation.
//!
//! The only route is an echo endpoint that reports the parameters it received,
//! which makes the encrypted exchange observable end to end.

// The OpenApi derive macro generates code that triggers this lint
#![allow(clippy::needless_for_each)]

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use utoipa::{OpenApi, ToSchema};

use crate::http::params::RequestParams;

/// Serialize a `StatusCode` as its `u16` representation.
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires `&T` signature
fn serialize_status_code<S: Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

/// RFC 7807 Problem Details error response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Short human-readable summary
    pub title: String,
    /// HTTP status code
    #[serde(serialize_with = "serialize_status_code")]
    #[schema(value_type = u16)]
    pub status: StatusCode,
    /// Human-readable explanation specific to this occurrence
    pub detail: String,
    /// URI reference identifying the specific occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ProblemExtensions>,
}

/// Machine-readable error code.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProblemExtensions {
    /// Stable error code, e.g. `ENCRYPTION_FAILED`
    pub code: String,
}

impl ProblemDetails {
    fn new(status: StatusCode, slug: &str, title: &str, detail: &str, code: &str) -> Self {
        Self {
            problem_type: format!("/errors/{slug}"),
            title: title.to_string(),
            status,
            detail: detail.to_string(),
            instance: None,
            extensions: Some(ProblemExtensions {
                code: code.to_string(),
            }),
        }
    }

    /// The client asked for an encrypted response that could not be produced.
    #[must_use]
    pub fn encryption_failed(detail: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "encryption-failed",
            "Response Encryption Failed",
            detail,
            "ENCRYPTION_FAILED",
        )
    }

    /// The request body exceeded the configured buffering limit.
    #[must_use]
    pub fn payload_too_large(detail: &str) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload-too-large",
            "Payload Too Large",
            detail,
            "PAYLOAD_TOO_LARGE",
        )
    }

    /// The request was refused by an allow-list.
    #[must_use]
    pub fn forbidden(detail: &str) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Forbidden",
            detail,
            "FORBIDDEN",
        )
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}

/// Wire envelope carrying an RSA-OAEP ciphertext.
///
/// Sent as the `encrypted` request parameter, and returned as the whole body
/// when the client sends `X-Vormia-Encrypted: 1`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvelopeSchema {
    /// Standard base64 of the ciphertext
    pub encrypted: String,
}

/// `OpenAPI` documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "VormiaQuery API",
        version = "1.0.0",
        description = "Encrypted request/response exchange",
        license(name = "MIT")
    ),
    servers(
        (url = "/api/v1", description = "REST API v1")
    ),
    paths(echo),
    components(schemas(EnvelopeSchema, ProblemDetails, ProblemExtensions))
)]
pub struct ApiDoc;

/// REST routes, mounted under `/api/v1`.
pub fn router() -> Router {
    Router::new().route("/echo", post(echo).get(echo))
}

/// Echo request parameters
///
/// Returns the query and body parameters as the handler sees them, after any
/// `encrypted` field has been decrypted and merged.
#[utoipa::path(
    post,
    path = "/echo",
    tag = "Exchange",
    request_body(content = EnvelopeSchema, description = "Any parameters, optionally with an `encrypted` field"),
    params(
        ("X-Vormia-Encrypted" = Option<String>, Header, description = "Set to `1` to receive an encrypted envelope")
    ),
    responses(
        (status = 200, description = "Parameters received, or an encrypted envelope of them"),
        (status = 500, description = "Encryption was requested but failed", body = ProblemDetails)
    )
)]
#[allow(clippy::unused_async)] // Required for Axum handler signature
pub async fn echo(params: RequestParams) -> Json<Map<String, Value>> {
    Json(params.into_map())
}
