//! Encrypted request/response exchange.
//!
//! Two independent middleware stages share the key provider through an
//! `Extension<EncryptionContext>`:
//!
//! - [`decrypt_request_middleware`] collects the request parameters, opens an
//!   `encrypted` parameter with the private key and merges the JSON object
//!   inside it. Any failure falls back to the untouched request.
//! - [`encrypt_response_middleware`] replaces the response body with
//!   `{"encrypted": "..."}` when the client opted in and a public key is
//!   configured. A failure here is a hard error; plaintext is never sent to a
//!   client that asked for encryption.
//!
//! ```ignore
//! let app = Router::new()
//!     // ... routes ...
//!     .layer(middleware::from_fn(decrypt_request_middleware))
//!     .layer(middleware::from_fn(encrypt_response_middleware))
//!     .layer(Extension(EncryptionContext::new(keys, 2 * 1024 * 1024)));
//! ```

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{
        header::{CONTENT_LENGTH, TRANSFER_ENCODING},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{Map, Value};
use std::string::FromUtf8Error;
use vq_crypto::{CipherError, EncryptedEnvelope, RsaPrivateKey, RsaPublicKey, ENVELOPE_FIELD};

use super::params::{is_json, BodyKind, RequestParams};
use crate::keys::SharedKeyProvider;
use crate::rest::ProblemDetails;
use crate::security::{log_security_event, SecurityContext};

/// Request header a client sets to `1` to receive an encrypted response.
pub const ENCRYPTED_RESPONSE_HEADER: &str = "x-vormia-encrypted";

/// Marker that forces an encrypted response.
///
/// Insert it into the request extensions upstream of the encrypt stage, or
/// into the response extensions from a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectsEncryptedResponse;

/// Shared state for both stages.
#[derive(Clone)]
pub struct EncryptionContext {
    keys: SharedKeyProvider,
    max_body_bytes: usize,
    trust_forwarded_for: bool,
}

impl EncryptionContext {
    #[must_use]
    pub fn new(keys: SharedKeyProvider, max_body_bytes: usize) -> Self {
        Self {
            keys,
            max_body_bytes,
            trust_forwarded_for: false,
        }
    }

    /// Take the client IP for security logs from `X-Forwarded-For`.
    #[must_use]
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    #[must_use]
    pub fn security_context(&self, request: &Request) -> SecurityContext {
        SecurityContext::from_request(request, self.trust_forwarded_for)
    }
}

/// Why an inbound `encrypted` field was ignored.
#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    #[error("encrypted field is not a string")]
    NotAString,
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("decrypted payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("decrypted payload is a JSON {0}, not an object")]
    NotAnObject(&'static str),
}

/// Why an opted-in response could not be encrypted.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionFailed {
    #[error("failed to buffer response body: {0}")]
    Body(#[source] axum::Error),
    #[error("response body is not valid UTF-8")]
    NonUtf8Body(#[from] FromUtf8Error),
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl IntoResponse for EncryptionFailed {
    fn into_response(self) -> Response {
        ProblemDetails::encryption_failed("The response could not be encrypted").into_response()
    }
}

/// Open an `encrypted` parameter value into a JSON object.
///
/// # Errors
/// Returns `DecodeFailure` for bad base64, a failed decryption, invalid JSON,
/// or JSON that is not an object.
pub fn decode_payload(key: &RsaPrivateKey, encoded: &Value) -> Result<Map<String, Value>, DecodeFailure> {
    let encoded = encoded.as_str().ok_or(DecodeFailure::NotAString)?;
    let plaintext = EncryptedEnvelope::from_encoded(encoded).open(key)?;
    match serde_json::from_slice(&plaintext)? {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(DecodeFailure::NotAnObject("array")),
        Value::String(_) => Err(DecodeFailure::NotAnObject("string")),
        Value::Number(_) => Err(DecodeFailure::NotAnObject("number")),
        Value::Bool(_) => Err(DecodeFailure::NotAnObject("boolean")),
        Value::Null => Err(DecodeFailure::NotAnObject("null")),
    }
}

/// Logical payload of a response: decoded JSON for JSON responses, otherwise
/// the raw body as a string.
///
/// # Errors
/// Returns `FromUtf8Error` when a body that is not JSON is not UTF-8 text.
pub fn response_payload(is_json_body: bool, body: &[u8]) -> Result<Value, FromUtf8Error> {
    if is_json_body {
        if let Ok(value) = serde_json::from_slice(body) {
            return Ok(value);
        }
    }
    String::from_utf8(body.to_vec()).map(Value::String)
}

/// Whether the request opted in to an encrypted response.
#[must_use]
pub fn wants_encrypted_response(request: &Request) -> bool {
    request
        .extensions()
        .get::<ExpectsEncryptedResponse>()
        .is_some()
        || request
            .headers()
            .get(ENCRYPTED_RESPONSE_HEADER)
            .is_some_and(|value| value.as_bytes() == b"1")
}

/// Inbound stage: collect the request parameters and merge a decrypted
/// `encrypted` parameter into them.
///
/// JSON and form bodies are buffered so their fields join the query string in
/// the [`RequestParams`] extension, whether or not a private key is
/// configured. A body whose declared `Content-Length` is over the limit is
/// passed on unread. When a payload is merged into a body it is re-encoded in
/// its original format so `Json<T>` and `Form<T>` extractors see the new
/// fields.
pub async fn decrypt_request_middleware(
    Extension(ctx): Extension<EncryptionContext>,
    request: Request,
    next: Next,
) -> Response {
    let query = RequestParams::from_query(request.uri().query());
    let kind = BodyKind::from_headers(request.headers());
    let (mut parts, body) = request.into_parts();

    if kind == BodyKind::Other {
        parts.extensions.insert(query);
        return next.run(Request::from_parts(parts, body)).await;
    }
    if let Some(length) = declared_length(&parts.headers).filter(|&n| n > ctx.max_body_bytes) {
        tracing::debug!(length, limit = ctx.max_body_bytes, "request body too large to inspect");
        parts.extensions.insert(query);
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match to_bytes(body, ctx.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, limit = ctx.max_body_bytes, "request body rejected");
            return ProblemDetails::payload_too_large("Request body exceeds the configured limit")
                .into_response();
        }
    };
    let body_fields = kind.parse(&bytes);
    let params = match &body_fields {
        Some(fields) => query.with_params(fields.clone()),
        None => query,
    };

    let payload = match (ctx.keys.private_key(), params.get(ENVELOPE_FIELD)) {
        (Some(key), Some(encoded)) => match decode_payload(&key, encoded) {
            Ok(payload) => Some(payload),
            Err(failure) => {
                tracing::warn!(error = %failure, "ignoring undecryptable request payload");
                None
            }
        },
        _ => None,
    };
    let Some(payload) = payload else {
        parts.extensions.insert(params);
        return next.run(Request::from_parts(parts, Body::from(bytes))).await;
    };

    tracing::debug!(fields = payload.len(), "merged decrypted request payload");

    let rewritten = body_fields.and_then(|mut fields| {
        fields.extend(payload.clone());
        kind.encode(&fields)
    });
    let body = match rewritten {
        Some(encoded) => replace_body(&mut parts, encoded),
        None => Body::from(bytes),
    };

    parts.extensions.insert(params.with_params(payload));
    next.run(Request::from_parts(parts, body)).await
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

/// Swap in a fixed-length body, keeping the framing headers consistent.
fn replace_body(parts: &mut Parts, bytes: Vec<u8>) -> Body {
    parts.headers.remove(TRANSFER_ENCODING);
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Body::from(bytes)
}

/// Outbound stage: encrypt the response for clients that opted in.
///
/// The original status code is kept; the body becomes
/// `{"encrypted": "<base64>"}` with a JSON content type.
pub async fn encrypt_response_middleware(
    Extension(ctx): Extension<EncryptionContext>,
    request: Request,
    next: Next,
) -> Response {
    let requested = wants_encrypted_response(&request);
    let security_context = requested.then(|| ctx.security_context(&request));

    let response = next.run(request).await;

    let flagged = response
        .extensions()
        .get::<ExpectsEncryptedResponse>()
        .is_some();
    if !requested && !flagged {
        return response;
    }
    let Some(public_key) = ctx.keys.public_key() else {
        return response;
    };

    match seal_response(&public_key, response, ctx.max_body_bytes).await {
        Ok(sealed) => sealed,
        Err(err) => {
            let context = security_context.unwrap_or_default();
            log_security_event("response_encryption_failed", &context);
            tracing::error!(error = %err, "refusing to send an unencrypted response");
            err.into_response()
        }
    }
}

async fn seal_response(
    key: &RsaPublicKey,
    response: Response,
    limit: usize,
) -> Result<Response, EncryptionFailed> {
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, limit)
        .await
        .map_err(EncryptionFailed::Body)?;
    let payload = response_payload(is_json(&parts.headers), &bytes)?;
    let envelope = EncryptedEnvelope::seal_json(key, &payload)?;
    Ok((parts.status, Json(envelope)).into_response())
}
