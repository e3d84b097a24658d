//! Shared cryptographic utilities for `VormiaQuery`
//!
//! This crate provides the RSA-OAEP envelope used on the wire by the server
//! middleware (as a native library) and by browser clients (compiled to WASM).

use base64::alphabet::STANDARD as STANDARD_ALPHABET;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use wasm_bindgen::prelude::*;

mod envelope;
pub use envelope::{
    decrypt, encrypt, max_plaintext_len, CipherError, EncryptedEnvelope, ENVELOPE_FIELD,
};

mod keys;
pub use keys::{normalize_pem, parse_private_key_pem, parse_public_key_pem, KeyError};

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Decoder that accepts standard base64 with or without trailing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &STANDARD_ALPHABET,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as standard (RFC 4648 §4) base64 with padding.
#[wasm_bindgen]
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring ASCII whitespace and missing padding.
///
/// # Errors
/// Returns `base64::DecodeError` if the input contains characters outside the
/// standard alphabet or has an impossible length.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        LENIENT.decode(compact)
    } else {
        LENIENT.decode(encoded)
    }
}

/// Seal a JSON document for the server (WASM binding).
///
/// Returns the base64 value to send as the `encrypted` field.
///
/// # Errors
/// Returns `JsError` if the key or JSON is invalid, or the document is too
/// large for a single RSA-OAEP block.
#[wasm_bindgen(js_name = "seal_json")]
pub fn seal_json_js(public_key_pem: &str, json: &str) -> Result<String, JsError> {
    let key = parse_public_key_pem(public_key_pem).map_err(|e| JsError::new(&e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| JsError::new(&e.to_string()))?;
    EncryptedEnvelope::seal_json(&key, &value)
        .map(|envelope| envelope.encrypted)
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Open an `encrypted` value and return the plaintext as UTF-8 (WASM binding).
///
/// # Errors
/// Returns `JsError` if the key is invalid, decryption fails, or the
/// plaintext is not UTF-8.
#[wasm_bindgen(js_name = "open_envelope")]
pub fn open_envelope_js(private_key_pem: &str, encrypted: &str) -> Result<String, JsError> {
    let key =
        parse_private_key_pem(private_key_pem).map_err(|e| JsError::new(&e.to_string()))?;
    let plaintext = EncryptedEnvelope::from_encoded(encrypted)
        .open(&key)
        .map_err(|e| JsError::new(&e.to_string()))?;
    String::from_utf8(plaintext).map_err(|e| JsError::new(&e.to_string()))
}
