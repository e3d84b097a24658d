//! Common test utilities for integration tests.
//!
//! This module provides:
//!
//! - [`app_builder::TestAppBuilder`] - Build test Axum apps that mirror main.rs wiring
//! - Fixture keys and helpers to seal request payloads and open encrypted responses
//!
//! The fixture keys under `tests/fixtures/` are fixed 2048-bit RSA keys, so no
//! test pays for key generation.
//!
//! ```ignore
//! let app = TestAppBuilder::with_rest().with_keys(common::both_keys()).build();
//! let body = json!({ "encrypted": common::seal(&json!({"foo": "bar"})) });
//! ```

#![allow(dead_code)]

pub mod app_builder;

use axum::{body::to_bytes, response::Response};
use serde_json::Value;
use vormiaquery_api::keys::KeySet;
use vq_crypto::{
    parse_private_key_pem, parse_public_key_pem, EncryptedEnvelope, RsaPrivateKey, RsaPublicKey,
};

pub const PRIVATE_PEM: &str = include_str!("../fixtures/private_key.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/public_key.pem");
pub const OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/other_private_key.pem");

pub fn private_key() -> RsaPrivateKey {
    parse_private_key_pem(PRIVATE_PEM).expect("fixture private key")
}

pub fn public_key() -> RsaPublicKey {
    parse_public_key_pem(PUBLIC_PEM).expect("fixture public key")
}

/// Public half of a key pair unrelated to the server's.
pub fn other_public_key() -> RsaPublicKey {
    parse_private_key_pem(OTHER_PRIVATE_PEM)
        .expect("fixture private key")
        .to_public_key()
}

/// Private key only: requests are decrypted, responses never encrypted.
pub fn decrypt_only_keys() -> KeySet {
    KeySet::empty().with_private_key(private_key())
}

/// Public key only: responses are encrypted, requests never decrypted.
pub fn encrypt_only_keys() -> KeySet {
    KeySet::empty().with_public_key(public_key())
}

pub fn both_keys() -> KeySet {
    KeySet::empty()
        .with_private_key(private_key())
        .with_public_key(public_key())
}

/// Seal a JSON value as a client would, returning the base64 string.
pub fn seal(value: &Value) -> String {
    EncryptedEnvelope::seal_json(&public_key(), value)
        .expect("seal")
        .encrypted
}

/// Seal with a key the server does not hold.
pub fn seal_with_other_key(value: &Value) -> String {
    EncryptedEnvelope::seal_json(&other_public_key(), value)
        .expect("seal")
        .encrypted
}

/// Open a base64 ciphertext with the fixture private key and parse it as JSON.
pub fn open(encrypted: &str) -> Value {
    let plaintext = EncryptedEnvelope::from_encoded(encrypted)
        .open(&private_key())
        .expect("open");
    serde_json::from_slice(&plaintext).expect("decrypted JSON")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}
