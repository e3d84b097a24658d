//! HTTP utilities and middleware.
//!
//! This module provides the middleware stages used by the application server:
//! the encrypted exchange, request parameters, and allow-lists.

pub mod encryption;
pub mod params;
pub mod security;

pub use encryption::{
    decrypt_request_middleware, encrypt_response_middleware, EncryptionContext,
    ExpectsEncryptedResponse, ENCRYPTED_RESPONSE_HEADER,
};
pub use params::RequestParams;
pub use security::{allowlist_middleware, AccessPolicy};
