//! PEM parsing for the RSA key pair.
//!
//! Both PKCS#8 / SPKI (`BEGIN PRIVATE KEY`, `BEGIN PUBLIC KEY`) and PKCS#1
//! (`BEGIN RSA PRIVATE KEY`, `BEGIN RSA PUBLIC KEY`) encodings are accepted.
//! Encrypted PEM (passphrase-protected) keys are not supported.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

const PKCS1_PRIVATE_LABEL: &str = "BEGIN RSA PRIVATE KEY";
const PKCS1_PUBLIC_LABEL: &str = "BEGIN RSA PUBLIC KEY";

/// Errors from PEM key parsing.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid RSA private key PEM: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid RSA public key PEM: {0}")]
    InvalidPublicKey(String),
}

/// Normalize a PEM value as it typically appears in an `.env` file.
///
/// Strips surrounding whitespace and one pair of matching quotes, and expands
/// literal `\n` escapes into newlines. Returns `None` when nothing is left,
/// which callers treat as "key not configured".
#[must_use]
pub fn normalize_pem(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);

    let pem = unquoted.replace("\\r\\n", "\n").replace("\\n", "\n");
    let pem = pem.trim();
    if pem.is_empty() {
        None
    } else {
        Some(pem.to_string())
    }
}

/// Parse an RSA private key from PEM.
///
/// # Errors
/// Returns `KeyError::InvalidPrivateKey` if the PEM is malformed or does not
/// hold an RSA private key.
pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    let pem = normalize_pem(pem)
        .ok_or_else(|| KeyError::InvalidPrivateKey("empty key".to_string()))?;
    if pem.contains(PKCS1_PRIVATE_LABEL) {
        RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))
    } else {
        RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))
    }
}

/// Parse an RSA public key from PEM.
///
/// # Errors
/// Returns `KeyError::InvalidPublicKey` if the PEM is malformed or does not
/// hold an RSA public key.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, KeyError> {
    let pem =
        normalize_pem(pem).ok_or_else(|| KeyError::InvalidPublicKey("empty key".to_string()))?;
    if pem.contains(PKCS1_PUBLIC_LABEL) {
        RsaPublicKey::from_pkcs1_pem(&pem).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    } else {
        RsaPublicKey::from_public_key_pem(&pem)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    }
}
