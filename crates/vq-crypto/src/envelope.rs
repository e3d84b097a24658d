//! The `{"encrypted": "<base64>"}` wire envelope.
//!
//! The ciphertext is a single RSA-OAEP block. SHA-256 is used both as the OAEP
//! hash and for MGF1, so the plaintext limit is `k - 2 * 32 - 2` bytes where
//! `k` is the modulus size in bytes (190 bytes for RSA-2048).

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{decode_base64, encode_base64};

/// Name of the envelope field, both as a request parameter and a response key.
pub const ENVELOPE_FIELD: &str = "encrypted";

/// OAEP overhead with a 32-byte digest: `2 * hLen + 2`.
const OAEP_SHA256_OVERHEAD: usize = 66;

/// Errors from sealing or opening an envelope.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("invalid base64 ciphertext: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("RSA-OAEP decryption failed: {0}")]
    Decrypt(#[source] rsa::Error),
    #[error("RSA-OAEP encryption failed: {0}")]
    Encrypt(#[source] rsa::Error),
    #[error("plaintext is {len} bytes but the key allows at most {max}")]
    PlaintextTooLarge { len: usize, max: usize },
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Largest plaintext a single envelope can carry for `key`.
#[must_use]
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(OAEP_SHA256_OVERHEAD)
}

/// Encrypt `plaintext` with RSA-OAEP (SHA-256).
///
/// # Errors
/// Returns `CipherError::PlaintextTooLarge` if the plaintext does not fit in
/// one block, or `CipherError::Encrypt` on any other library failure.
pub fn encrypt(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let max = max_plaintext_len(key);
    if plaintext.len() > max {
        return Err(CipherError::PlaintextTooLarge {
            len: plaintext.len(),
            max,
        });
    }
    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(CipherError::Encrypt)
}

/// Decrypt a raw RSA-OAEP (SHA-256) block.
///
/// # Errors
/// Returns `CipherError::Decrypt` for a wrong key, corrupted data, or a
/// ciphertext whose length does not match the modulus.
pub fn decrypt(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    key.decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(CipherError::Decrypt)
}

/// The envelope carried in request parameters and encrypted response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Standard base64 of the RSA-OAEP ciphertext.
    pub encrypted: String,
}

impl EncryptedEnvelope {
    /// Wrap an already base64-encoded ciphertext, e.g. a request parameter.
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encrypted: encoded.into(),
        }
    }

    /// Encrypt raw bytes into an envelope.
    ///
    /// # Errors
    /// See [`encrypt`].
    pub fn seal_bytes(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Self, CipherError> {
        let ciphertext = encrypt(key, plaintext)?;
        Ok(Self {
            encrypted: encode_base64(&ciphertext),
        })
    }

    /// Serialize `value` as JSON and encrypt it into an envelope.
    ///
    /// # Errors
    /// Returns `CipherError::Serialize` if `value` cannot be serialized, or
    /// any error from [`encrypt`].
    pub fn seal_json<T: Serialize + ?Sized>(
        key: &RsaPublicKey,
        value: &T,
    ) -> Result<Self, CipherError> {
        let plaintext = serde_json::to_vec(value)?;
        Self::seal_bytes(key, &plaintext)
    }

    /// Decode and decrypt the envelope, returning the plaintext bytes.
    ///
    /// # Errors
    /// Returns `CipherError::InvalidBase64` or `CipherError::Decrypt`.
    pub fn open(&self, key: &RsaPrivateKey) -> Result<Vec<u8>, CipherError> {
        let ciphertext = decode_base64(&self.encrypted)?;
        decrypt(key, &ciphertext)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::{parse_private_key_pem, parse_public_key_pem};
    use proptest::prelude::*;
    use std::sync::LazyLock;

    static PRIVATE: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
        parse_private_key_pem(include_str!("../tests/fixtures/private_key.pem")).unwrap()
    });
    static PUBLIC: LazyLock<RsaPublicKey> = LazyLock::new(|| {
        parse_public_key_pem(include_str!("../tests/fixtures/public_key.pem")).unwrap()
    });

    proptest! {
        // RSA private-key operations are slow in debug builds
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Anything that fits in one block survives seal/open unchanged
        #[test]
        fn seal_open_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..=190)) {
            let envelope = EncryptedEnvelope::seal_bytes(&PUBLIC, &plaintext).unwrap();
            prop_assert_eq!(envelope.open(&PRIVATE).unwrap(), plaintext);
        }

        /// Anything larger than one block is refused before touching the key
        #[test]
        fn oversized_plaintext_rejected(len in 191usize..1024) {
            let result = EncryptedEnvelope::seal_bytes(&PUBLIC, &vec![0u8; len]);
            let is_too_large = matches!(result, Err(CipherError::PlaintextTooLarge { .. }));
            prop_assert!(is_too_large);
        }
    }
}
