//! Key provider for the encryption middleware.
//!
//! Keys are parsed once from [`EncryptionConfig`] and handed to the
//! middleware through an `Extension<SharedKeyProvider>`. Nothing reads the
//! process environment at request time.

use std::fmt;
use std::sync::{Arc, RwLock};

use vq_crypto::{
    parse_private_key_pem, parse_public_key_pem, KeyError, RsaPrivateKey, RsaPublicKey,
};

use crate::config::EncryptionConfig;

/// Source of the RSA key pair.
///
/// `None` means "not configured" and disables the matching stage; it is never
/// an error.
pub trait KeyProvider: Send + Sync {
    /// Key used by the inbound decrypt stage.
    fn private_key(&self) -> Option<Arc<RsaPrivateKey>>;

    /// Key used by the outbound encrypt stage.
    fn public_key(&self) -> Option<Arc<RsaPublicKey>>;
}

pub type SharedKeyProvider = Arc<dyn KeyProvider>;

/// An immutable, parsed key pair.
#[derive(Clone, Default)]
pub struct KeySet {
    private_key: Option<Arc<RsaPrivateKey>>,
    public_key: Option<Arc<RsaPublicKey>>,
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("private_key", &self.has_private_key())
            .field("public_key", &self.has_public_key())
            .finish()
    }
}

impl KeySet {
    /// A key set with nothing configured.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the configured PEM strings. Blank values count as absent.
    ///
    /// # Errors
    /// Returns `KeyError` if a configured key is not valid PEM.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, KeyError> {
        Self::from_pems(config.private_key.as_deref(), config.public_key.as_deref())
    }

    /// Parse optional PEM strings. Blank values count as absent.
    ///
    /// # Errors
    /// Returns `KeyError` if a non-blank key is not valid PEM.
    pub fn from_pems(private_pem: Option<&str>, public_pem: Option<&str>) -> Result<Self, KeyError> {
        let private_key = private_pem
            .filter(|pem| !is_blank(pem))
            .map(parse_private_key_pem)
            .transpose()?
            .map(Arc::new);
        let public_key = public_pem
            .filter(|pem| !is_blank(pem))
            .map(parse_public_key_pem)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    #[must_use]
    pub fn with_private_key(mut self, key: RsaPrivateKey) -> Self {
        self.private_key = Some(Arc::new(key));
        self
    }

    #[must_use]
    pub fn with_public_key(mut self, key: RsaPublicKey) -> Self {
        self.public_key = Some(Arc::new(key));
        self
    }

    #[must_use]
    pub const fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    #[must_use]
    pub const fn has_public_key(&self) -> bool {
        self.public_key.is_some()
    }

    /// Wrap into the form the middleware expects.
    #[must_use]
    pub fn shared(self) -> SharedKeyProvider {
        Arc::new(self)
    }
}

fn is_blank(pem: &str) -> bool {
    vq_crypto::normalize_pem(pem).is_none()
}

impl KeyProvider for KeySet {
    fn private_key(&self) -> Option<Arc<RsaPrivateKey>> {
        self.private_key.clone()
    }

    fn public_key(&self) -> Option<Arc<RsaPublicKey>> {
        self.public_key.clone()
    }
}

/// A key set that can be replaced at runtime (e.g. on `SIGHUP`).
///
/// Requests in flight keep the `Arc` they already cloned; the lock is only held
/// long enough to clone or swap it.
#[derive(Debug, Default)]
pub struct ReloadableKeys {
    current: RwLock<Arc<KeySet>>,
}

impl ReloadableKeys {
    #[must_use]
    pub fn new(initial: KeySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Snapshot of the active key set.
    #[must_use]
    pub fn snapshot(&self) -> Arc<KeySet> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the active key set.
    pub fn replace(&self, keys: KeySet) {
        let keys = Arc::new(keys);
        match self.current.write() {
            Ok(mut guard) => *guard = keys,
            Err(poisoned) => *poisoned.into_inner() = keys,
        }
    }

    /// Re-parse keys from configuration. On error the previous keys stay active.
    ///
    /// # Errors
    /// Returns `KeyError` if a configured key is not valid PEM.
    pub fn reload(&self, config: &EncryptionConfig) -> Result<(), KeyError> {
        let keys = KeySet::from_config(config)?;
        tracing::info!(
            private_key = keys.has_private_key(),
            public_key = keys.has_public_key(),
            "encryption keys reloaded"
        );
        self.replace(keys);
        Ok(())
    }
}

impl KeyProvider for ReloadableKeys {
    fn private_key(&self) -> Option<Arc<RsaPrivateKey>> {
        self.snapshot().private_key()
    }

    fn public_key(&self) -> Option<Arc<RsaPublicKey>> {
        self.snapshot().public_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/private_key.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/public_key.pem");

    fn config(private_key: Option<&str>, public_key: Option<&str>) -> EncryptionConfig {
        EncryptionConfig {
            private_key: private_key.map(String::from),
            public_key: public_key.map(String::from),
            ..EncryptionConfig::default()
        }
    }

    #[test]
    fn test_empty_config_disables_both_stages() {
        let keys = KeySet::from_config(&config(None, None)).unwrap();
        assert!(keys.private_key().is_none());
        assert!(keys.public_key().is_none());
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let keys = KeySet::from_config(&config(Some(""), Some("  \"\" "))).unwrap();
        assert!(!keys.has_private_key());
        assert!(!keys.has_public_key());
    }

    #[test]
    fn test_both_keys_loaded() {
        let keys = KeySet::from_config(&config(Some(PRIVATE_PEM), Some(PUBLIC_PEM))).unwrap();
        assert!(keys.has_private_key());
        assert!(keys.has_public_key());
    }

    #[test]
    fn test_invalid_private_key_is_an_error() {
        let err = KeySet::from_config(&config(Some("garbage"), None)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidPrivateKey(_)));
    }

    #[test]
    fn test_reload_swaps_keys() {
        let keys = ReloadableKeys::new(KeySet::empty());
        assert!(keys.public_key().is_none());

        keys.reload(&config(None, Some(PUBLIC_PEM))).unwrap();
        assert!(keys.public_key().is_some());
        assert!(keys.private_key().is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_keys() {
        let keys = ReloadableKeys::new(KeySet::from_pems(None, Some(PUBLIC_PEM)).unwrap());
        assert!(keys.reload(&config(None, Some("garbage"))).is_err());
        assert!(keys.public_key().is_some());
    }

    #[test]
    fn test_snapshot_outlives_replace() {
        let keys = ReloadableKeys::new(KeySet::from_pems(None, Some(PUBLIC_PEM)).unwrap());
        let before = keys.snapshot();
        keys.replace(KeySet::empty());
        assert!(before.has_public_key());
        assert!(!keys.snapshot().has_public_key());
    }
}
