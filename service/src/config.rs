use std::fmt;
use std::net::IpAddr;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::deserialize_vec_from_string_or_vec;

/// Environment variable holding the PEM private key used by the decrypt stage.
pub const PRIVATE_KEY_ENV: &str = "VORMIA_PRIVATE_KEY";
/// Environment variable holding the PEM public key used by the encrypt stage.
pub const PUBLIC_KEY_ENV: &str = "VORMIA_PUBLIC_KEY";
/// Standalone CORS file written by `vq-ops install`.
pub const CORS_CONFIG_FILE: &str = "cors.yaml";

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. cors.yaml file (if exists)
/// 4. Environment variables with VQ_ prefix
/// 5. `VORMIA_PRIVATE_KEY` / `VORMIA_PUBLIC_KEY` (always win)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests.
    /// Use `"*"` to allow any origin (not recommended for production).
    /// Accepts either an array or comma-separated string.
    /// Example: `["http://localhost:5173"]` or `"http://localhost:5173,https://app.example.com"`
    #[serde(default = "default_allowed_origins", deserialize_with = "deserialize_list")]
    pub allowed_origins: Vec<String>,
}

/// RSA key material for the encrypted exchange.
///
/// Either key may be absent; the matching middleware stage is then a no-op.
#[derive(Clone, Deserialize, Serialize)]
pub struct EncryptionConfig {
    /// PEM private key (`VORMIA_PRIVATE_KEY`). Enables request decryption.
    #[serde(default)]
    pub private_key: Option<String>,

    /// PEM public key (`VORMIA_PUBLIC_KEY`). Enables response encryption.
    #[serde(default)]
    pub public_key: Option<String>,

    /// Largest request or response body buffered by the encryption stages.
    /// Defaults to 2 MiB, the same as axum's `DefaultBodyLimit`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("public_key", &self.public_key.as_ref().map(|_| "<set>"))
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Domain and IP allow-lists.
///
/// An empty list disables that check entirely.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Host names (without port) allowed to reach the API.
    #[serde(default, deserialize_with = "deserialize_list")]
    pub allowed_domains: Vec<String>,

    /// Client IP addresses allowed to reach the API.
    #[serde(default, deserialize_with = "deserialize_list")]
    pub allowed_ips: Vec<String>,

    /// Use the first `X-Forwarded-For` entry as the client IP.
    /// Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl AccessConfig {
    /// Whether any allow-list is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.allowed_domains.is_empty() || !self.allowed_ips.is_empty()
    }
}

/// Deserialize a list from comma-separated string or array, filtering empty values.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SwaggerConfig {
    /// Enable Swagger UI at /swagger-ui.
    /// Default: false (disabled for security - exposes API documentation).
    /// Enable in development via `VQ_SWAGGER__ENABLED=true`
    #[serde(default)]
    pub enabled: bool,
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_allowed_origins() -> Vec<String> {
    // Default to empty (no cross-origin requests allowed) - safe for production
    // Configure explicitly via VQ_CORS__ALLOWED_ORIGINS, config.yaml or cors.yaml
    vec![]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            public_key: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: default_port(),
                host: default_host(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
            },
            cors: CorsConfig::default(),
            encryption: EncryptionConfig::default(),
            access: AccessConfig::default(),
            swagger: SwaggerConfig::default(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Map the two bare key variables onto `encryption.*`.
fn key_env() -> Env {
    Env::raw()
        .only(&[PRIVATE_KEY_ENV, PUBLIC_KEY_ENV])
        .map(|key| {
            if key.as_str().eq_ignore_ascii_case(PRIVATE_KEY_ENV) {
                "encryption.private_key".into()
            } else {
                "encryption.public_key".into()
            }
        })
}

impl Config {
    fn figment(yaml_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Yaml::file(CORS_CONFIG_FILE))
            .merge(Env::prefixed("VQ_").split("__"))
            .merge(key_env())
    }

    /// Load configuration from all sources.
    ///
    /// Sources are merged in priority order:
    /// 1. Struct defaults (lowest)
    /// 2. config.yaml file (if exists)
    /// 3. cors.yaml file (if exists)
    /// 4. Environment variables with VQ_ prefix
    /// 5. `VORMIA_PRIVATE_KEY` / `VORMIA_PUBLIC_KEY` (highest)
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(yaml_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Key material is parsed separately by [`crate::keys::KeySet::from_config`].
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Port must be non-zero
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }

        if self.encryption.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "encryption.max_body_bytes cannot be 0".into(),
            ));
        }

        // CORS origins must be valid URLs or "*"
        for origin in &self.cors.allowed_origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "cors.allowed_origins contains invalid origin '{origin}'. Must be '*' or start with http:// or https://"
                )));
            }
        }

        for ip in &self.access.allowed_ips {
            if ip.parse::<IpAddr>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "access.allowed_ips contains invalid address '{ip}'"
                )));
            }
        }

        for domain in &self.access.allowed_domains {
            if domain.contains(['/', ':']) {
                return Err(ConfigError::Validation(format!(
                    "access.allowed_domains entry '{domain}' must be a bare host name"
                )));
            }
        }

        Ok(())
    }
}
