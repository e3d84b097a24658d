//! Project setup for the encrypted exchange, driven by the `vq-ops` binary.
//!
//! `install` and `update` make sure the key variables exist in `.env` and
//! `.env.example`, check that the host crate uses the expected web framework,
//! and publish `cors.yaml`. `uninstall` reverses the file changes.

pub mod cors;
pub mod env_file;
pub mod manifest;

use std::path::{Path, PathBuf};

pub use env_file::EnvFileChange;

use crate::config::{CORS_CONFIG_FILE, PRIVATE_KEY_ENV, PUBLIC_KEY_ENV};

/// Placeholder values written to `.env.example`.
pub const PRIVATE_KEY_PLACEHOLDER: &str = "<private-key-here>";
pub const PUBLIC_KEY_PLACEHOLDER: &str = "<public-key-here>";

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to update {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },
}

impl InstallError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Options for `install` / `update`.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Do not publish `cors.yaml`.
    pub skip_cors: bool,
    /// Origins written to a newly published `cors.yaml`.
    pub cors_origins: Vec<String>,
    /// Dependency the host crate is expected to have.
    pub framework_crate: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            skip_cors: false,
            cors_origins: Vec::new(),
            framework_crate: "axum".to_string(),
        }
    }
}

/// Whether the host manifest lists the framework crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkCheck {
    Found,
    NotFound,
    NoManifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsOutcome {
    Published,
    AlreadyPresent,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub framework: FrameworkCheck,
    pub env: EnvFileChange,
    pub env_example: EnvFileChange,
    pub cors: CorsOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub env: EnvFileChange,
    pub env_example: EnvFileChange,
    pub cors_removed: bool,
}

/// Installer rooted at a project directory.
#[derive(Debug, Clone)]
pub struct Installer {
    root: PathBuf,
}

impl Installer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn env_path(&self) -> PathBuf {
        self.root.join(".env")
    }

    fn env_example_path(&self) -> PathBuf {
        self.root.join(".env.example")
    }

    fn cors_path(&self) -> PathBuf {
        self.root.join(CORS_CONFIG_FILE)
    }

    /// Run the setup steps. Safe to repeat.
    ///
    /// # Errors
    /// Returns `InstallError` if a file cannot be read or written.
    pub fn install(&self, options: &InstallOptions) -> Result<InstallReport, InstallError> {
        let framework = self.check_framework(&options.framework_crate)?;
        match framework {
            FrameworkCheck::Found => {
                tracing::info!(framework = %options.framework_crate, "framework dependency detected");
            }
            FrameworkCheck::NotFound => tracing::warn!(
                framework = %options.framework_crate,
                "host crate does not depend on the framework; the middleware will not be usable"
            ),
            FrameworkCheck::NoManifest => {
                tracing::warn!(root = %self.root.display(), "no Cargo.toml found");
            }
        }

        let env_path = self.env_path();
        let env = env_file::ensure_keys(&env_path, &[(PRIVATE_KEY_ENV, ""), (PUBLIC_KEY_ENV, "")])
            .map_err(InstallError::io(&env_path))?;

        let example_path = self.env_example_path();
        let env_example = env_file::ensure_keys(
            &example_path,
            &[
                (PRIVATE_KEY_ENV, PRIVATE_KEY_PLACEHOLDER),
                (PUBLIC_KEY_ENV, PUBLIC_KEY_PLACEHOLDER),
            ],
        )
        .map_err(InstallError::io(&example_path))?;

        let cors = if options.skip_cors {
            CorsOutcome::Skipped
        } else {
            let cors_path = self.cors_path();
            if cors::publish(&cors_path, &options.cors_origins)
                .map_err(InstallError::io(&cors_path))?
            {
                CorsOutcome::Published
            } else {
                CorsOutcome::AlreadyPresent
            }
        };

        tracing::info!(?env, ?env_example, ?cors, "install finished");
        Ok(InstallReport {
            framework,
            env,
            env_example,
            cors,
        })
    }

    /// Re-run the install steps.
    ///
    /// # Errors
    /// Returns `InstallError` if a file cannot be read or written.
    pub fn update(&self, options: &InstallOptions) -> Result<InstallReport, InstallError> {
        self.install(options)
    }

    /// Remove the key variables and the published `cors.yaml`.
    ///
    /// # Errors
    /// Returns `InstallError` if a file cannot be read, written or removed.
    pub fn uninstall(&self) -> Result<UninstallReport, InstallError> {
        let keys = [PRIVATE_KEY_ENV, PUBLIC_KEY_ENV];

        let env_path = self.env_path();
        let env = env_file::remove_keys(&env_path, &keys).map_err(InstallError::io(&env_path))?;

        let example_path = self.env_example_path();
        let env_example =
            env_file::remove_keys(&example_path, &keys).map_err(InstallError::io(&example_path))?;

        let cors_path = self.cors_path();
        let cors_removed = cors::remove(&cors_path).map_err(InstallError::io(&cors_path))?;

        tracing::info!(?env, ?env_example, cors_removed, "uninstall finished");
        Ok(UninstallReport {
            env,
            env_example,
            cors_removed,
        })
    }

    fn check_framework(&self, name: &str) -> Result<FrameworkCheck, InstallError> {
        let path = self.root.join("Cargo.toml");
        match manifest::has_dependency(&path, name) {
            Ok(Some(true)) => Ok(FrameworkCheck::Found),
            Ok(Some(false)) => Ok(FrameworkCheck::NotFound),
            Ok(None) => Ok(FrameworkCheck::NoManifest),
            Err(source) => Err(InstallError::Manifest { path, source }),
        }
    }
}
