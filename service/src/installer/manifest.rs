//! Dependency detection in the host crate's `Cargo.toml`.

use std::path::Path;

use figment::{
    providers::{Format, Toml},
    value::Dict,
    Figment,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: Dict,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: Dict,
    #[serde(default)]
    workspace: WorkspaceSection,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceSection {
    #[serde(default)]
    dependencies: Dict,
}

/// Whether the manifest at `path` lists `name` as a (dev or workspace)
/// dependency. `Ok(None)` when there is no manifest.
///
/// # Errors
/// Returns an error if the manifest exists but is not valid TOML.
pub fn has_dependency(path: &Path, name: &str) -> Result<Option<bool>, Box<figment::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let manifest: Manifest = Figment::from(Toml::file(path)).extract().map_err(Box::new)?;
    Ok(Some(
        manifest.dependencies.contains_key(name)
            || manifest.dev_dependencies.contains_key(name)
            || manifest.workspace.dependencies.contains_key(name),
    ))
}
