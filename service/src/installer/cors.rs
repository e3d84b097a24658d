//! Publishing the standalone `cors.yaml` picked up by `Config::load`.

use std::fs;
use std::io;
use std::path::Path;

/// Render the CORS section in the shape `CorsConfig` deserializes.
#[must_use]
pub fn render(origins: &[String]) -> String {
    let mut yaml = String::from("# Published by vq-ops. Overridden by VQ_CORS__ALLOWED_ORIGINS.\ncors:\n");
    if origins.is_empty() {
        yaml.push_str("  allowed_origins: []\n");
        return yaml;
    }
    yaml.push_str("  allowed_origins:\n");
    for origin in origins {
        // JSON strings are valid YAML scalars
        let quoted = serde_json::to_string(origin).unwrap_or_else(|_| format!("\"{origin}\""));
        yaml.push_str("    - ");
        yaml.push_str(&quoted);
        yaml.push('\n');
    }
    yaml
}

/// Write `path` unless it already exists. Returns whether a file was written.
///
/// # Errors
/// Returns an I/O error if the file cannot be written.
pub fn publish(path: &Path, origins: &[String]) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, render(origins))?;
    Ok(true)
}

/// Delete `path` if present. Returns whether a file was removed.
///
/// # Errors
/// Returns an I/O error if the file exists but cannot be removed.
pub fn remove(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
