//! Line-based editing of `.env` style files.
//!
//! A key counts as present when some line starts with `KEY=`. Files that do
//! not exist are left alone.

use std::fs;
use std::io;
use std::path::Path;

/// What happened to one env file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileChange {
    /// The file does not exist.
    Missing,
    /// Nothing needed to change.
    Unchanged,
    /// This many lines were added or removed.
    Updated(usize),
}

fn has_key(content: &str, key: &str) -> bool {
    content
        .lines()
        .any(|line| line.strip_prefix(key).is_some_and(|rest| rest.starts_with('=')))
}

/// Append `KEY=value` for each entry whose key is not already present.
///
/// # Errors
/// Returns an I/O error if the file exists but cannot be read or written.
pub fn ensure_keys(path: &Path, entries: &[(&str, &str)]) -> io::Result<EnvFileChange> {
    if !path.exists() {
        return Ok(EnvFileChange::Missing);
    }
    let mut content = fs::read_to_string(path)?;

    let missing: Vec<_> = entries
        .iter()
        .filter(|(key, _)| !has_key(&content, key))
        .collect();
    if missing.is_empty() {
        return Ok(EnvFileChange::Unchanged);
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for (key, value) in &missing {
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(EnvFileChange::Updated(missing.len()))
}

/// Remove every line starting with `KEY=` for any of `keys`.
///
/// # Errors
/// Returns an I/O error if the file exists but cannot be read or written.
pub fn remove_keys(path: &Path, keys: &[&str]) -> io::Result<EnvFileChange> {
    if !path.exists() {
        return Ok(EnvFileChange::Missing);
    }
    let content = fs::read_to_string(path)?;

    let mut removed = 0;
    let mut kept = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        if keys.iter().any(|key| has_key(bare, key)) {
            removed += 1;
        } else {
            kept.push_str(line);
        }
    }

    if removed == 0 {
        return Ok(EnvFileChange::Unchanged);
    }
    fs::write(path, kept)?;
    Ok(EnvFileChange::Updated(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ENTRIES: [(&str, &str); 2] = [("VORMIA_PRIVATE_KEY", ""), ("VORMIA_PUBLIC_KEY", "")];
    const KEYS: [&str; 2] = ["VORMIA_PRIVATE_KEY", "VORMIA_PUBLIC_KEY"];

    fn env_file(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_is_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        assert_eq!(ensure_keys(&path, &ENTRIES).unwrap(), EnvFileChange::Missing);
        assert_eq!(remove_keys(&path, &KEYS).unwrap(), EnvFileChange::Missing);
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_appends_after_unterminated_line() {
        let (_dir, path) = env_file("APP_NAME=demo");
        assert_eq!(ensure_keys(&path, &ENTRIES).unwrap(), EnvFileChange::Updated(2));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "APP_NAME=demo\nVORMIA_PRIVATE_KEY=\nVORMIA_PUBLIC_KEY=\n"
        );
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let (_dir, path) = env_file("APP_NAME=demo\n");
        ensure_keys(&path, &ENTRIES).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        assert_eq!(ensure_keys(&path, &ENTRIES).unwrap(), EnvFileChange::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_ensure_keeps_existing_value() {
        let (_dir, path) = env_file("VORMIA_PUBLIC_KEY=abc\n");
        assert_eq!(ensure_keys(&path, &ENTRIES).unwrap(), EnvFileChange::Updated(1));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "VORMIA_PUBLIC_KEY=abc\nVORMIA_PRIVATE_KEY=\n"
        );
    }

    #[test]
    fn test_key_must_start_the_line() {
        let (_dir, path) = env_file("# VORMIA_PRIVATE_KEY=old\nVORMIA_PRIVATE_KEY_BACKUP=x\n");
        assert_eq!(ensure_keys(&path, &ENTRIES).unwrap(), EnvFileChange::Updated(2));
    }

    #[test]
    fn test_remove_only_matching_lines() {
        let (_dir, path) = env_file(
            "APP_NAME=demo\r\nVORMIA_PRIVATE_KEY=secret\r\nVORMIA_PUBLIC_KEY=pub\nDEBUG=true\nVORMIA_PRIVATE_KEY=dup",
        );
        assert_eq!(remove_keys(&path, &KEYS).unwrap(), EnvFileChange::Updated(3));
        assert_eq!(fs::read_to_string(&path).unwrap(), "APP_NAME=demo\r\nDEBUG=true\n");
        assert_eq!(remove_keys(&path, &KEYS).unwrap(), EnvFileChange::Unchanged);
    }
}
