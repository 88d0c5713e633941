//! Temporary source trees and volume roots.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Create a temporary directory with a recognisable prefix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("volcast-")
        .tempdir()
        .context("failed to create temp dir")
}

/// Create a source directory holding `files` as `(name, contents)` pairs.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub fn source_tree(files: &[(&str, &str)]) -> Result<TempDir> {
    let dir = temp_dir()?;
    for (name, contents) in files {
        let path = dir.path().join(name);
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(dir)
}

/// Create `count` empty directories standing in for mounted volumes.
///
/// # Errors
///
/// Returns an error if any directory cannot be created.
pub fn volume_roots(count: usize) -> Result<Vec<TempDir>> {
    (0..count).map(|_| temp_dir()).collect()
}

/// Whether `path` carries the read-only attribute.
///
/// # Errors
///
/// Returns an error if the metadata cannot be read.
pub fn is_read_only(path: &Path) -> Result<bool> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    Ok(metadata.permissions().readonly())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tree_writes_every_file() -> Result<()> {
        let tree = source_tree(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        assert_eq!(fs::read_to_string(tree.path().join("b.txt"))?, "beta");
        assert!(!is_read_only(&tree.path().join("a.txt"))?);
        Ok(())
    }

    #[test]
    fn volume_roots_are_distinct() -> Result<()> {
        let roots = volume_roots(2)?;
        assert_eq!(roots.len(), 2);
        assert_ne!(roots[0].path(), roots[1].path());
        Ok(())
    }
}
