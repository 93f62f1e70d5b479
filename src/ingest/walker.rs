//! File-system walker for ingestion roots.

use crate::error::{IngestionError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Collects every regular file under `root`, recursively, excluding
/// suffixes in `blocked_suffixes` (lowercase, leading dot).
///
/// A single file path is returned as-is (subject to the same suffix
/// check) rather than treated as a root to walk.
///
/// # Errors
///
/// Returns an error if `root` does not exist, or if a directory cannot be
/// read.
pub fn collect_files(root: &Path, blocked_suffixes: &BTreeSet<String>) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(IngestionError::InvalidRoot {
            path: root.display().to_string(),
        }
        .into());
    }
    if root.is_file() {
        return Ok(if is_allowed(root, blocked_suffixes) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut files = Vec::new();
    walk_dir(root, blocked_suffixes, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, blocked_suffixes: &BTreeSet<String>, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, blocked_suffixes, out)?;
        } else if is_allowed(&path, blocked_suffixes) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_allowed(path: &Path, blocked_suffixes: &BTreeSet<String>) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => !blocked_suffixes.contains(&format!(".{}", ext.to_lowercase())),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn blocked() -> BTreeSet<String> {
        [".json", ".png"].into_iter().map(String::from).collect()
    }

    #[test]
    fn missing_root_is_rejected() {
        let result = collect_files(Path::new("/nonexistent/path/for/psl/tests"), &blocked());
        assert!(result.is_err());
    }

    #[test]
    fn single_file_root_respects_blocklist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocked_file = dir.path().join("data.json");
        std::fs::write(&blocked_file, "{}").expect("write");
        let files = collect_files(&blocked_file, &blocked()).expect("collect");
        assert!(files.is_empty());
    }

    #[test]
    fn walks_nested_directories_and_filters_suffixes() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        std::fs::write(dir.path().join("a.md"), "alpha").expect("write");
        std::fs::write(dir.path().join("sub").join("b.txt"), "beta").expect("write");
        std::fs::write(dir.path().join("skip.json"), "{}").expect("write");
        let files = collect_files(dir.path(), &blocked()).expect("collect");
        assert_eq!(files.len(), 2);
    }
}
