use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Every regular file below `dir`, sorted. Missing directories are empty.
pub fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        walk_into(dir, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk_into(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| BuildError::io_path("read", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io_path("read", dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            walk_into(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Copies `from` to `to`, creating the parent directory of `to`.
pub fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io_path("create", parent, e))?;
    }
    fs::copy(from, to).map_err(|e| BuildError::io_path("copy", from, e))
}

/// Recursively copies the contents of `from` into `to`.
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<usize> {
    let files = walk_files(from)?;
    for file in &files {
        let Ok(relative) = file.strip_prefix(from) else {
            continue;
        };
        copy_file(file, &to.join(relative))?;
    }
    Ok(files.len())
}

pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| BuildError::io_path("remove", dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_trees() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("data/sounds")).unwrap();
        fs::write(src.join("data/a.c"), "a").unwrap();
        fs::write(src.join("data/sounds/b.c"), "b").unwrap();

        let dest = dir.path().join("out");
        assert_eq!(copy_dir_all(&src, &dest).unwrap(), 2);
        assert_eq!(fs::read_to_string(dest.join("data/sounds/b.c")).unwrap(), "b");
        assert_eq!(
            walk_files(&dest).unwrap(),
            vec![dest.join("data/a.c"), dest.join("data/sounds/b.c")]
        );
    }

    #[test]
    fn missing_directories_walk_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_files(&dir.path().join("nope")).unwrap().is_empty());
        remove_dir_if_exists(&dir.path().join("nope")).unwrap();
    }
}
