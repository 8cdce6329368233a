//! Write-then-rename helper shared by the state store and artifact cache so a crash mid-write
//! never leaves a half-written file where a reader expects a complete one.

use crate::core::error::{AppError, ErrorKind};
use std::fs;
use std::path::Path;

pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorKind::TransientIo,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorKind::TransientIo,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorKind::TransientIo,
            format!(
                "failed to rename {} to {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parent_dirs_and_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("state.json");
        atomic_write(&target, b"{}").unwrap();
        assert!(target.exists());
        assert!(!target.with_extension("tmp").exists());
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn atomic_write_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("state.json");
        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }
}
