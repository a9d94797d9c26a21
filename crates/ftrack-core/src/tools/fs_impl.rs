//! Standard file system adapter implementation.

use crate::error::{FtrackError, Result};
use crate::tools::fs::FsAdapter;
use std::io::ErrorKind;
use std::path::Path;

/// File system adapter backed by `std::fs`.
#[derive(Debug, Default)]
pub struct StdFsAdapter;

impl StdFsAdapter {
    /// Creates a new standard file system adapter.
    pub fn new() -> Self {
        Self
    }
}

fn write_error(path: &Path, e: std::io::Error) -> FtrackError {
    if e.kind() == ErrorKind::PermissionDenied {
        FtrackError::PermissionDenied(path.display().to_string())
    } else {
        FtrackError::FileWriteError(format!("{}: {}", path.display(), e))
    }
}

impl FsAdapter for StdFsAdapter {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FtrackError::PathNotFound(path.to_path_buf())
            } else {
                FtrackError::FileReadError(format!("{}: {}", path.display(), e))
            }
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            self.create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| write_error(path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FtrackError::PathNotFound(path.to_path_buf())
            } else {
                write_error(path, e)
            }
        })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_dir() {
            return Err(FtrackError::PathNotFound(path.to_path_buf()));
        }

        std::fs::read_dir(path)
            .map_err(|e| FtrackError::FileReadError(format!("{}: {}", path.display(), e)))?
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .map_err(|e| {
                        FtrackError::FileReadError(format!("failed to read directory entry: {}", e))
                    })
            })
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| write_error(path, e))
    }
}
