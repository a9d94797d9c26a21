//! File system adapter trait.
//!
//! Feature records and the merge state file go through this trait so the
//! store can run against the real working tree or an in-memory mock.

use crate::error::Result;
use std::path::Path;

/// File system adapter trait.
pub trait FsAdapter: Send + Sync {
    /// Reads the contents of a file as a string.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::PathNotFound` if the file doesn't exist, or
    /// `FtrackError::FileReadError` if reading fails.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes a string to a file, creating the file and any missing parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::FileWriteError` if writing fails, or
    /// `FtrackError::PermissionDenied` if lacking write permissions.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::PathNotFound` if the file doesn't exist.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Lists entry names (not full paths) in a directory.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::PathNotFound` if the directory doesn't exist.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
