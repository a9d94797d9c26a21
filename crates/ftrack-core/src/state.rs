//! Durable state that survives between invocations.
//!
//! [`MergeState`] records a conflicted merge awaiting `--continue` or
//! `--abort`; its file existing is the only signal that a merge is pending.
//! Load, save and clear are its only transitions. The active feature marks
//! which feature the user is working on in trunk-based mode.

use crate::error::{FtrackError, Result};
use crate::tools::fs::FsAdapter;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An in-progress, conflicted merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    /// Branch being merged.
    pub feature_branch: String,

    /// Branch merged into.
    pub base_branch: String,

    /// Features closed by the merge.
    pub feature_ids: Vec<String>,

    /// Keep the feature branch after completion.
    #[serde(default)]
    pub no_delete: bool,

    /// Squash merge.
    #[serde(default)]
    pub squash: bool,

    /// Paths that conflicted when the merge stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_files: Option<Vec<String>>,
}

impl MergeState {
    /// Loads the pending merge, if any.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::CorruptedState` if the file cannot be parsed.
    pub fn load(fs: &dyn FsAdapter, path: &Path) -> Result<Option<Self>> {
        if !fs.exists(path) {
            return Ok(None);
        }
        let content = fs.read_to_string(path)?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|_| FtrackError::CorruptedState(path.to_path_buf()))
    }

    /// Returns `true` if a merge is pending.
    pub fn exists(fs: &dyn FsAdapter, path: &Path) -> bool {
        fs.exists(path)
    }

    /// Persists this state, replacing any previous one.
    pub fn save(&self, fs: &dyn FsAdapter, path: &Path) -> Result<()> {
        let content = toml::to_string(self)
            .map_err(|e| FtrackError::FileWriteError(format!("merge state: {}", e)))?;
        fs.write(path, &content)
    }

    /// Removes the state file. Clearing an absent state is a no-op.
    pub fn clear(fs: &dyn FsAdapter, path: &Path) -> Result<()> {
        match fs.remove_file(path) {
            Err(FtrackError::PathNotFound(_)) => Ok(()),
            other => other,
        }
    }
}

/// Reads the active feature ID, if one is set.
pub fn active_feature(fs: &dyn FsAdapter, path: &Path) -> Result<Option<String>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    let id = fs.read_to_string(path)?.trim().to_string();
    Ok((!id.is_empty()).then_some(id))
}

/// Marks `id` as the active feature.
pub fn set_active_feature(fs: &dyn FsAdapter, path: &Path, id: &str) -> Result<()> {
    fs.write(path, &format!("{}\n", id))
}
