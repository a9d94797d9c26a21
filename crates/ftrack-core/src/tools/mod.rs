//! Tool adapters and registry.
//!
//! The registry owns the file system and git adapters used by every
//! workflow. Adapters are trait objects so tests can swap in mocks.

pub mod fs;
pub mod fs_impl;
pub mod fs_mock;
pub mod git;
pub mod git_impl;
pub mod git_mock;

use std::sync::Arc;

/// Tool registry that manages the available adapters.
pub struct ToolRegistry {
    /// File system adapter, shared with the feature store.
    pub fs: Arc<dyn fs::FsAdapter>,

    /// Git adapter for repository operations.
    pub git: Box<dyn git::GitAdapter>,
}

impl ToolRegistry {
    /// Creates a new tool registry with the provided adapters.
    pub fn new(fs: Arc<dyn fs::FsAdapter>, git: Box<dyn git::GitAdapter>) -> Self {
        Self { fs, git }
    }

    /// Registry backed by `std::fs` and the `git` command-line tool.
    pub fn standard() -> Self {
        Self::new(
            Arc::new(fs_impl::StdFsAdapter::new()),
            Box::new(git_impl::StdGitAdapter::new()),
        )
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("fs", &"Arc<dyn FsAdapter>")
            .field("git", &"Box<dyn GitAdapter>")
            .finish()
    }
}
