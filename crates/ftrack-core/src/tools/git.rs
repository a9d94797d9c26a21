//! Git adapter trait and outcome types.
//!
//! The trait covers the git primitives the workflows consume. Outcomes that
//! are part of normal operation ("nothing to commit", "merge conflict") are
//! returned as enum variants rather than errors.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Branch names treated as trunk, in detection order.
pub const TRUNK_NAMES: [&str; 3] = ["main", "master", "trunk"];

/// Returns `true` if `branch` is one of the trunk names.
pub fn is_trunk_name(branch: &str) -> bool {
    TRUNK_NAMES.contains(&branch)
}

/// Result of a commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created with this hash.
    Committed(String),
    /// The index matched HEAD; nothing was written.
    NothingToCommit,
}

/// Result of a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge (or squash) completed and was committed.
    Merged,
    /// The merge stopped on conflicts in these paths. The repository is left
    /// mid-merge.
    Conflict(Vec<String>),
}

/// Git adapter trait.
///
/// Every method takes the repository root explicitly. Implementations execute
/// real git commands or simulate them in memory.
pub trait GitAdapter: Send + Sync {
    /// Checks if `path` is inside a git repository.
    fn is_git_repo(&self, path: &Path) -> bool;

    /// Discovers the repository root containing `path`.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NotGitRepository` outside a repository.
    fn repo_root(&self, path: &Path) -> Result<PathBuf>;

    /// Returns `true` once the repository has at least one commit.
    fn has_commits(&self, repo: &Path) -> Result<bool>;

    /// Name of the checked-out branch.
    fn current_branch(&self, repo: &Path) -> Result<String>;

    /// Returns the first trunk-named local branch that exists.
    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>>;

    /// Checks whether a local branch exists.
    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool>;

    /// Creates a branch at HEAD without switching to it.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::BranchExists` if the branch already exists.
    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Checks out an existing branch.
    fn checkout(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Returns `true` if `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, repo: &Path, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Deletes a local branch. `force` deletes it even when unmerged.
    fn delete_branch(&self, repo: &Path, branch: &str, force: bool) -> Result<()>;

    /// Local branch names in refname order.
    fn local_branches(&self, repo: &Path) -> Result<Vec<String>>;

    /// Remote-tracking branch names (e.g. `origin/feature/x`), excluding
    /// symbolic `HEAD` refs.
    fn remote_branches(&self, repo: &Path) -> Result<Vec<String>>;

    /// Paths (relative to the repository root) of changed, staged and
    /// untracked files.
    fn changed_files(&self, repo: &Path) -> Result<Vec<String>>;

    /// Returns `true` if the working tree or index differ from HEAD.
    fn has_uncommitted_changes(&self, repo: &Path) -> Result<bool>;

    /// Stages everything and commits it with the given author
    /// (`Name <email>`).
    fn commit(&self, repo: &Path, message: &str, author: &str) -> Result<CommitOutcome>;

    /// Merges `branch` into the current branch, or squash-merges and commits
    /// it when `squash` is set.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::MergeFailed` for failures other than conflicts.
    fn merge(&self, repo: &Path, branch: &str, squash: bool, message: &str)
    -> Result<MergeOutcome>;

    /// Returns `true` while a merge or squash merge awaits its commit.
    fn is_merge_in_progress(&self, repo: &Path) -> Result<bool>;

    /// Paths with unresolved conflicts.
    fn conflicted_files(&self, repo: &Path) -> Result<Vec<String>>;

    /// Commits the staged result of an in-progress merge.
    fn commit_merge(&self, repo: &Path, message: &str) -> Result<()>;

    /// Aborts an in-progress merge, restoring the pre-merge state.
    fn abort_merge(&self, repo: &Path) -> Result<()>;

    /// Reads a file as stored in `branch`'s tree, without checkout.
    fn read_file_at(&self, repo: &Path, branch: &str, path: &str) -> Result<String>;

    /// Lists file paths under `dir` in `branch`'s tree, without checkout.
    /// A missing directory yields an empty list.
    fn list_files_at(&self, repo: &Path, branch: &str, dir: &str) -> Result<Vec<String>>;

    /// Configured identity as `Name <email>`, if any.
    fn user_identity(&self, repo: &Path) -> Result<Option<String>>;

    /// Pushes `branch` to its upstream remote.
    fn push(&self, repo: &Path, branch: &str) -> Result<()>;
}
