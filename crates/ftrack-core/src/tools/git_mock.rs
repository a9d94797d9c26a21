//! Mock git adapter for testing.
//!
//! Simulates branches as in-memory trees so cross-branch reads can be tested
//! without a repository. Commit and merge outcomes are scripted. The working
//! tree itself is not modelled; pair the mock with
//! [`MockFsAdapter`](crate::tools::fs_mock::MockFsAdapter) for that.

use crate::error::{FtrackError, Result};
use crate::tools::git::{CommitOutcome, GitAdapter, MergeOutcome, TRUNK_NAMES};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Tree = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct MockRepo {
    root: PathBuf,
    has_commits: bool,
    current: String,
    branches: BTreeMap<String, Tree>,
    remotes: BTreeMap<String, Tree>,
    changed: Vec<String>,
    identity: Option<String>,
    commit_noop: bool,
    commits: Vec<(String, String)>,
    next_merge: Option<std::result::Result<MergeOutcome, String>>,
    merging: bool,
    conflicts: Vec<String>,
    merges: Vec<(String, bool)>,
    integrated: Vec<(String, String)>,
    deleted: Vec<String>,
    pushed: Vec<String>,
    fail_push: bool,
    fail_delete: bool,
    unreadable: Vec<String>,
}

/// Mock git adapter.
///
/// Clones share state, so a test can keep a handle while the workflow under
/// test owns another.
///
/// ```
/// use ftrack_core::tools::git::GitAdapter;
/// use ftrack_core::tools::git_mock::MockGitAdapter;
/// use std::path::Path;
///
/// let git = MockGitAdapter::with_repo("/repo");
/// git.add_branch("feature/x");
/// assert!(git.branch_exists(Path::new("/repo"), "feature/x").unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockGitAdapter {
    repo: Arc<Mutex<MockRepo>>,
}

impl MockGitAdapter {
    /// Creates a mock repository rooted at `root` with one commit on `main`.
    pub fn with_repo(root: impl Into<PathBuf>) -> Self {
        let mut repo = MockRepo {
            root: root.into(),
            has_commits: true,
            current: "main".to_string(),
            identity: Some("Test User <test@example.com>".to_string()),
            ..MockRepo::default()
        };
        repo.branches.insert("main".to_string(), Tree::new());
        Self {
            repo: Arc::new(Mutex::new(repo)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockRepo> {
        self.repo.lock().unwrap()
    }

    /// Adds an empty local branch.
    pub fn add_branch(&self, branch: &str) {
        self.lock()
            .branches
            .entry(branch.to_string())
            .or_default();
    }

    /// Stores a file in a local branch's tree, creating the branch if needed.
    pub fn put_file(&self, branch: &str, path: &str, content: &str) {
        self.lock()
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    /// Stores a file in a remote-tracking branch (e.g. `origin/x`).
    pub fn put_remote_file(&self, branch: &str, path: &str, content: &str) {
        self.lock()
            .remotes
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    /// Removes a local branch.
    pub fn remove_branch(&self, branch: &str) {
        self.lock().branches.remove(branch);
    }

    /// Sets the checked-out branch without any checks.
    pub fn set_current(&self, branch: &str) {
        self.add_branch(branch);
        self.lock().current = branch.to_string();
    }

    /// Sets the changed-file listing.
    pub fn set_changed(&self, files: &[&str]) {
        self.lock().changed = files.iter().map(|f| f.to_string()).collect();
    }

    /// Sets the configured identity.
    pub fn set_identity(&self, identity: Option<&str>) {
        self.lock().identity = identity.map(str::to_string);
    }

    /// Marks the repository as having no commits.
    pub fn set_empty(&self) {
        self.lock().has_commits = false;
    }

    /// Makes every commit report "nothing to commit".
    pub fn set_commit_noop(&self, noop: bool) {
        self.lock().commit_noop = noop;
    }

    /// Scripts the outcome of the next merge.
    pub fn script_merge(&self, outcome: MergeOutcome) {
        self.lock().next_merge = Some(Ok(outcome));
    }

    /// Scripts the next merge to fail with a non-conflict error.
    pub fn script_merge_failure(&self, reason: &str) {
        self.lock().next_merge = Some(Err(reason.to_string()));
    }

    /// Simulates the user resolving and staging every conflict.
    pub fn resolve_conflicts(&self) {
        self.lock().conflicts.clear();
    }

    /// Simulates the user finishing the merge by hand.
    pub fn finish_merge_manually(&self) {
        let mut repo = self.lock();
        repo.conflicts.clear();
        repo.merging = false;
        repo.integrate_last_merge();
    }

    /// Simulates the user backing the merge out by hand, leaving nothing
    /// committed.
    pub fn back_out_merge_manually(&self) {
        let mut repo = self.lock();
        repo.conflicts.clear();
        repo.merging = false;
    }

    /// Makes `read_file_at` fail for `path` on every branch while it is still
    /// listed.
    pub fn fail_read(&self, path: &str) {
        self.lock().unreadable.push(path.to_string());
    }

    pub fn fail_push(&self, fail: bool) {
        self.lock().fail_push = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    /// Commits made so far as `(message, author)`.
    pub fn commits(&self) -> Vec<(String, String)> {
        self.lock().commits.clone()
    }

    /// Merges requested so far as `(branch, squash)`.
    pub fn merges(&self) -> Vec<(String, bool)> {
        self.lock().merges.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn pushed_branches(&self) -> Vec<String> {
        self.lock().pushed.clone()
    }
}

impl MockRepo {
    /// Records the last requested merge as reachable from the current branch.
    fn integrate_last_merge(&mut self) {
        if let Some((branch, _)) = self.merges.last().cloned() {
            let into = self.current.clone();
            self.integrated.push((branch, into));
        }
    }
}

impl GitAdapter for MockGitAdapter {
    fn is_git_repo(&self, path: &Path) -> bool {
        path.starts_with(&self.lock().root)
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf> {
        if self.is_git_repo(path) {
            Ok(self.lock().root.clone())
        } else {
            Err(FtrackError::NotGitRepository(path.to_path_buf()))
        }
    }

    fn has_commits(&self, _repo: &Path) -> Result<bool> {
        Ok(self.lock().has_commits)
    }

    fn current_branch(&self, _repo: &Path) -> Result<String> {
        Ok(self.lock().current.clone())
    }

    fn trunk_branch(&self, _repo: &Path) -> Result<Option<String>> {
        let repo = self.lock();
        Ok(TRUNK_NAMES
            .iter()
            .find(|name| repo.branches.contains_key(**name))
            .map(|name| name.to_string()))
    }

    fn branch_exists(&self, _repo: &Path, branch: &str) -> Result<bool> {
        Ok(self.lock().branches.contains_key(branch))
    }

    fn create_branch(&self, _repo: &Path, branch: &str) -> Result<()> {
        let mut repo = self.lock();
        if repo.branches.contains_key(branch) {
            return Err(FtrackError::BranchExists(branch.to_string()));
        }
        let tree = repo.branches.get(&repo.current).cloned().unwrap_or_default();
        repo.branches.insert(branch.to_string(), tree);
        Ok(())
    }

    fn checkout(&self, _repo: &Path, branch: &str) -> Result<()> {
        let mut repo = self.lock();
        if !repo.branches.contains_key(branch) {
            return Err(FtrackError::GitCommandFailed(format!(
                "pathspec '{}' did not match any branch",
                branch
            )));
        }
        repo.current = branch.to_string();
        Ok(())
    }

    fn is_ancestor(&self, _repo: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
        let repo = self.lock();
        Ok(ancestor == descendant
            || repo
                .integrated
                .iter()
                .any(|(branch, into)| branch == ancestor && into == descendant))
    }

    fn delete_branch(&self, _repo: &Path, branch: &str, _force: bool) -> Result<()> {
        let mut repo = self.lock();
        if repo.fail_delete {
            return Err(FtrackError::GitCommandFailed(format!(
                "cannot delete branch '{}'",
                branch
            )));
        }
        repo.branches.remove(branch);
        repo.deleted.push(branch.to_string());
        Ok(())
    }

    fn local_branches(&self, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.lock().branches.keys().cloned().collect())
    }

    fn remote_branches(&self, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.lock().remotes.keys().cloned().collect())
    }

    fn changed_files(&self, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.lock().changed.clone())
    }

    fn has_uncommitted_changes(&self, _repo: &Path) -> Result<bool> {
        Ok(!self.lock().changed.is_empty())
    }

    fn commit(&self, _repo: &Path, message: &str, author: &str) -> Result<CommitOutcome> {
        let mut repo = self.lock();
        if repo.commit_noop || repo.changed.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        repo.changed.clear();
        repo.commits.push((message.to_string(), author.to_string()));
        Ok(CommitOutcome::Committed(format!("{:040x}", repo.commits.len())))
    }

    fn merge(
        &self,
        _repo: &Path,
        branch: &str,
        squash: bool,
        _message: &str,
    ) -> Result<MergeOutcome> {
        let mut repo = self.lock();
        repo.merges.push((branch.to_string(), squash));
        match repo.next_merge.take() {
            None | Some(Ok(MergeOutcome::Merged)) => {
                repo.integrate_last_merge();
                Ok(MergeOutcome::Merged)
            }
            Some(Ok(MergeOutcome::Conflict(files))) => {
                repo.merging = true;
                repo.conflicts = files.clone();
                Ok(MergeOutcome::Conflict(files))
            }
            Some(Err(reason)) => {
                repo.merging = true;
                Err(FtrackError::MergeFailed(reason))
            }
        }
    }

    fn is_merge_in_progress(&self, _repo: &Path) -> Result<bool> {
        Ok(self.lock().merging)
    }

    fn conflicted_files(&self, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.lock().conflicts.clone())
    }

    fn commit_merge(&self, _repo: &Path, message: &str) -> Result<()> {
        let mut repo = self.lock();
        if !repo.conflicts.is_empty() {
            return Err(FtrackError::GitCommandFailed(
                "cannot commit with unmerged paths".to_string(),
            ));
        }
        repo.merging = false;
        repo.integrate_last_merge();
        let author = repo.identity.clone().unwrap_or_default();
        repo.commits.push((message.to_string(), author));
        Ok(())
    }

    fn abort_merge(&self, _repo: &Path) -> Result<()> {
        let mut repo = self.lock();
        repo.merging = false;
        repo.conflicts.clear();
        Ok(())
    }

    fn read_file_at(&self, _repo: &Path, branch: &str, path: &str) -> Result<String> {
        let repo = self.lock();
        if repo.unreadable.iter().any(|p| p == path) {
            return Err(FtrackError::GitCommandFailed(format!(
                "bad object {}:{}",
                branch, path
            )));
        }
        repo.branches
            .get(branch)
            .or_else(|| repo.remotes.get(branch))
            .and_then(|tree| tree.get(path))
            .cloned()
            .ok_or_else(|| {
                FtrackError::GitCommandFailed(format!("path '{}' does not exist in '{}'", path, branch))
            })
    }

    fn list_files_at(&self, _repo: &Path, branch: &str, dir: &str) -> Result<Vec<String>> {
        let repo = self.lock();
        let tree = repo
            .branches
            .get(branch)
            .or_else(|| repo.remotes.get(branch))
            .ok_or_else(|| {
                FtrackError::GitCommandFailed(format!("not a valid object name {}", branch))
            })?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(tree
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn user_identity(&self, _repo: &Path) -> Result<Option<String>> {
        Ok(self.lock().identity.clone())
    }

    fn push(&self, _repo: &Path, branch: &str) -> Result<()> {
        let mut repo = self.lock();
        if repo.fail_push {
            return Err(FtrackError::GitCommandFailed("remote rejected push".to_string()));
        }
        repo.pushed.push(branch.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_branch_copies_current_tree() {
        let git = MockGitAdapter::with_repo("/repo");
        git.put_file("main", ".ftrack/features/a.toml", "a");
        git.create_branch(Path::new("/repo"), "feature/x").unwrap();

        assert_eq!(
            git.list_files_at(Path::new("/repo"), "feature/x", ".ftrack/features")
                .unwrap(),
            vec![".ftrack/features/a.toml"]
        );
        assert!(matches!(
            git.create_branch(Path::new("/repo"), "feature/x"),
            Err(FtrackError::BranchExists(_))
        ));
    }

    #[test]
    fn test_scripted_conflict_leaves_merge_in_progress() {
        let repo = Path::new("/repo");
        let git = MockGitAdapter::with_repo("/repo");
        git.script_merge(MergeOutcome::Conflict(vec!["a.txt".to_string()]));

        let outcome = git.merge(repo, "feature/x", false, "merge").unwrap();
        assert_eq!(outcome, MergeOutcome::Conflict(vec!["a.txt".to_string()]));
        assert!(git.is_merge_in_progress(repo).unwrap());
        assert!(git.commit_merge(repo, "merge").is_err());

        git.resolve_conflicts();
        git.commit_merge(repo, "merge").unwrap();
        assert!(!git.is_merge_in_progress(repo).unwrap());
    }

    #[test]
    fn test_commit_without_changes_is_noop() {
        let repo = Path::new("/repo");
        let git = MockGitAdapter::with_repo("/repo");
        assert_eq!(
            git.commit(repo, "m", "a").unwrap(),
            CommitOutcome::NothingToCommit
        );

        git.set_changed(&["x"]);
        assert!(matches!(
            git.commit(repo, "m", "a").unwrap(),
            CommitOutcome::Committed(_)
        ));
        assert!(git.changed_files(repo).unwrap().is_empty());
    }
}
