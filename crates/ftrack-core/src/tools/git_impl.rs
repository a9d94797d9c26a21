//! Standard git adapter implementation.
//!
//! Runs the `git` command-line tool via `std::process::Command`.

use crate::error::{FtrackError, Result};
use crate::tools::git::{CommitOutcome, GitAdapter, MergeOutcome, TRUNK_NAMES};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Git adapter using the `git` command-line tool.
#[derive(Debug, Default)]
pub struct StdGitAdapter;

impl StdGitAdapter {
    /// Creates a new standard git adapter.
    pub fn new() -> Self {
        Self
    }

    /// Runs git and returns the raw process output whatever the exit status.
    fn output(&self, args: &[&str], cwd: &Path) -> Result<Output> {
        Command::new("git")
            .args(["-c", "core.quotepath=false"])
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| FtrackError::GitCommandFailed(format!("failed to execute git: {}", e)))
    }

    /// Runs git, failing on a non-zero exit, and returns untrimmed stdout.
    fn run_raw(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let output = self.output(args, cwd)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FtrackError::GitCommandFailed(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Runs git and returns trimmed stdout.
    fn run_git(&self, args: &[&str], cwd: &Path) -> Result<String> {
        self.run_raw(args, cwd).map(|s| s.trim().to_string())
    }

    /// Runs git and reports only whether it exited successfully.
    fn succeeds(&self, args: &[&str], cwd: &Path) -> Result<bool> {
        Ok(self.output(args, cwd)?.status.success())
    }

    fn lines(output: &str) -> Vec<String> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn git_dir(&self, repo: &Path) -> Result<PathBuf> {
        let dir = PathBuf::from(self.run_git(&["rev-parse", "--git-dir"], repo)?);
        Ok(if dir.is_absolute() { dir } else { repo.join(dir) })
    }

    fn has_staged_changes(&self, repo: &Path) -> Result<bool> {
        Ok(!self.succeeds(&["diff", "--cached", "--quiet"], repo)?)
    }

    fn config_value(&self, repo: &Path, key: &str) -> Result<Option<String>> {
        let output = self.output(&["config", "--get", key], repo)?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((output.status.success() && !value.is_empty()).then_some(value))
    }
}

/// Extracts the path from one `git status --porcelain` line.
fn porcelain_path(line: &str) -> Option<String> {
    let path = line.get(3..)?;
    let path = path.rsplit(" -> ").next().unwrap_or(path);
    let path = path.trim().trim_matches('"');
    (!path.is_empty()).then(|| path.to_string())
}

impl GitAdapter for StdGitAdapter {
    fn is_git_repo(&self, path: &Path) -> bool {
        path.is_dir()
            && self
                .succeeds(&["rev-parse", "--is-inside-work-tree"], path)
                .unwrap_or(false)
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf> {
        if !self.is_git_repo(path) {
            return Err(FtrackError::NotGitRepository(path.to_path_buf()));
        }
        self.run_git(&["rev-parse", "--show-toplevel"], path)
            .map(PathBuf::from)
    }

    fn has_commits(&self, repo: &Path) -> Result<bool> {
        self.succeeds(&["rev-parse", "--verify", "--quiet", "HEAD"], repo)
    }

    fn current_branch(&self, repo: &Path) -> Result<String> {
        self.run_git(&["symbolic-ref", "--short", "HEAD"], repo)
            .map_err(|_| FtrackError::GitCommandFailed("HEAD is detached".to_string()))
    }

    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>> {
        for name in TRUNK_NAMES {
            if self.branch_exists(repo, name)? {
                return Ok(Some(name.to_string()));
            }
        }
        Ok(None)
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{}", branch);
        self.succeeds(&["show-ref", "--verify", "--quiet", &reference], repo)
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        if self.branch_exists(repo, branch)? {
            return Err(FtrackError::BranchExists(branch.to_string()));
        }
        self.run_git(&["branch", branch], repo)?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run_git(&["checkout", "-q", branch, "--"], repo)?;
        Ok(())
    }

    fn is_ancestor(&self, repo: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant], repo)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(FtrackError::GitCommandFailed(format!(
                "git merge-base --is-ancestor {} {}: {}",
                ancestor,
                descendant,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn delete_branch(&self, repo: &Path, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run_git(&["branch", flag, branch], repo)?;
        Ok(())
    }

    fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        let output = self.run_git(
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
            repo,
        )?;
        Ok(Self::lines(&output))
    }

    fn remote_branches(&self, repo: &Path) -> Result<Vec<String>> {
        let output = self.run_raw(
            &[
                "for-each-ref",
                "--format=%(refname:short)%09%(symref)",
                "refs/remotes",
            ],
            repo,
        )?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let (name, symref) = line.split_once('\t').unwrap_or((line, ""));
                (symref.trim().is_empty() && !name.trim().is_empty())
                    .then(|| name.trim().to_string())
            })
            .collect())
    }

    fn changed_files(&self, repo: &Path) -> Result<Vec<String>> {
        let output = self.run_raw(&["status", "--porcelain", "--untracked-files=all"], repo)?;
        Ok(output.lines().filter_map(porcelain_path).collect())
    }

    fn has_uncommitted_changes(&self, repo: &Path) -> Result<bool> {
        Ok(!self.changed_files(repo)?.is_empty())
    }

    fn commit(&self, repo: &Path, message: &str, author: &str) -> Result<CommitOutcome> {
        self.run_git(&["add", "-A"], repo)?;

        if !self.has_staged_changes(repo)? {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let author_arg = format!("--author={}", author);
        self.run_git(&["commit", "-q", "-m", message, &author_arg], repo)?;
        let hash = self.run_git(&["rev-parse", "HEAD"], repo)?;
        Ok(CommitOutcome::Committed(hash))
    }

    fn merge(
        &self,
        repo: &Path,
        branch: &str,
        squash: bool,
        message: &str,
    ) -> Result<MergeOutcome> {
        let output = if squash {
            self.output(&["merge", "--squash", branch], repo)?
        } else {
            self.output(&["merge", "--no-edit", "-m", message, branch], repo)?
        };

        if !output.status.success() {
            let conflicts = self.conflicted_files(repo)?;
            if !conflicts.is_empty() {
                return Ok(MergeOutcome::Conflict(conflicts));
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(FtrackError::MergeFailed(reason));
        }

        if squash && self.has_staged_changes(repo)? {
            self.run_git(&["commit", "-q", "-m", message], repo)?;
        }
        Ok(MergeOutcome::Merged)
    }

    fn is_merge_in_progress(&self, repo: &Path) -> Result<bool> {
        let git_dir = self.git_dir(repo)?;
        Ok(git_dir.join("MERGE_HEAD").exists() || git_dir.join("SQUASH_MSG").exists())
    }

    fn conflicted_files(&self, repo: &Path) -> Result<Vec<String>> {
        let output = self.run_git(&["diff", "--name-only", "--diff-filter=U"], repo)?;
        Ok(Self::lines(&output))
    }

    fn commit_merge(&self, repo: &Path, message: &str) -> Result<()> {
        self.run_git(&["commit", "-q", "-m", message], repo)?;
        Ok(())
    }

    fn abort_merge(&self, repo: &Path) -> Result<()> {
        let git_dir = self.git_dir(repo)?;
        if git_dir.join("MERGE_HEAD").exists() {
            self.run_git(&["merge", "--abort"], repo)?;
        } else {
            self.run_git(&["reset", "--merge"], repo)?;
        }

        let squash_msg = git_dir.join("SQUASH_MSG");
        if squash_msg.exists() {
            std::fs::remove_file(&squash_msg)?;
        }
        Ok(())
    }

    fn read_file_at(&self, repo: &Path, branch: &str, path: &str) -> Result<String> {
        let object = format!("{}:{}", branch, path);
        self.run_raw(&["show", &object], repo)
    }

    fn list_files_at(&self, repo: &Path, branch: &str, dir: &str) -> Result<Vec<String>> {
        let output = self.run_git(&["ls-tree", "-r", "--name-only", branch, "--", dir], repo)?;
        Ok(Self::lines(&output))
    }

    fn user_identity(&self, repo: &Path) -> Result<Option<String>> {
        let name = self.config_value(repo, "user.name")?;
        let email = self.config_value(repo, "user.email")?;
        Ok(match (name, email) {
            (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
            (Some(name), None) => Some(format!("{} <>", name)),
            (None, Some(email)) => Some(format!("{} <{}>", email, email)),
            (None, None) => None,
        })
    }

    fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        let key = format!("branch.{}.remote", branch);
        let remote = self
            .config_value(repo, &key)?
            .unwrap_or_else(|| "origin".to_string());
        self.run_git(&["push", &remote, branch], repo)?;
        Ok(())
    }
}
