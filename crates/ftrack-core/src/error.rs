//! Error types for ftrack operations.
//!
//! Every failure a workflow can surface has its own variant so callers can
//! render precise guidance. Recoverable outcomes such as merge conflicts are
//! *not* errors; they are reported through result types in the workflow
//! modules.

use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error types for ftrack operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FtrackError {
    // Repository errors
    /// Not inside a git repository.
    #[error("not a git repository: {0}")]
    NotGitRepository(PathBuf),

    /// The repository has no commits yet, so no branch can be created.
    #[error("repository has no commits yet - create an initial commit first")]
    EmptyRepository,

    /// Repository already initialized for ftrack.
    #[error("repository already initialized for ftrack")]
    AlreadyInitialized,

    /// Repository not initialized - user needs to run `ftrack init` first.
    #[error("repository not initialized for ftrack - run `ftrack init` first")]
    NotInitialized,

    // Feature lookup errors
    /// No feature matched the identifier on any branch searched.
    #[error("feature not found: {identifier}{}", format_suggestions(.suggestions))]
    FeatureNotFound {
        /// ID or name that was looked up.
        identifier: String,
        /// Similar feature names, best match first.
        suggestions: Vec<String>,
    },

    /// More than one feature on the current branch carries this name.
    #[error("ambiguous feature name '{name}' matches {} features ({}) - use an ID", .ids.len(), .ids.join(", "))]
    AmbiguousFeature {
        /// The name that matched.
        name: String,
        /// IDs of every matching feature.
        ids: Vec<String>,
    },

    /// Feature exists but is closed.
    #[error("feature '{0}' is closed - run `ftrack reopen` first")]
    FeatureClosed(String),

    /// Feature only exists on a remote branch.
    #[error(
        "feature '{name}' only exists on remote branch '{branch}' - run `git fetch` and check out the branch locally first"
    )]
    RemoteOnlyFeature {
        /// Feature name.
        name: String,
        /// Remote branch the record was found on.
        branch: String,
    },

    /// Feature already exists with this ID.
    #[error("feature already exists: {0}")]
    FeatureAlreadyExists(String),

    // Workflow precondition errors
    /// No open feature is bound to the current branch.
    #[error("no active feature on branch '{0}' - create one with `ftrack new` or switch to one")]
    NoActiveFeature(String),

    /// Working tree has uncommitted changes.
    #[error("uncommitted changes in working tree - commit or stash them first")]
    UncommittedChanges,

    /// Invalid flag combination.
    #[error("invalid options: {0}")]
    InvalidFlags(String),

    /// Neither an explicit author nor a git identity is available.
    #[error("no commit author - pass --author or set git user.name/user.email")]
    MissingAuthor,

    /// Git branch already exists with the specified name.
    #[error("branch already exists: {0} - switch to it with `ftrack switch` or pick another name")]
    BranchExists(String),

    /// Relationship would introduce a dependency cycle.
    #[error("relationship {from} {kind} {to} would create a cycle")]
    RelationshipCycle {
        /// Source feature ID.
        from: String,
        /// Relationship kind.
        kind: String,
        /// Target feature ID.
        to: String,
    },

    /// Unknown relationship kind.
    #[error("unknown relationship kind: {0}")]
    UnknownRelationship(String),

    // Merge recovery errors
    /// A conflicted merge is pending.
    #[error("a merge is in progress - run `ftrack merge --continue` or `ftrack merge --abort`")]
    MergeInProgress,

    /// Continue/abort requested without a pending merge.
    #[error("no merge in progress")]
    NoMergeInProgress,

    /// Unmerged paths remain in the index.
    #[error("conflicts remaining in: {} - resolve and stage them, then run `ftrack merge --continue`", .0.join(", "))]
    ConflictsRemaining(Vec<String>),

    /// The pending merge was backed out without being committed.
    #[error("merge of '{branch}' into '{base}' is no longer in progress and was never committed - run `ftrack merge --abort` to reopen its features")]
    MergeNotCompleted { branch: String, base: String },

    /// The merge target branch does not exist.
    #[error("target branch '{0}' does not exist - create it or set git.base_branch in .ftrack/config.toml")]
    TargetBranchMissing(String),

    /// Merge failed for a reason other than conflicts.
    #[error("merge failed: {0}")]
    MergeFailed(String),

    // Git errors
    /// Git command failed with the specified error.
    #[error("git command failed: {0}")]
    GitCommandFailed(String),

    // Storage errors
    /// A feature record could not be parsed.
    #[error("corrupted feature record {path}: {reason}")]
    CorruptedRecord {
        /// Record location.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// State file is corrupted and cannot be parsed.
    #[error("corrupted state file: {0}")]
    CorruptedState(PathBuf),

    /// Path not found in the file system.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// Error reading file.
    #[error("file read error: {0}")]
    FileReadError(String),

    /// Error writing file.
    #[error("file write error: {0}")]
    FileWriteError(String),

    /// Permission denied for the specified operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // Config errors
    /// Invalid configuration detected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    // IO and system errors
    /// Standard IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context from anyhow.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

impl FtrackError {
    /// Builds a not-found error without suggestions.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        FtrackError::FeatureNotFound {
            identifier: identifier.into(),
            suggestions: Vec::new(),
        }
    }

    /// Returns `true` for the not-found lookup outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FtrackError::FeatureNotFound { .. })
    }
}

/// Result type alias for ftrack operations.
pub type Result<T> = std::result::Result<T, FtrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_suggestions() {
        let err = FtrackError::FeatureNotFound {
            identifier: "logn".to_string(),
            suggestions: vec!["login".to_string(), "logout".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "feature not found: logn (did you mean: login, logout?)"
        );
    }

    #[test]
    fn test_not_found_without_suggestions() {
        assert_eq!(
            FtrackError::not_found("x").to_string(),
            "feature not found: x"
        );
    }

    #[test]
    fn test_conflicts_remaining_names_files() {
        let err = FtrackError::ConflictsRemaining(vec!["a.txt".into(), "b.txt".into()]);
        assert!(err.to_string().contains("a.txt, b.txt"));
        assert!(err.to_string().contains("--continue"));
    }
}
