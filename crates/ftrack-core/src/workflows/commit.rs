//! Commit workflow for features sharing the current branch.
//!
//! Every open feature bound to the branch gets the same `modified_at`.
//! Records are written before `git commit` runs so the commit snapshot
//! carries the metadata change.

use crate::config::META_DIR;
use crate::error::{FtrackError, Result};
use crate::model::Feature;
use crate::tools::git::CommitOutcome;
use crate::workflows::Context;
use crate::workflows::discovery::find_all_for_branch;
use chrono::Utc;

/// Options for [`commit_shared_branch`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message; derived from the feature names when absent.
    pub message: Option<String>,

    /// Author as `Name <email>`; the git identity is used when absent.
    pub author: Option<String>,

    /// Link changed files to the primary feature, regardless of
    /// `commit.auto_link_files`.
    pub link_files: bool,
}

/// What a commit did.
#[derive(Debug, Clone)]
pub struct CommitReport {
    /// Features bound to the branch, primary first.
    pub features: Vec<Feature>,

    /// Hash of the new commit.
    pub commit: Option<String>,

    /// Files newly linked to the primary feature.
    pub linked_files: Vec<String>,

    /// Nothing was committed. Feature records are untouched only when the
    /// working tree had no changes to begin with.
    pub nothing_to_commit: bool,
}

/// Commits pending work on the current branch on behalf of every feature
/// bound to it.
///
/// # Errors
///
/// Returns:
/// - `FtrackError::NoActiveFeature` if no open feature is bound to the branch
/// - `FtrackError::MissingAuthor` if no author is given and git has no identity
/// - `FtrackError::GitCommandFailed` if the underlying commit fails
#[tracing::instrument(skip_all)]
pub fn commit_shared_branch(ctx: &Context<'_>, options: CommitOptions) -> Result<CommitReport> {
    let repo = ctx.repo();
    let branch = ctx.git.current_branch(repo)?;

    let mut features = find_all_for_branch(ctx, &branch)?;
    if features.is_empty() {
        return Err(FtrackError::NoActiveFeature(branch));
    }

    let changed = ctx.git.changed_files(repo)?;
    if changed.is_empty() {
        tracing::debug!(branch = %branch, "working tree clean");
        return Ok(CommitReport {
            features,
            commit: None,
            linked_files: Vec::new(),
            nothing_to_commit: true,
        });
    }

    let author = match options.author {
        Some(author) => author,
        None => ctx
            .git
            .user_identity(repo)?
            .ok_or(FtrackError::MissingAuthor)?,
    };

    let now = Utc::now();
    for feature in &mut features {
        feature.touch(now);
        feature.add_author(&author);
    }

    let mut linked_files = Vec::new();
    if options.link_files || ctx.config.commit.auto_link_files {
        let primary = &mut features[0];
        for path in changed.iter().filter(|p| !is_internal(p)) {
            if primary.link_file(path) {
                linked_files.push(path.clone());
            }
        }
    }

    for feature in &features {
        ctx.store.update(feature)?;
    }

    let message = options.message.unwrap_or_else(|| default_message(&features));
    let outcome = ctx.git.commit(repo, &message, &author)?;
    let commit = match outcome {
        CommitOutcome::Committed(hash) => {
            tracing::info!(
                branch = %branch,
                commit = %hash,
                features = features.len(),
                "committed shared branch"
            );
            Some(hash)
        }
        CommitOutcome::NothingToCommit => None,
    };

    Ok(CommitReport {
        nothing_to_commit: commit.is_none(),
        features,
        commit,
        linked_files,
    })
}

fn is_internal(path: &str) -> bool {
    path == META_DIR || path.starts_with(&format!("{}/", META_DIR))
}

fn default_message(features: &[Feature]) -> String {
    let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
    format!("Update {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeatureStore;
    use crate::workflows::testing::{Harness, at, feature};

    fn shared_pair(h: &Harness) {
        h.git.set_current("feature/shared");
        h.save(&feature("a1", "Login", Some("feature/shared"), 0));
        let mut second = Feature::with_id("b2", "Logout", at(5));
        second.set_branch("feature/shared");
        h.save(&second);
    }

    #[test]
    fn test_every_shared_feature_is_touched() {
        let h = Harness::new();
        shared_pair(&h);
        h.git.set_changed(&["src/login.rs"]);

        let report = commit_shared_branch(&h.ctx(), CommitOptions::default()).unwrap();

        assert!(!report.nothing_to_commit);
        assert!(report.commit.is_some());
        for id in ["a1", "b2"] {
            let stored = h.store.get(id).unwrap();
            assert!(stored.modified_at() > at(5), "{id} not touched");
            assert_eq!(stored.current_version().authors, vec!["Test User <test@example.com>"]);
        }
        assert_eq!(h.git.commits()[0].0, "Update Login, Logout");
    }

    #[test]
    fn test_clean_tree_is_a_noop() {
        let h = Harness::new();
        shared_pair(&h);
        let before = h.store.list(crate::store::FeatureFilter::All).unwrap();

        for _ in 0..2 {
            let report = commit_shared_branch(&h.ctx(), CommitOptions::default()).unwrap();
            assert!(report.nothing_to_commit);
        }
        assert_eq!(h.store.list(crate::store::FeatureFilter::All).unwrap(), before);
        assert!(h.git.commits().is_empty());
    }

    #[test]
    fn test_git_noop_commit_still_advances_timestamps() {
        let h = Harness::new();
        shared_pair(&h);
        h.git.set_changed(&["src/login.rs"]);
        h.git.set_commit_noop(true);

        let report = commit_shared_branch(&h.ctx(), CommitOptions::default()).unwrap();

        assert!(report.nothing_to_commit);
        assert!(h.git.commits().is_empty());
        assert!(h.store.get("a1").unwrap().modified_at() > at(0));
    }

    #[test]
    fn test_link_files_go_to_primary_only() {
        let h = Harness::new();
        shared_pair(&h);
        h.git
            .set_changed(&["src/login.rs", ".ftrack/features/a1.toml", ".ftrack"]);

        let report = commit_shared_branch(
            &h.ctx(),
            CommitOptions {
                link_files: true,
                ..CommitOptions::default()
            },
        )
        .unwrap();

        assert_eq!(report.features[0].id, "a1");
        assert_eq!(report.linked_files, vec!["src/login.rs"]);
        assert_eq!(h.store.get("a1").unwrap().files, vec!["src/login.rs"]);
        assert!(h.store.get("b2").unwrap().files.is_empty());
    }

    #[test]
    fn test_author_resolution() {
        let h = Harness::new();
        shared_pair(&h);
        h.git.set_changed(&["a.txt"]);
        h.git.set_identity(None);

        assert!(matches!(
            commit_shared_branch(&h.ctx(), CommitOptions::default()),
            Err(FtrackError::MissingAuthor)
        ));

        commit_shared_branch(
            &h.ctx(),
            CommitOptions {
                author: Some("Ada <ada@example.com>".to_string()),
                message: Some("wip".to_string()),
                ..CommitOptions::default()
            },
        )
        .unwrap();
        assert_eq!(
            h.git.commits()[0],
            ("wip".to_string(), "Ada <ada@example.com>".to_string())
        );
    }

    #[test]
    fn test_no_open_feature_is_an_error() {
        let h = Harness::new();
        let mut closed = feature("a1", "Login", Some("main"), 0);
        closed.close(at(1));
        h.save(&closed);

        assert!(matches!(
            commit_shared_branch(&h.ctx(), CommitOptions::default()),
            Err(FtrackError::NoActiveFeature(b)) if b == "main"
        ));
    }
}
