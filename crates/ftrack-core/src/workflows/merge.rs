//! Merge workflow: close features and merge their branch into the base.
//!
//! A merge is either idle or waiting on conflicts. The waiting state is the
//! [`MergeState`] file; nothing else carries over between invocations.
//!
//! ```text
//!            merge (conflict)
//!   Idle ------------------------> ConflictPending
//!    ^                                 |
//!    +------ continue / abort ---------+
//! ```
//!
//! Preconditions (base branch exists, a target feature exists, clean working
//! tree, commit author) are all checked before the first feature is closed.

use crate::config::{FEATURES_DIR, WorkflowMode};
use crate::error::{FtrackError, Result};
use crate::graph::RelationshipGraph;
use crate::model::Feature;
use crate::state::{MergeState, active_feature};
use crate::store::{FeatureFilter, parse_record};
use crate::tools::git::{MergeOutcome, is_trunk_name};
use crate::workflows::Context;
use crate::workflows::branch::resolve_base_branch;
use crate::workflows::discovery::find;
use anyhow::Context as _;
use chrono::Utc;
use std::path::Path;

/// Options for [`merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Feature to close; defaults to the features bound to the current branch.
    pub feature: Option<String>,

    /// Branch to merge into; see [`resolve_base_branch`].
    pub base: Option<String>,

    /// Keep the feature branch after merging.
    pub no_delete: bool,

    /// Squash the feature branch into a single change on the base.
    pub squash: bool,
}

/// Outcome of [`merge`] or [`continue_merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub closed_features: Vec<Feature>,
    pub feature_branch: String,
    pub base_branch: String,

    /// Merge ran on a trunk branch: features were closed, nothing merged.
    pub is_main_branch: bool,

    pub merge_performed: bool,

    /// The merge stopped on conflicts and is waiting for continue or abort.
    pub conflict_detected: bool,
    pub conflict_files: Vec<String>,

    pub branch_deleted: bool,
    pub pushed: bool,
}

/// Outcome of [`abort_merge`].
#[derive(Debug, Clone)]
pub struct AbortResult {
    /// Features reopened, left uncommitted on the restored branch.
    pub reopened: Vec<Feature>,
    pub restored_branch: String,
}

/// Closes the target features and merges the current branch into the base.
///
/// A conflict is not an error: the result has `conflict_detected` set and a
/// [`MergeState`] is written for [`continue_merge`] / [`abort_merge`].
///
/// # Errors
///
/// Returns:
/// - `FtrackError::MergeInProgress` while a conflicted merge is pending
/// - `FtrackError::TargetBranchMissing` if the base branch does not exist
/// - `FtrackError::NoActiveFeature` if no feature can be resolved
/// - `FtrackError::UncommittedChanges` if the working tree is dirty
/// - `FtrackError::MergeFailed` for non-conflict merge failures; features
///   closed before the failure stay closed
#[tracing::instrument(skip_all, fields(feature = ?options.feature, squash = options.squash))]
pub fn merge(ctx: &Context<'_>, options: MergeOptions) -> Result<MergeResult> {
    let repo = ctx.repo();
    let state_path = &ctx.config.merge_state_file;
    if MergeState::exists(ctx.fs, state_path) {
        return Err(FtrackError::MergeInProgress);
    }

    let base = resolve_base_branch(ctx, options.base.as_deref())?;
    let current = ctx.git.current_branch(repo)?;
    let on_trunk = is_trunk_name(&current) || current == base;

    if !on_trunk && !ctx.git.branch_exists(repo, &base)? {
        return Err(FtrackError::TargetBranchMissing(base));
    }

    let mut targets = resolve_targets(ctx, options.feature.as_deref(), &current)?;

    if ctx.git.has_uncommitted_changes(repo)? {
        return Err(FtrackError::UncommittedChanges);
    }

    let author = if on_trunk {
        None
    } else {
        Some(
            ctx.git
                .user_identity(repo)?
                .ok_or(FtrackError::MissingAuthor)?,
        )
    };

    let ids: Vec<String> = targets.iter().map(|f| f.id.clone()).collect();
    let all = ctx.store.list(FeatureFilter::All)?;
    for advisory in RelationshipGraph::from_features(&all).validate_close(&ids, &all) {
        ctx.reporter.warn(&advisory.message());
    }

    let now = Utc::now();
    for feature in &mut targets {
        feature.close(now);
        ctx.store.update(feature)?;
        ctx.reporter
            .info(&format!("closed feature '{}'", feature.name));
    }

    let mut result = MergeResult {
        feature_branch: current.clone(),
        base_branch: base.clone(),
        ..MergeResult::default()
    };

    let Some(author) = author else {
        tracing::info!(branch = %current, closed = targets.len(), "closed features on trunk");
        result.is_main_branch = true;
        result.closed_features = targets;
        return Ok(result);
    };

    ctx.git
        .commit(repo, &close_message(&targets), &author)
        .context("failed to commit closed feature records")?;
    ctx.git.checkout(repo, &base)?;

    let message = merge_message(&current, &base);
    match ctx.git.merge(repo, &current, options.squash, &message) {
        Ok(MergeOutcome::Merged) => {
            tracing::info!(branch = %current, base = %base, "merged feature branch");
            result.merge_performed = true;
            (result.branch_deleted, result.pushed) =
                finish(ctx, &current, &base, options.no_delete, options.squash);
        }
        Ok(MergeOutcome::Conflict(files)) => {
            tracing::info!(branch = %current, conflicts = files.len(), "merge stopped on conflicts");
            MergeState {
                feature_branch: current.clone(),
                base_branch: base.clone(),
                feature_ids: ids,
                no_delete: options.no_delete,
                squash: options.squash,
                conflict_files: Some(files.clone()),
            }
            .save(ctx.fs, state_path)?;
            result.conflict_detected = true;
            result.conflict_files = files;
        }
        Err(e) => {
            if let Err(abort) = ctx.git.abort_merge(repo) {
                tracing::debug!(error = %abort, "abort after failed merge");
            }
            if let Err(restore) = ctx.git.checkout(repo, &current) {
                ctx.reporter.warn(&format!(
                    "could not return to '{}': {}",
                    current, restore
                ));
            }
            return Err(e);
        }
    }

    result.closed_features = targets;
    Ok(result)
}

/// Completes a conflicted merge once every conflict is resolved and staged.
///
/// If the merge was already committed by hand, only the cleanup runs.
///
/// # Errors
///
/// Returns:
/// - `FtrackError::NoMergeInProgress` without a pending merge
/// - `FtrackError::ConflictsRemaining` while unresolved paths remain
/// - `FtrackError::MergeNotCompleted` if the merge was backed out by hand;
///   the merge state is kept so `abort_merge` can reopen the features
#[tracing::instrument(skip_all)]
pub fn continue_merge(ctx: &Context<'_>) -> Result<MergeResult> {
    let repo = ctx.repo();
    let state_path = &ctx.config.merge_state_file;
    let state = MergeState::load(ctx.fs, state_path)?.ok_or(FtrackError::NoMergeInProgress)?;

    if ctx.git.is_merge_in_progress(repo)? {
        let remaining = ctx.git.conflicted_files(repo)?;
        if !remaining.is_empty() {
            return Err(FtrackError::ConflictsRemaining(remaining));
        }
        ctx.git
            .commit_merge(repo, &merge_message(&state.feature_branch, &state.base_branch))?;
    } else {
        if !merge_landed(ctx, &state)? {
            tracing::warn!(branch = %state.feature_branch, "merge was backed out");
            return Err(FtrackError::MergeNotCompleted {
                branch: state.feature_branch,
                base: state.base_branch,
            });
        }
        ctx.reporter
            .info("merge already committed - finishing cleanup");
    }

    let mut closed_features = Vec::new();
    for id in &state.feature_ids {
        match ctx.store.get(id) {
            Ok(feature) => closed_features.push(feature),
            Err(e) if e.is_not_found() => {
                ctx.reporter
                    .warn(&format!("closed feature {} no longer found", id));
            }
            Err(e) => return Err(e),
        }
    }

    let (branch_deleted, pushed) = finish(
        ctx,
        &state.feature_branch,
        &state.base_branch,
        state.no_delete,
        state.squash,
    );
    MergeState::clear(ctx.fs, state_path)?;
    tracing::info!(branch = %state.feature_branch, "completed merge");

    Ok(MergeResult {
        closed_features,
        feature_branch: state.feature_branch,
        base_branch: state.base_branch,
        merge_performed: true,
        branch_deleted,
        pushed,
        ..MergeResult::default()
    })
}

/// Abandons a conflicted merge: returns to the feature branch and reopens
/// the features the merge closed.
///
/// # Errors
///
/// Returns `FtrackError::NoMergeInProgress` without a pending merge.
#[tracing::instrument(skip_all)]
pub fn abort_merge(ctx: &Context<'_>) -> Result<AbortResult> {
    let repo = ctx.repo();
    let state_path = &ctx.config.merge_state_file;
    let state = MergeState::load(ctx.fs, state_path)?.ok_or(FtrackError::NoMergeInProgress)?;

    if ctx.git.is_merge_in_progress(repo)? {
        ctx.git.abort_merge(repo)?;
    }
    if ctx.git.current_branch(repo)? != state.feature_branch {
        ctx.git.checkout(repo, &state.feature_branch)?;
    }

    let mut reopened = Vec::new();
    for id in &state.feature_ids {
        match ctx.store.get(id) {
            Ok(mut feature) => {
                feature.reopen();
                ctx.store.update(&feature)?;
                reopened.push(feature);
            }
            Err(e) if e.is_not_found() => {
                ctx.reporter
                    .warn(&format!("cannot reopen {}: record not found", id));
            }
            Err(e) => return Err(e),
        }
    }

    MergeState::clear(ctx.fs, state_path)?;
    tracing::info!(branch = %state.feature_branch, reopened = reopened.len(), "aborted merge");

    Ok(AbortResult {
        reopened,
        restored_branch: state.feature_branch,
    })
}

/// Picks the features a merge closes.
///
/// Order: the named feature (or, in trunk-based mode, the active one), then
/// every open feature bound to `current`, then the single most recently
/// modified open feature. The last step keeps the first one seen on exact
/// ties; listing order is by ID.
fn resolve_targets(
    ctx: &Context<'_>,
    explicit: Option<&str>,
    current: &str,
) -> Result<Vec<Feature>> {
    let named = match explicit {
        Some(identifier) => Some(identifier.to_string()),
        None if ctx.config.workflow.mode == WorkflowMode::TrunkBased => {
            active_feature(ctx.fs, &ctx.config.active_file)?
        }
        None => None,
    };
    if let Some(identifier) = named {
        let feature = find(ctx, &identifier)?;
        if feature.is_closed() {
            return Err(FtrackError::FeatureClosed(feature.name));
        }
        return Ok(vec![feature]);
    }

    let open = ctx.store.list(FeatureFilter::NotClosed)?;
    let bound: Vec<Feature> = open
        .iter()
        .filter(|f| f.branch() == Some(current))
        .cloned()
        .collect();
    if !bound.is_empty() {
        return Ok(bound);
    }

    let mut latest: Option<&Feature> = None;
    for feature in &open {
        if latest.is_none_or(|l| feature.modified_at() > l.modified_at()) {
            latest = Some(feature);
        }
    }
    latest
        .map(|f| vec![f.clone()])
        .ok_or_else(|| FtrackError::NoActiveFeature(current.to_string()))
}

/// Post-merge cleanup. Failures are warnings.
fn finish(
    ctx: &Context<'_>,
    branch: &str,
    base: &str,
    no_delete: bool,
    squash: bool,
) -> (bool, bool) {
    let repo = ctx.repo();

    let deleted = !no_delete
        && match ctx.git.delete_branch(repo, branch, squash) {
            Ok(()) => {
                ctx.reporter.info(&format!("deleted branch '{}'", branch));
                true
            }
            Err(e) => {
                ctx.reporter
                    .warn(&format!("could not delete branch '{}': {}", branch, e));
                false
            }
        };

    let pushed = ctx.config.git.push_after_merge
        && match ctx.git.push(repo, base) {
            Ok(()) => true,
            Err(e) => {
                ctx.reporter
                    .warn(&format!("could not push '{}': {}", base, e));
                false
            }
        };

    (deleted, pushed)
}

fn close_message(features: &[Feature]) -> String {
    let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
    format!("Close feature(s): {}", names.join(", "))
}

/// Whether a merge that is no longer in progress reached the base branch.
///
/// A squash leaves no ancestry behind, so it has landed only when every
/// record it closed is closed in the base tree.
fn merge_landed(ctx: &Context<'_>, state: &MergeState) -> Result<bool> {
    let repo = ctx.repo();
    if !state.squash {
        return ctx
            .git
            .is_ancestor(repo, &state.feature_branch, &state.base_branch);
    }

    for id in &state.feature_ids {
        let path = format!("{}/{}.toml", FEATURES_DIR, id);
        let content = match ctx.git.read_file_at(repo, &state.base_branch, &path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "record missing on base branch");
                return Ok(false);
            }
        };
        let location = format!("{}:{}", state.base_branch, path);
        match parse_record(Path::new(&location), &content) {
            Ok(feature) if feature.is_closed() => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn merge_message(branch: &str, base: &str) -> String {
    format!("Merge branch '{}' into {}", branch, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DEPENDS_ON;
    use crate::state::set_active_feature;
    use crate::store::FeatureStore;
    use crate::tools::git::GitAdapter;
    use crate::workflows::testing::{Harness, ROOT, at, feature};
    use std::path::Path;

    fn on_feature_branch() -> Harness {
        let h = Harness::new();
        h.git.set_current("feature/login");
        h.save(&feature("a1", "Login", Some("feature/login"), 10));
        h
    }

    fn current(h: &Harness) -> String {
        h.git.current_branch(Path::new(ROOT)).unwrap()
    }

    #[test]
    fn test_clean_merge_closes_and_deletes() {
        let h = on_feature_branch();

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();

        assert!(result.merge_performed);
        assert!(!result.is_main_branch);
        assert!(result.branch_deleted);
        assert_eq!(result.base_branch, "main");
        assert!(result.closed_features[0].is_closed());
        assert_eq!(h.git.merges(), vec![("feature/login".to_string(), false)]);
        assert_eq!(h.git.deleted_branches(), vec!["feature/login"]);
        assert_eq!(current(&h), "main");
        assert!(h.store.get("a1").unwrap().is_closed());
    }

    #[test]
    fn test_missing_base_closes_nothing() {
        let h = on_feature_branch();

        let err = merge(
            &h.ctx(),
            MergeOptions {
                base: Some("develop".to_string()),
                ..MergeOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, FtrackError::TargetBranchMissing(b) if b == "develop"));
        assert!(!h.store.get("a1").unwrap().is_closed());
        assert!(h.git.commits().is_empty());
    }

    #[test]
    fn test_uncommitted_changes_close_nothing() {
        let h = on_feature_branch();
        h.git.set_changed(&["src/dirty.rs"]);

        assert!(matches!(
            merge(&h.ctx(), MergeOptions::default()),
            Err(FtrackError::UncommittedChanges)
        ));
        assert!(!h.store.get("a1").unwrap().is_closed());
    }

    #[test]
    fn test_merge_on_trunk_only_closes() {
        let h = Harness::new();
        h.save(&feature("a1", "Login", Some("main"), 10));

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();

        assert!(result.is_main_branch);
        assert!(!result.merge_performed);
        assert!(h.git.merges().is_empty());
        assert!(h.store.get("a1").unwrap().is_closed());
    }

    #[test]
    fn test_conflict_then_continue() {
        let h = on_feature_branch();
        h.git
            .script_merge(MergeOutcome::Conflict(vec!["src/app.rs".to_string()]));

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();
        assert!(result.conflict_detected);
        assert_eq!(result.conflict_files, vec!["src/app.rs"]);
        assert!(h.git.deleted_branches().is_empty());

        let state = MergeState::load(&h.fs, &h.config.merge_state_file)
            .unwrap()
            .unwrap();
        assert_eq!(state.feature_ids, vec!["a1"]);
        assert_eq!(state.conflict_files, Some(vec!["src/app.rs".to_string()]));

        assert!(matches!(
            merge(&h.ctx(), MergeOptions::default()),
            Err(FtrackError::MergeInProgress)
        ));
        assert!(matches!(
            continue_merge(&h.ctx()),
            Err(FtrackError::ConflictsRemaining(files)) if files == vec!["src/app.rs"]
        ));

        h.git.resolve_conflicts();
        let done = continue_merge(&h.ctx()).unwrap();
        assert!(done.merge_performed);
        assert!(done.branch_deleted);
        assert!(done.closed_features[0].is_closed());
        assert!(!MergeState::exists(&h.fs, &h.config.merge_state_file));
    }

    #[test]
    fn test_continue_after_manual_commit_cleans_up() {
        let h = on_feature_branch();
        h.git
            .script_merge(MergeOutcome::Conflict(vec!["src/app.rs".to_string()]));
        merge(
            &h.ctx(),
            MergeOptions {
                no_delete: true,
                ..MergeOptions::default()
            },
        )
        .unwrap();

        h.git.finish_merge_manually();
        let done = continue_merge(&h.ctx()).unwrap();

        assert!(!done.branch_deleted);
        assert!(h.git.deleted_branches().is_empty());
        assert!(!MergeState::exists(&h.fs, &h.config.merge_state_file));
    }

    #[test]
    fn test_continue_after_manual_back_out_keeps_branch() {
        let h = on_feature_branch();
        h.git
            .script_merge(MergeOutcome::Conflict(vec!["src/app.rs".to_string()]));
        merge(&h.ctx(), MergeOptions::default()).unwrap();

        h.git.back_out_merge_manually();
        let err = continue_merge(&h.ctx()).unwrap_err();

        assert!(matches!(
            err,
            FtrackError::MergeNotCompleted { ref branch, .. } if branch == "feature/login"
        ));
        assert!(err.to_string().contains("ftrack merge --abort"));
        assert!(h.git.deleted_branches().is_empty());
        assert!(MergeState::exists(&h.fs, &h.config.merge_state_file));

        let aborted = abort_merge(&h.ctx()).unwrap();
        assert_eq!(aborted.restored_branch, "feature/login");
        assert!(!h.store.get("a1").unwrap().is_closed());
    }

    #[test]
    fn test_conflict_then_abort_reopens() {
        let h = on_feature_branch();
        h.git
            .script_merge(MergeOutcome::Conflict(vec!["src/app.rs".to_string()]));
        merge(&h.ctx(), MergeOptions::default()).unwrap();
        assert!(h.store.get("a1").unwrap().is_closed());

        let aborted = abort_merge(&h.ctx()).unwrap();

        assert_eq!(aborted.restored_branch, "feature/login");
        assert_eq!(current(&h), "feature/login");
        assert!(!h.git.is_merge_in_progress(Path::new(ROOT)).unwrap());
        assert!(!aborted.reopened[0].is_closed());
        assert!(!h.store.get("a1").unwrap().is_closed());
        assert!(!MergeState::exists(&h.fs, &h.config.merge_state_file));
        assert!(matches!(
            abort_merge(&h.ctx()),
            Err(FtrackError::NoMergeInProgress)
        ));
    }

    #[test]
    fn test_failed_merge_restores_branch_but_keeps_closures() {
        let h = on_feature_branch();
        h.git.script_merge_failure("refusing to merge unrelated histories");

        let err = merge(&h.ctx(), MergeOptions::default()).unwrap_err();

        assert!(matches!(err, FtrackError::MergeFailed(_)));
        assert_eq!(current(&h), "feature/login");
        assert!(!h.git.is_merge_in_progress(Path::new(ROOT)).unwrap());
        assert!(h.store.get("a1").unwrap().is_closed());
        assert!(!MergeState::exists(&h.fs, &h.config.merge_state_file));
    }

    #[test]
    fn test_cleanup_failures_are_warnings() {
        let mut h = on_feature_branch();
        h.config.git.push_after_merge = true;
        h.git.fail_delete(true);
        h.git.fail_push(true);

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();

        assert!(result.merge_performed);
        assert!(!result.branch_deleted);
        assert!(!result.pushed);
        assert_eq!(h.reporter.warnings().len(), 2);
    }

    #[test]
    fn test_push_after_merge() {
        let mut h = on_feature_branch();
        h.config.git.push_after_merge = true;

        let result = merge(
            &h.ctx(),
            MergeOptions {
                squash: true,
                ..MergeOptions::default()
            },
        )
        .unwrap();

        assert!(result.pushed);
        assert_eq!(h.git.pushed_branches(), vec!["main"]);
        assert_eq!(h.git.merges(), vec![("feature/login".to_string(), true)]);
    }

    #[test]
    fn test_fallback_keeps_first_seen_on_ties() {
        let h = Harness::new();
        h.git.set_current("feature/unbound");
        h.save(&feature("b2", "Beta", None, 30));
        h.save(&feature("a1", "Alpha", None, 30));
        h.save(&feature("c3", "Gamma", None, 10));

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();

        let closed: Vec<&str> = result.closed_features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(closed, vec!["a1"]);
        assert!(!h.store.get("b2").unwrap().is_closed());
    }

    #[test]
    fn test_explicit_feature_and_active_context() {
        let h = on_feature_branch();
        let mut closed = feature("z9", "Done", None, 0);
        closed.close(at(1));
        h.save(&closed);
        assert!(matches!(
            merge(
                &h.ctx(),
                MergeOptions {
                    feature: Some("Done".to_string()),
                    ..MergeOptions::default()
                },
            ),
            Err(FtrackError::FeatureClosed(_))
        ));

        let mut h = Harness::new();
        h.config.workflow.mode = WorkflowMode::TrunkBased;
        h.save(&feature("a1", "Alpha", None, 50));
        h.save(&feature("b2", "Beta", None, 10));
        set_active_feature(&h.fs, &h.config.active_file, "b2").unwrap();

        let result = merge(&h.ctx(), MergeOptions::default()).unwrap();
        assert_eq!(result.closed_features[0].id, "b2");
        assert!(!h.store.get("a1").unwrap().is_closed());
    }

    #[test]
    fn test_open_dependency_is_reported() {
        let h = on_feature_branch();
        let mut login = h.store.get("a1").unwrap();
        login.add_relationship(DEPENDS_ON, "d4");
        h.save(&login);
        h.save(&feature("d4", "Schema", Some("feature/schema"), 0));

        merge(&h.ctx(), MergeOptions::default()).unwrap();

        let warnings = h.reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Schema"));
    }
}
