//! Feature discovery across branches.
//!
//! The current branch is read through the feature store (the working tree).
//! Every other branch is read from its git tree with `list_files_at` and
//! `read_file_at`, so nothing is checked out. Branches are always visited in
//! the same order:
//!
//! 1. the current branch
//! 2. the trunk branch, unless it is current
//! 3. the remaining local branches, in listing order
//! 4. every remote-tracking branch

use crate::config::FEATURES_DIR;
use crate::error::{FtrackError, Result};
use crate::model::{CrossBranchFeature, Feature};
use crate::store::{FeatureFilter, is_record_path, parse_record};
use crate::suggest::suggest;
use crate::workflows::Context;
use std::collections::BTreeMap;
use std::path::Path;

/// Finds a feature on the current branch by exact ID, else by
/// case-insensitive name.
///
/// # Errors
///
/// Returns `FtrackError::AmbiguousFeature` when several features share the
/// name, and `FtrackError::FeatureNotFound` (with suggestions) when nothing
/// matches.
pub fn find(ctx: &Context<'_>, identifier: &str) -> Result<Feature> {
    if looks_like_id(identifier) {
        match ctx.store.get(identifier) {
            Ok(feature) => return Ok(feature),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    let features = ctx.store.list(FeatureFilter::All)?;
    let mut matches: Vec<Feature> = features
        .iter()
        .filter(|f| names_match(&f.name, identifier))
        .cloned()
        .collect();

    match matches.len() {
        0 => Err(not_found(ctx, identifier, &features)),
        1 => Ok(matches.remove(0)),
        _ => Err(FtrackError::AmbiguousFeature {
            name: identifier.to_string(),
            ids: matches.into_iter().map(|f| f.id).collect(),
        }),
    }
}

/// Finds a feature on any branch, stopping at the first match.
///
/// A match on the current branch always wins, even over a newer copy
/// elsewhere. Matches on remote-tracking branches have `is_remote` set.
#[tracing::instrument(skip_all, fields(identifier = identifier))]
pub fn find_across_branches(ctx: &Context<'_>, identifier: &str) -> Result<CrossBranchFeature> {
    let current = ctx.git.current_branch(ctx.repo())?;

    match find(ctx, identifier) {
        Ok(feature) => {
            return Ok(CrossBranchFeature {
                feature,
                branch: current,
                is_remote: false,
            });
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    for (branch, is_remote) in other_branches(ctx, &current)? {
        let found = read_branch_features(ctx, &branch)?
            .into_iter()
            .find(|f| f.id == identifier || names_match(&f.name, identifier));
        if let Some(feature) = found {
            tracing::debug!(branch = %branch, is_remote, "found feature on another branch");
            return Ok(CrossBranchFeature {
                feature,
                branch,
                is_remote,
            });
        }
    }

    let local = ctx.store.list(FeatureFilter::All)?;
    Err(not_found(ctx, identifier, &local))
}

/// Lists every feature visible on any branch, one entry per ID.
///
/// When an ID appears on several branches the copy with the most recent
/// `modified_at` wins; on an exact tie the first branch visited keeps it.
/// Results are ordered by ID.
#[tracing::instrument(skip_all)]
pub fn list_features_across_branches(ctx: &Context<'_>) -> Result<Vec<CrossBranchFeature>> {
    let current = ctx.git.current_branch(ctx.repo())?;
    let mut by_id: BTreeMap<String, CrossBranchFeature> = BTreeMap::new();

    let mut keep = |feature: Feature, branch: &str, is_remote: bool| {
        let newer = by_id
            .get(&feature.id)
            .is_none_or(|seen| feature.modified_at() > seen.feature.modified_at());
        if newer {
            by_id.insert(
                feature.id.clone(),
                CrossBranchFeature {
                    feature,
                    branch: branch.to_string(),
                    is_remote,
                },
            );
        }
    };

    for feature in ctx.store.list(FeatureFilter::All)? {
        keep(feature, &current, false);
    }
    for (branch, is_remote) in other_branches(ctx, &current)? {
        for feature in read_branch_features(ctx, &branch)? {
            keep(feature, &branch, is_remote);
        }
    }

    Ok(by_id.into_values().collect())
}

/// Open features bound to `branch`, oldest first.
///
/// The first entry is the primary feature. When no open feature is bound to
/// the branch, falls back to the single most recently modified open feature
/// from any branch; exact timestamp ties go to the greatest ID.
pub fn find_all_for_branch(ctx: &Context<'_>, branch: &str) -> Result<Vec<Feature>> {
    let open: Vec<Feature> = list_features_across_branches(ctx)?
        .into_iter()
        .map(|entry| entry.feature)
        .filter(|f| !f.is_closed())
        .collect();

    let mut bound: Vec<Feature> = open
        .iter()
        .filter(|f| f.branch() == Some(branch))
        .cloned()
        .collect();
    if !bound.is_empty() {
        bound.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then(a.id.cmp(&b.id)));
        return Ok(bound);
    }

    let fallback = open
        .into_iter()
        .max_by(|a, b| a.modified_at().cmp(&b.modified_at()).then(a.id.cmp(&b.id)));
    if let Some(feature) = &fallback {
        tracing::debug!(feature = %feature.id, branch, "no feature bound to branch, using most recent");
    }
    Ok(fallback.into_iter().collect())
}

/// IDs double as file names, so anything else is only matched by name.
fn looks_like_id(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn names_match(name: &str, identifier: &str) -> bool {
    name.to_lowercase() == identifier.to_lowercase()
}

fn not_found(ctx: &Context<'_>, identifier: &str, candidates: &[Feature]) -> FtrackError {
    FtrackError::FeatureNotFound {
        identifier: identifier.to_string(),
        suggestions: suggest(
            identifier,
            candidates.iter().map(|f| f.name.as_str()),
            ctx.config.search.suggestion_threshold,
            ctx.config.search.max_suggestions,
        ),
    }
}

/// Branches other than `current`, in search order, tagged with `is_remote`.
fn other_branches(ctx: &Context<'_>, current: &str) -> Result<Vec<(String, bool)>> {
    let repo = ctx.repo();
    let trunk = ctx.git.trunk_branch(repo)?.filter(|t| t != current);

    let mut branches: Vec<(String, bool)> = Vec::new();
    if let Some(trunk) = &trunk {
        branches.push((trunk.clone(), false));
    }
    for branch in ctx.git.local_branches(repo)? {
        if branch != current && Some(&branch) != trunk.as_ref() {
            branches.push((branch, false));
        }
    }
    for branch in ctx.git.remote_branches(repo)? {
        branches.push((branch, true));
    }
    Ok(branches)
}

/// Parses every record in `branch`'s tree. Unreadable records are reported
/// and skipped.
fn read_branch_features(ctx: &Context<'_>, branch: &str) -> Result<Vec<Feature>> {
    let repo = ctx.repo();
    let files = match ctx.git.list_files_at(repo, branch, FEATURES_DIR) {
        Ok(files) => files,
        Err(e) => {
            ctx.reporter
                .warn(&format!("cannot list features on '{}': {}", branch, e));
            return Ok(Vec::new());
        }
    };

    let mut features = Vec::new();
    for path in files.iter().filter(|p| is_record_path(p)) {
        let location = format!("{}:{}", branch, path);
        let content = match ctx.git.read_file_at(repo, branch, path) {
            Ok(content) => content,
            Err(e) => {
                ctx.reporter
                    .warn(&format!("skipping record {}: {}", location, e));
                continue;
            }
        };
        match parse_record(Path::new(&location), &content) {
            Ok(feature) => features.push(feature),
            Err(e) => ctx.reporter.warn(&format!("skipping record: {}", e)),
        }
    }
    Ok(features)
}
