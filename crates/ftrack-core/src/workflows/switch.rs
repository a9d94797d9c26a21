//! Switch the working context to a feature.

use crate::config::WorkflowMode;
use crate::error::{FtrackError, Result};
use crate::model::Feature;
use crate::state::set_active_feature;
use crate::workflows::Context;
use crate::workflows::branch::derive_branch_name;
use crate::workflows::discovery::{find, find_across_branches};

/// Outcome of [`switch_feature`].
#[derive(Debug, Clone)]
pub struct SwitchResult {
    pub feature: Feature,

    /// Branch the feature lives on; `None` in trunk-based mode.
    pub branch: Option<String>,

    /// A checkout happened.
    pub checked_out: bool,

    /// The branch did not exist and was created.
    pub created: bool,
}

/// Makes `identifier` the active feature, checking out its branch in
/// branch-per-feature mode.
///
/// The feature is looked up on the current branch first, then on every
/// other branch.
///
/// # Errors
///
/// Returns:
/// - `FtrackError::RemoteOnlyFeature` if the feature only exists on a remote branch
/// - `FtrackError::FeatureClosed` if the feature is closed
/// - `FtrackError::UncommittedChanges` if a checkout is needed and the tree is dirty
#[tracing::instrument(skip_all, fields(identifier = identifier))]
pub fn switch_feature(ctx: &Context<'_>, identifier: &str) -> Result<SwitchResult> {
    let repo = ctx.repo();

    let feature = match find(ctx, identifier) {
        Ok(feature) => feature,
        Err(e) if e.is_not_found() => {
            let found = find_across_branches(ctx, identifier)?;
            if found.is_remote {
                return Err(FtrackError::RemoteOnlyFeature {
                    name: found.feature.name,
                    branch: found.branch,
                });
            }
            found.feature
        }
        Err(e) => return Err(e),
    };

    if feature.is_closed() {
        return Err(FtrackError::FeatureClosed(feature.name));
    }

    if ctx.config.workflow.mode == WorkflowMode::TrunkBased {
        set_active_feature(ctx.fs, &ctx.config.active_file, &feature.id)?;
        ctx.reporter
            .info(&format!("active feature is now '{}'", feature.name));
        return Ok(SwitchResult {
            feature,
            branch: None,
            checked_out: false,
            created: false,
        });
    }

    let branch = feature
        .branch()
        .map(str::to_string)
        .unwrap_or_else(|| derive_branch_name(&feature.name, &feature.id));

    let current = ctx.git.current_branch(repo)?;
    if current == branch {
        set_active_feature(ctx.fs, &ctx.config.active_file, &feature.id)?;
        ctx.reporter
            .info(&format!("already on '{}'", branch));
        return Ok(SwitchResult {
            feature,
            branch: Some(branch),
            checked_out: false,
            created: false,
        });
    }

    if ctx.git.has_uncommitted_changes(repo)? {
        return Err(FtrackError::UncommittedChanges);
    }

    let created = !ctx.git.branch_exists(repo, &branch)?;
    if created {
        ctx.git.create_branch(repo, &branch)?;
    }
    ctx.git.checkout(repo, &branch)?;
    set_active_feature(ctx.fs, &ctx.config.active_file, &feature.id)?;

    tracing::info!(feature = %feature.id, branch = %branch, created, "switched feature");
    ctx.reporter
        .info(&format!("switched to '{}' on branch '{}'", feature.name, branch));

    Ok(SwitchResult {
        feature,
        branch: Some(branch),
        checked_out: true,
        created,
    })
}
