//! Project setup and feature lifecycle outside of commit and merge.

use crate::config::BranchSource;
use crate::error::{FtrackError, Result};
use crate::graph::{DEPENDS_ON, RelationshipGraph, inverse_kind};
use crate::model::Feature;
use crate::state::set_active_feature;
use crate::store::FeatureFilter;
use crate::workflows::Context;
use crate::workflows::branch::{decide_branch_action, handle_branch_creation};
use crate::workflows::discovery::find;

/// Contents of `.ftrack/.gitignore`: per-worktree state never committed.
pub const META_GITIGNORE: &str = "merge-state.toml\nactive-feature\n";

/// Request for [`create_feature`].
#[derive(Debug, Clone, Default)]
pub struct NewFeature {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,

    /// Bind to the current branch instead of creating one.
    pub same: bool,

    /// Always create a dedicated branch.
    pub isolate: bool,

    /// Overrides `workflow.create_branch_from`.
    pub from: Option<BranchSource>,
}

/// Outcome of [`create_feature`].
#[derive(Debug, Clone)]
pub struct CreatedFeature {
    pub feature: Feature,
    pub branch: Option<String>,
}

/// Sets up `.ftrack/` in the repository.
///
/// # Errors
///
/// Returns `FtrackError::NotGitRepository` outside a repository and
/// `FtrackError::AlreadyInitialized` if a config file already exists.
#[tracing::instrument(skip_all)]
pub fn init_project(ctx: &Context<'_>) -> Result<()> {
    let repo = ctx.repo();
    if !ctx.git.is_git_repo(repo) {
        return Err(FtrackError::NotGitRepository(repo.to_path_buf()));
    }
    if ctx.fs.exists(&ctx.config.config_file) {
        return Err(FtrackError::AlreadyInitialized);
    }

    ctx.fs
        .write(&ctx.config.config_file, &ctx.config.render()?)?;
    ctx.fs
        .write(&ctx.config.meta_dir.join(".gitignore"), META_GITIGNORE)?;
    ctx.fs.create_dir_all(&ctx.config.features_dir)?;

    tracing::info!(root = %repo.display(), "initialized ftrack");
    ctx.reporter.info(&format!(
        "initialized ftrack in {}",
        ctx.config.meta_dir.display()
    ));
    Ok(())
}

/// Creates a feature, its branch when the workflow calls for one, and makes
/// it the active feature.
///
/// Flags are validated before anything is written.
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub fn create_feature(ctx: &Context<'_>, request: NewFeature) -> Result<CreatedFeature> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(FtrackError::InvalidFlags(
            "feature name cannot be empty".to_string(),
        ));
    }

    let workflow = &ctx.config.workflow;
    let action = decide_branch_action(
        workflow.mode,
        workflow.allow_shared_branches,
        request.same,
        request.isolate,
    )?;

    let mut feature = Feature::new(name);
    feature.description = request.description;
    feature.tags = request.tags.into_iter().collect();

    let branch = handle_branch_creation(ctx, action, &feature.name, &feature.id, request.from)?;
    if let Some(branch) = &branch {
        feature.set_branch(branch.as_str());
    }

    let repo = ctx.repo();
    if ctx.git.is_git_repo(repo) {
        if let Some(identity) = ctx.git.user_identity(repo)? {
            feature.add_author(&identity);
        }
    }

    ctx.store.create(&feature)?;
    set_active_feature(ctx.fs, &ctx.config.active_file, &feature.id)?;

    tracing::info!(id = %feature.id, branch = ?branch, "created feature");
    ctx.reporter
        .info(&format!("created feature '{}' ({})", feature.name, feature.id));
    Ok(CreatedFeature { feature, branch })
}

/// Reopens a closed feature on the current branch.
pub fn reopen_feature(ctx: &Context<'_>, identifier: &str) -> Result<Feature> {
    let mut feature = find(ctx, identifier)?;
    if !feature.is_closed() {
        ctx.reporter
            .info(&format!("feature '{}' is not closed", feature.name));
        return Ok(feature);
    }

    feature.reopen();
    ctx.store.update(&feature)?;
    tracing::info!(id = %feature.id, "reopened feature");
    Ok(feature)
}

/// Records `from -kind-> to` and its inverse on `to`.
///
/// Returns both features as saved.
///
/// # Errors
///
/// Returns `FtrackError::UnknownRelationship` for unknown kinds and
/// `FtrackError::RelationshipCycle` for self relations or dependency cycles.
/// Failing to save the inverse is only a warning.
#[tracing::instrument(skip_all, fields(kind = kind))]
pub fn relate(ctx: &Context<'_>, from: &str, kind: &str, to: &str) -> Result<(Feature, Feature)> {
    let inverse = inverse_kind(kind)?;
    let mut source = find(ctx, from)?;
    let mut target = find(ctx, to)?;

    let graph = RelationshipGraph::from_features(&ctx.store.list(FeatureFilter::All)?);
    let cyclic = if kind == DEPENDS_ON {
        graph.would_create_cycle(&source.id, DEPENDS_ON, &target.id)
    } else if inverse == DEPENDS_ON {
        graph.would_create_cycle(&target.id, DEPENDS_ON, &source.id)
    } else {
        source.id == target.id
    };
    if cyclic {
        return Err(FtrackError::RelationshipCycle {
            from: source.id,
            kind: kind.to_string(),
            to: target.id,
        });
    }

    if !source.add_relationship(kind, &target.id) {
        ctx.reporter.info(&format!(
            "'{}' already {} '{}'",
            source.name, kind, target.name
        ));
    }
    ctx.store.update(&source)?;

    target.add_relationship(inverse, &source.id);
    if let Err(e) = ctx.store.update(&target) {
        ctx.reporter.warn(&format!(
            "saved {} on '{}' but not the inverse on '{}': {}",
            kind, source.name, target.name, e
        ));
    }

    Ok((source, target))
}
