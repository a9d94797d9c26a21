//! Runtime facade over the ftrack workflows.
//!
//! [`Tracker`] owns the configuration, the tool adapters, the feature store
//! and the reporter, and exposes each workflow as a method. The CLI and the
//! integration tests drive the same surface.

use crate::config::FtrackConfig;
use crate::error::{FtrackError, Result};
use crate::model::{CrossBranchFeature, Feature};
use crate::report::{Reporter, TracingReporter};
use crate::state::active_feature;
use crate::store::{FeatureFilter, FeatureStore, FileFeatureStore};
use crate::tools::ToolRegistry;
use crate::workflows::{
    self, AbortResult, CommitOptions, CommitReport, Context, CreatedFeature, MergeOptions,
    MergeResult, NewFeature, SwitchResult,
};
use std::path::Path;

/// Feature tracker bound to one repository.
///
/// # Examples
///
/// ```no_run
/// use ftrack_core::{FtrackConfig, Tracker};
/// use ftrack_core::workflows::NewFeature;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = Tracker::new(FtrackConfig::new(PathBuf::from("/path/to/repo")));
/// tracker.init_project()?;
/// let created = tracker.new_feature(NewFeature {
///     name: "Login flow".to_string(),
///     ..NewFeature::default()
/// })?;
/// println!("created {} on {:?}", created.feature.id, created.branch);
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    pub config: FtrackConfig,
    pub tools: ToolRegistry,
    store: Box<dyn FeatureStore>,
    reporter: Box<dyn Reporter>,
}

impl Tracker {
    /// Creates a tracker with the standard adapters, reporting via `tracing`.
    pub fn new(config: FtrackConfig) -> Self {
        Self::with_parts(config, ToolRegistry::standard(), Box::new(TracingReporter))
    }

    /// Creates a tracker from explicit parts.
    pub fn with_parts(
        config: FtrackConfig,
        tools: ToolRegistry,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        let store = FileFeatureStore::new(config.features_dir.clone(), tools.fs.clone());
        Self {
            config,
            tools,
            store: Box::new(store),
            reporter,
        }
    }

    /// Finds the repository containing `start` and loads its configuration.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NotGitRepository` outside a repository, or a
    /// config error if `.ftrack/config.toml` is invalid.
    pub fn discover(start: &Path, reporter: Box<dyn Reporter>) -> Result<Self> {
        let tools = ToolRegistry::standard();
        let root = tools.git.repo_root(start)?;
        let config = FtrackConfig::load(root)?;
        tracing::debug!(root = %config.repo_root.display(), "loaded configuration");
        Ok(Self::with_parts(config, tools, reporter))
    }

    /// Collaborators for a workflow call.
    pub fn context(&self) -> Context<'_> {
        Context {
            config: &self.config,
            fs: self.tools.fs.as_ref(),
            git: self.tools.git.as_ref(),
            store: self.store.as_ref(),
            reporter: self.reporter.as_ref(),
        }
    }

    fn ready(&self) -> Result<Context<'_>> {
        if !self.tools.fs.exists(&self.config.meta_dir) {
            return Err(FtrackError::NotInitialized);
        }
        Ok(self.context())
    }

    /// Creates `.ftrack/` with a default `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NotGitRepository` outside a repository and
    /// `FtrackError::AlreadyInitialized` if the config file exists.
    pub fn init_project(&self) -> Result<()> {
        workflows::init_project(&self.context())
    }

    /// Creates a feature, its branch when the workflow calls for one, and
    /// makes it active.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::InvalidFlags` for flag combinations the workflow
    /// mode rejects, `FtrackError::EmptyRepository` before the first commit
    /// and `FtrackError::BranchExists` if the derived branch is taken.
    pub fn new_feature(&self, request: NewFeature) -> Result<CreatedFeature> {
        workflows::create_feature(&self.ready()?, request)
    }

    /// Looks a feature up on the current branch.
    pub fn find(&self, identifier: &str) -> Result<Feature> {
        workflows::find(&self.ready()?, identifier)
    }

    /// Features on the current branch.
    pub fn list(&self, filter: FeatureFilter) -> Result<Vec<Feature>> {
        let ctx = self.ready()?;
        ctx.store.list(filter)
    }

    /// Features on every branch, one entry per ID.
    pub fn list_all_branches(&self, filter: FeatureFilter) -> Result<Vec<CrossBranchFeature>> {
        let entries = workflows::list_features_across_branches(&self.ready()?)?;
        Ok(entries
            .into_iter()
            .filter(|entry| filter.matches(&entry.feature))
            .collect())
    }

    /// Looks a feature up on any branch.
    pub fn show(&self, identifier: &str) -> Result<CrossBranchFeature> {
        workflows::find_across_branches(&self.ready()?, identifier)
    }

    /// The active feature, if one is set and still present.
    pub fn active(&self) -> Result<Option<Feature>> {
        let ctx = self.ready()?;
        let Some(id) = active_feature(ctx.fs, &self.config.active_file)? else {
            return Ok(None);
        };
        match ctx.store.get(&id) {
            Ok(feature) => Ok(Some(feature)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Makes a feature active and checks out its branch.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::RemoteOnlyFeature`, `FtrackError::FeatureClosed`
    /// or `FtrackError::UncommittedChanges`; see
    /// [`switch_feature`](workflows::switch_feature).
    pub fn switch(&self, identifier: &str) -> Result<SwitchResult> {
        workflows::switch_feature(&self.ready()?, identifier)
    }

    /// Commits pending work for every feature on the current branch.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NoActiveFeature` if no feature is bound to the
    /// branch and `FtrackError::MissingAuthor` without an author.
    pub fn commit(&self, options: CommitOptions) -> Result<CommitReport> {
        workflows::commit_shared_branch(&self.ready()?, options)
    }

    /// Closes the target features and merges their branch into the base.
    /// Conflicts are reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::MergeInProgress`, `FtrackError::TargetBranchMissing`
    /// or `FtrackError::UncommittedChanges` before anything is closed; see
    /// [`merge`](workflows::merge).
    pub fn merge(&self, options: MergeOptions) -> Result<MergeResult> {
        workflows::merge(&self.ready()?, options)
    }

    /// Finishes a merge that stopped on conflicts.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NoMergeInProgress`,
    /// `FtrackError::ConflictsRemaining` while paths are unresolved, and
    /// `FtrackError::MergeNotCompleted` if the merge was backed out by hand.
    pub fn merge_continue(&self) -> Result<MergeResult> {
        workflows::continue_merge(&self.ready()?)
    }

    /// Abandons a merge that stopped on conflicts and reopens its features.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::NoMergeInProgress` without a pending merge.
    pub fn merge_abort(&self) -> Result<AbortResult> {
        workflows::abort_merge(&self.ready()?)
    }

    /// Reopens a closed feature on the current branch.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::FeatureNotFound` if nothing matches.
    pub fn reopen(&self, identifier: &str) -> Result<Feature> {
        workflows::reopen_feature(&self.ready()?, identifier)
    }

    /// Records a relationship between two features and its inverse.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::UnknownRelationship` for unknown kinds and
    /// `FtrackError::RelationshipCycle` for self relations or dependency
    /// cycles.
    pub fn relate(&self, from: &str, kind: &str, to: &str) -> Result<(Feature, Feature)> {
        workflows::relate(&self.ready()?, from, kind, to)
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
