//! Workflow modules for ftrack.
//!
//! - `branch`: branch policy decisions and feature branch creation
//! - `discovery`: locating features across local, trunk and remote branches
//! - `commit`: committing work for every feature sharing the current branch
//! - `merge`: closing features and merging their branch, with recovery
//! - `switch`: moving the working context to a feature
//! - `lifecycle`: project init, feature creation, reopen and relationships

pub mod branch;
pub mod commit;
pub mod discovery;
pub mod lifecycle;
pub mod merge;
pub mod switch;

pub use branch::{BranchAction, decide_branch_action, derive_branch_name, handle_branch_creation};
pub use commit::{CommitOptions, CommitReport, commit_shared_branch};
pub use discovery::{
    find, find_across_branches, find_all_for_branch, list_features_across_branches,
};
pub use lifecycle::{
    CreatedFeature, NewFeature, create_feature, init_project, relate, reopen_feature,
};
pub use merge::{AbortResult, MergeOptions, MergeResult, abort_merge, continue_merge, merge};
pub use switch::{SwitchResult, switch_feature};

use crate::config::FtrackConfig;
use crate::report::Reporter;
use crate::store::FeatureStore;
use crate::tools::fs::FsAdapter;
use crate::tools::git::GitAdapter;
use std::path::Path;

/// Collaborators handed to every workflow.
///
/// Nothing here outlives a single invocation; durable state lives in files
/// reached through `fs`.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub config: &'a FtrackConfig,
    pub fs: &'a dyn FsAdapter,
    pub git: &'a dyn GitAdapter,
    pub store: &'a dyn FeatureStore,
    pub reporter: &'a dyn Reporter,
}

impl<'a> Context<'a> {
    pub fn repo(&self) -> &'a Path {
        &self.config.repo_root
    }
}
