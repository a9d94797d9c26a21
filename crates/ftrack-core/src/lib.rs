//! ftrack core - feature tracking metadata layered on a git repository.
//!
//! Each unit of work is a feature record stored under `.ftrack/features/`
//! next to the code, so records travel with branches and merges. This crate
//! implements the branch lifecycle around those records: creating feature
//! branches, committing on behalf of every feature sharing a branch, and a
//! merge workflow that survives conflicts across invocations.
//!
//! # Architecture
//!
//! - [`error`]: Error types and result type alias
//! - [`config`]: Repository layout and `config.toml` settings
//! - [`model`]: Feature records and their derived lifecycle state
//! - [`store`]: Feature record persistence in the working tree
//! - [`state`]: Merge state and active-feature context between invocations
//! - [`graph`]: Relationship graph used for cycle and close checks
//! - [`suggest`]: Name suggestions for failed lookups
//! - [`report`]: User-facing message sink injected into workflows
//! - [`tools`]: File system and git adapter traits with real and mock implementations
//! - [`workflows`]: The branch, discovery, commit, merge and switch workflows
//! - [`runtime`]: [`Tracker`], a facade owning all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use ftrack_core::{FtrackConfig, Tracker};
//! use ftrack_core::workflows::{MergeOptions, NewFeature};
//! use std::path::PathBuf;
//!
//! let tracker = Tracker::new(FtrackConfig::new(PathBuf::from("/path/to/repo")));
//! tracker.init_project()?;
//! tracker.new_feature(NewFeature { name: "Login".into(), ..Default::default() })?;
//! // ... work and commit ...
//! let result = tracker.merge(MergeOptions::default())?;
//! if result.conflict_detected {
//!     // resolve, `git add`, then:
//!     tracker.merge_continue()?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod report;
pub mod runtime;
pub mod state;
pub mod store;
pub mod suggest;
pub mod tools;
pub mod workflows;

// Re-export core types for convenience
pub use config::{BranchSource, FtrackConfig, WorkflowMode};
pub use error::{FtrackError, Result};
pub use model::{CrossBranchFeature, Feature, FeatureState, FeatureVersion};
pub use report::{Reporter, TracingReporter};
pub use runtime::Tracker;
pub use state::MergeState;
pub use store::FeatureFilter;
pub use tools::ToolRegistry;
