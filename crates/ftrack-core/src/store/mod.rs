//! Feature record storage.
//!
//! Records are TOML documents, one per feature, named `<id>.toml` under the
//! features directory. The same parser reads records from the working tree
//! and from other branches' trees.

pub mod file_store;

pub use file_store::FileFeatureStore;

use crate::error::{FtrackError, Result};
use crate::model::{Feature, FeatureState};
use std::path::Path;

/// Extension of record files.
pub const RECORD_EXT: &str = "toml";

/// Selection applied by [`FeatureStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureFilter {
    #[default]
    All,
    /// Only features in exactly this derived state.
    State(FeatureState),
    /// Open and in-progress features.
    NotClosed,
}

impl FeatureFilter {
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            FeatureFilter::All => true,
            FeatureFilter::State(state) => feature.state() == *state,
            FeatureFilter::NotClosed => !feature.is_closed(),
        }
    }
}

/// CRUD over feature records in the current working tree.
pub trait FeatureStore: Send + Sync {
    /// Persists a new feature.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::FeatureAlreadyExists` if the ID is taken.
    fn create(&self, feature: &Feature) -> Result<()>;

    /// Loads a feature by ID.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::FeatureNotFound` if no record exists.
    fn get(&self, id: &str) -> Result<Feature>;

    /// Writes a feature, replacing any existing record with its ID.
    fn update(&self, feature: &Feature) -> Result<()>;

    /// Removes a feature record.
    fn delete(&self, id: &str) -> Result<()>;

    /// Lists features matching `filter`, ordered by ID.
    fn list(&self, filter: FeatureFilter) -> Result<Vec<Feature>>;
}

/// Parses one record document. `path` is only used for error messages.
pub fn parse_record(path: &Path, content: &str) -> Result<Feature> {
    toml::from_str(content).map_err(|e| FtrackError::CorruptedRecord {
        path: path.to_path_buf(),
        reason: e.message().to_string(),
    })
}

/// Serializes one record document.
pub fn render_record(feature: &Feature) -> Result<String> {
    toml::to_string(feature).map_err(|e| {
        FtrackError::FileWriteError(format!("cannot serialize feature {}: {}", feature.id, e))
    })
}

/// Returns `true` for paths that look like record files.
pub fn is_record_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext == RECORD_EXT)
}
