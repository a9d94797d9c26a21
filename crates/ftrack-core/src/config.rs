//! Configuration types for ftrack.
//!
//! Paths are always derived from the repository root; only the behavioral
//! sections are read from `.ftrack/config.toml`.

use crate::error::{FtrackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Name of the metadata root directory.
pub const META_DIR: &str = ".ftrack";

/// Directory holding feature records, relative to the repository root.
pub const FEATURES_DIR: &str = ".ftrack/features";

/// Main ftrack configuration.
#[derive(Debug, Clone)]
pub struct FtrackConfig {
    /// Repository root directory (absolute path).
    pub repo_root: PathBuf,

    /// Metadata root (`.ftrack`).
    pub meta_dir: PathBuf,

    /// Feature record directory (`.ftrack/features`).
    pub features_dir: PathBuf,

    /// Configuration file (`.ftrack/config.toml`).
    pub config_file: PathBuf,

    /// Pending merge state (`.ftrack/merge-state.toml`).
    pub merge_state_file: PathBuf,

    /// Active feature context (`.ftrack/active-feature`).
    pub active_file: PathBuf,

    /// Branching workflow settings.
    pub workflow: WorkflowConfig,

    /// Git-related settings.
    pub git: GitConfig,

    /// Lookup suggestion settings.
    pub search: SearchConfig,

    /// Commit behavior settings.
    pub commit: CommitConfig,
}

impl FtrackConfig {
    /// Creates a configuration with defaults for the given repository root.
    pub fn new(repo_root: PathBuf) -> Self {
        let meta_dir = repo_root.join(META_DIR);
        Self {
            features_dir: repo_root.join(FEATURES_DIR),
            config_file: meta_dir.join("config.toml"),
            merge_state_file: meta_dir.join("merge-state.toml"),
            active_file: meta_dir.join("active-feature"),
            meta_dir,
            repo_root,
            workflow: WorkflowConfig::default(),
            git: GitConfig::default(),
            search: SearchConfig::default(),
            commit: CommitConfig::default(),
        }
    }

    /// Loads configuration from `.ftrack/config.toml`, falling back to
    /// defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FtrackError::ConfigParseError` for malformed TOML or unknown
    /// values, and `FtrackError::InvalidConfig` when values are out of range.
    pub fn load(repo_root: PathBuf) -> Result<Self> {
        let mut config = Self::new(repo_root);
        if !config.config_file.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config.config_file).map_err(|e| {
            FtrackError::FileReadError(format!("{}: {}", config.config_file.display(), e))
        })?;
        let file: ConfigFile =
            toml::from_str(&content).map_err(|e| FtrackError::ConfigParseError(e.to_string()))?;

        config.workflow = file.workflow;
        config.git = file.git;
        config.search = file.search;
        config.commit = file.commit;
        config.validate()?;
        Ok(config)
    }

    /// Renders the behavioral sections as a `config.toml` document.
    pub fn render(&self) -> Result<String> {
        let file = ConfigFile {
            workflow: self.workflow.clone(),
            git: self.git.clone(),
            search: self.search.clone(),
            commit: self.commit.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| FtrackError::InvalidConfig(e.to_string()))
    }

    /// Writes the behavioral sections to `.ftrack/config.toml`.
    pub fn save(&self) -> Result<()> {
        let content = self.render()?;
        std::fs::create_dir_all(&self.meta_dir)
            .map_err(|e| FtrackError::FileWriteError(format!("{}: {}", self.meta_dir.display(), e)))?;
        std::fs::write(&self.config_file, content).map_err(|e| {
            FtrackError::FileWriteError(format!("{}: {}", self.config_file.display(), e))
        })
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.search.suggestion_threshold) {
            return Err(FtrackError::InvalidConfig(format!(
                "search.suggestion_threshold must be between 0 and 1, got {}",
                self.search.suggestion_threshold
            )));
        }
        if self.search.max_suggestions == 0 {
            return Err(FtrackError::InvalidConfig(
                "search.max_suggestions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// On-disk shape of `config.toml`. Unknown keys (including stale path
/// values) are ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    workflow: WorkflowConfig,
    #[serde(default)]
    git: GitConfig,
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    commit: CommitConfig,
}

/// How features map onto branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowMode {
    /// All features share the trunk branch.
    TrunkBased,
    /// Each feature gets a dedicated branch.
    #[default]
    BranchPerFeature,
}

impl WorkflowMode {
    /// Returns the config-file spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowMode::TrunkBased => "trunk-based",
            WorkflowMode::BranchPerFeature => "branch-per-feature",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a new feature branch starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSource {
    /// Switch to the base branch before branching.
    #[default]
    Trunk,
    /// Branch from the current branch, warning when it is not trunk.
    Warn,
    /// Branch from the current branch silently.
    Current,
}

impl FromStr for BranchSource {
    type Err = FtrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trunk" => Ok(BranchSource::Trunk),
            "warn" => Ok(BranchSource::Warn),
            "current" => Ok(BranchSource::Current),
            other => Err(FtrackError::InvalidConfig(format!(
                "invalid branch source '{}' (expected trunk, warn or current)",
                other
            ))),
        }
    }
}

/// Branching workflow settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Workflow mode.
    pub mode: WorkflowMode,

    /// Whether several features may share one branch (`--same`).
    pub allow_shared_branches: bool,

    /// Start point for new feature branches.
    pub create_branch_from: BranchSource,
}

/// Git-related settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Explicit merge base branch. Detected from the repository when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,

    /// Push the base branch after a successful merge.
    pub push_after_merge: bool,
}

/// Lookup suggestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum similarity (0..=1) for a name to be suggested.
    pub suggestion_threshold: f64,

    /// Maximum number of suggestions returned.
    pub max_suggestions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            suggestion_threshold: 0.5,
            max_suggestions: 3,
        }
    }
}

/// Commit behavior settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Link newly changed files to the primary feature on commit.
    pub auto_link_files: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FtrackConfig::new(PathBuf::from("/repo"));
        assert_eq!(config.features_dir, PathBuf::from("/repo/.ftrack/features"));
        assert_eq!(
            config.merge_state_file,
            PathBuf::from("/repo/.ftrack/merge-state.toml")
        );
        assert_eq!(config.workflow.mode, WorkflowMode::BranchPerFeature);
        assert_eq!(config.workflow.create_branch_from, BranchSource::Trunk);
        assert!(!config.workflow.allow_shared_branches);
        assert!(config.git.base_branch.is_none());
    }

    #[test]
    fn test_mode_spelling() {
        let parsed: WorkflowConfig = toml::from_str("mode = \"trunk-based\"").unwrap();
        assert_eq!(parsed.mode, WorkflowMode::TrunkBased);
        assert_eq!(WorkflowMode::BranchPerFeature.to_string(), "branch-per-feature");
    }

    #[test]
    fn test_branch_source_from_str() {
        assert_eq!("warn".parse::<BranchSource>().unwrap(), BranchSource::Warn);
        assert!("elsewhere".parse::<BranchSource>().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = FtrackConfig::new(PathBuf::from("/repo"));
        config.search.suggestion_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(FtrackError::InvalidConfig(_))
        ));
    }
}
