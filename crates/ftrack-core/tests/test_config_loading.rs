//! Integration tests for loading `.ftrack/config.toml`.

use ftrack_core::{BranchSource, FtrackConfig, FtrackError, WorkflowMode};
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) {
    fs::create_dir_all(dir.path().join(".ftrack")).unwrap();
    fs::write(dir.path().join(".ftrack/config.toml"), content).unwrap();
}

#[test]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();

    let config = FtrackConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert_eq!(config.workflow.mode, WorkflowMode::BranchPerFeature);
    assert_eq!(config.workflow.create_branch_from, BranchSource::Trunk);
    assert!(config.git.base_branch.is_none());
    assert!(!config.git.push_after_merge);
    assert_eq!(config.search.max_suggestions, 3);
    assert_eq!(config.features_dir, temp_dir.path().join(".ftrack/features"));
}

#[test]
fn test_load_full_file() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        r#"
[workflow]
mode = "trunk-based"
allow_shared_branches = true
create_branch_from = "current"

[git]
base_branch = "develop"
push_after_merge = true

[search]
suggestion_threshold = 0.8
max_suggestions = 5

[commit]
auto_link_files = true
"#,
    );

    let config = FtrackConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert_eq!(config.workflow.mode, WorkflowMode::TrunkBased);
    assert!(config.workflow.allow_shared_branches);
    assert_eq!(config.workflow.create_branch_from, BranchSource::Current);
    assert_eq!(config.git.base_branch.as_deref(), Some("develop"));
    assert!(config.git.push_after_merge);
    assert_eq!(config.search.suggestion_threshold, 0.8);
    assert_eq!(config.search.max_suggestions, 5);
    assert!(config.commit.auto_link_files);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[workflow]\nallow_shared_branches = true\n");

    let config = FtrackConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert!(config.workflow.allow_shared_branches);
    assert_eq!(config.workflow.mode, WorkflowMode::BranchPerFeature);
    assert_eq!(config.search.suggestion_threshold, 0.5);
}

#[test]
fn test_paths_in_file_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "features_dir = \"/elsewhere\"\n\n[workflow]\nmode = \"trunk-based\"\n",
    );

    let config = FtrackConfig::load(temp_dir.path().to_path_buf()).unwrap();

    // Paths always derive from the repository root
    assert_eq!(config.features_dir, temp_dir.path().join(".ftrack/features"));
    assert_eq!(config.workflow.mode, WorkflowMode::TrunkBased);
}

#[test]
fn test_malformed_toml_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[workflow\nmode = ");

    let result = FtrackConfig::load(temp_dir.path().to_path_buf());
    assert!(matches!(result, Err(FtrackError::ConfigParseError(_))));
}

#[test]
fn test_unknown_mode_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[workflow]\nmode = \"gitflow\"\n");

    let result = FtrackConfig::load(temp_dir.path().to_path_buf());
    assert!(matches!(result, Err(FtrackError::ConfigParseError(_))));
}

#[test]
fn test_out_of_range_values_fail() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[search]\nsuggestion_threshold = 2.0\n");
    assert!(matches!(
        FtrackConfig::load(temp_dir.path().to_path_buf()),
        Err(FtrackError::InvalidConfig(_))
    ));

    write_config(&temp_dir, "[search]\nmax_suggestions = 0\n");
    assert!(matches!(
        FtrackConfig::load(temp_dir.path().to_path_buf()),
        Err(FtrackError::InvalidConfig(_))
    ));
}

#[test]
fn test_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = FtrackConfig::new(temp_dir.path().to_path_buf());
    config.git.base_branch = Some("trunk".to_string());
    config.workflow.create_branch_from = BranchSource::Warn;
    config.save().unwrap();

    let loaded = FtrackConfig::load(temp_dir.path().to_path_buf()).unwrap();
    assert_eq!(loaded.git.base_branch.as_deref(), Some("trunk"));
    assert_eq!(loaded.workflow.create_branch_from, BranchSource::Warn);
}
