//! Shared helpers for the ftrack-core integration tests.
//!
//! Every test gets its own temporary git repository with one commit and an
//! initialized, committed `.ftrack/` directory.

#![allow(dead_code)]

use ftrack_core::report::RecordingReporter;
use ftrack_core::{FtrackConfig, ToolRegistry, Tracker};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    pub reporter: Arc<RecordingReporter>,
}

impl TestRepo {
    /// Repository whose trunk is `main`.
    pub fn new() -> Self {
        Self::with_trunk("main")
    }

    pub fn with_trunk(trunk: &str) -> Self {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q", "-b", trunk]);
        git(dir.path(), &["config", "user.name", "Test User"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["config", "commit.gpgsign", "false"]);

        // Create initial commit
        fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        git(dir.path(), &["add", "README.md"]);
        git(dir.path(), &["commit", "-q", "-m", "Initial commit"]);

        let repo = Self {
            dir,
            reporter: Arc::new(RecordingReporter::new()),
        };
        repo.tracker().init_project().unwrap();
        repo.git(&["add", ".ftrack"]);
        repo.git(&["commit", "-q", "-m", "Initialize ftrack"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A tracker over the real adapters, configured from disk.
    pub fn tracker(&self) -> Tracker {
        let config = FtrackConfig::load(self.path().to_path_buf()).unwrap();
        self.tracker_with(config)
    }

    pub fn tracker_with(&self, config: FtrackConfig) -> Tracker {
        Tracker::with_parts(
            config,
            ToolRegistry::standard(),
            Box::new(self.reporter.clone()),
        )
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(self.path(), args)
    }

    pub fn current_branch(&self) -> String {
        self.git(&["branch", "--show-current"])
    }

    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).unwrap();
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).unwrap()
    }

    /// Commits everything in the working tree directly with git.
    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}
