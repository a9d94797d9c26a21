//! Branch policy and feature branch creation.
//!
//! [`decide_branch_action`] is a pure function of the workflow mode and the
//! `--same` / `--isolate` flags. [`handle_branch_creation`] carries out the
//! decision against the repository.

use crate::config::{BranchSource, WorkflowMode};
use crate::error::{FtrackError, Result};
use crate::tools::git::is_trunk_name;
use crate::workflows::Context;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Prefix for derived feature branch names.
pub const BRANCH_PREFIX: &str = "feature/";

/// Maximum length of the slug part of a branch name, in characters.
pub const MAX_SLUG_LEN: usize = 240;

/// Branch used when neither config nor repository names a base branch.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// What to do with branches when a feature is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchAction {
    /// Leave branches alone (trunk-based mode).
    None,
    /// Bind the feature to the current branch.
    Stay,
    /// Create and check out a dedicated branch.
    Create,
}

/// Maps the workflow mode and flags to a branch action.
///
/// # Errors
///
/// Returns `FtrackError::InvalidFlags` when `same` and `isolate` are both
/// set, when either flag is used in trunk-based mode, or when `same` is used
/// without `workflow.allow_shared_branches`.
pub fn decide_branch_action(
    mode: WorkflowMode,
    allow_shared: bool,
    same: bool,
    isolate: bool,
) -> Result<BranchAction> {
    if same && isolate {
        return Err(FtrackError::InvalidFlags(
            "cannot use --same and --isolate together".to_string(),
        ));
    }

    match mode {
        WorkflowMode::TrunkBased if same || isolate => Err(FtrackError::InvalidFlags(
            "--same and --isolate require workflow.mode = \"branch-per-feature\"".to_string(),
        )),
        WorkflowMode::TrunkBased => Ok(BranchAction::None),
        WorkflowMode::BranchPerFeature if same && !allow_shared => {
            Err(FtrackError::InvalidFlags(
                "--same requires workflow.allow_shared_branches = true".to_string(),
            ))
        }
        WorkflowMode::BranchPerFeature if same => Ok(BranchAction::Stay),
        WorkflowMode::BranchPerFeature => Ok(BranchAction::Create),
    }
}

/// Turns a feature name into a branch-safe slug.
///
/// Accents are folded to their base letters, everything but letters, digits
/// and `/` becomes a single `-`, and the result is lower-cased and capped at
/// [`MAX_SLUG_LEN`] characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() && !slug.ends_with('/') {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c == '/' {
            if !slug.is_empty() && !slug.ends_with('/') {
                slug.push('/');
            }
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }

    let capped: String = slug.chars().take(MAX_SLUG_LEN).collect();
    capped.trim_end_matches(['-', '/']).to_string()
}

/// Branch name for a feature: `feature/<slug>`, or `feature/<id>` when the
/// name has nothing slug-worthy in it.
pub fn derive_branch_name(name: &str, id: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        format!("{}{}", BRANCH_PREFIX, id)
    } else {
        format!("{}{}", BRANCH_PREFIX, slug)
    }
}

/// Resolves the merge/branching base: `explicit`, then `git.base_branch`,
/// then the detected trunk branch, then `main`.
pub fn resolve_base_branch(ctx: &Context<'_>, explicit: Option<&str>) -> Result<String> {
    if let Some(base) = explicit.or(ctx.config.git.base_branch.as_deref()) {
        return Ok(base.to_string());
    }
    Ok(ctx
        .git
        .trunk_branch(ctx.repo())?
        .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()))
}

/// Executes a branch action for a new feature.
///
/// Returns the branch the feature should be bound to, or `None` when no
/// branch applies.
///
/// # Errors
///
/// Returns:
/// - `FtrackError::NotGitRepository` for [`BranchAction::Stay`] outside a repository
/// - `FtrackError::EmptyRepository` when there is no commit to branch from
/// - `FtrackError::BranchExists` when the derived branch is already taken
/// - `FtrackError::TargetBranchMissing` when branching from a base that does not exist
#[tracing::instrument(skip_all, fields(action = ?action, feature = feature_name))]
pub fn handle_branch_creation(
    ctx: &Context<'_>,
    action: BranchAction,
    feature_name: &str,
    feature_id: &str,
    from: Option<BranchSource>,
) -> Result<Option<String>> {
    let repo = ctx.repo();

    match action {
        BranchAction::None => Ok(None),
        BranchAction::Stay => {
            if !ctx.git.is_git_repo(repo) {
                return Err(FtrackError::NotGitRepository(repo.to_path_buf()));
            }
            let current = ctx.git.current_branch(repo)?;
            ctx.reporter
                .info(&format!("using current branch '{}'", current));
            Ok(Some(current))
        }
        BranchAction::Create => {
            if !ctx.git.is_git_repo(repo) {
                ctx.reporter
                    .warn("not inside a git repository - skipping branch creation");
                return Ok(None);
            }
            if !ctx.git.has_commits(repo)? {
                return Err(FtrackError::EmptyRepository);
            }

            let branch = derive_branch_name(feature_name, feature_id);
            if ctx.git.branch_exists(repo, &branch)? {
                return Err(FtrackError::BranchExists(branch));
            }

            let current = ctx.git.current_branch(repo)?;
            match from.unwrap_or(ctx.config.workflow.create_branch_from) {
                BranchSource::Trunk => {
                    let base = resolve_base_branch(ctx, None)?;
                    if current != base {
                        if !ctx.git.branch_exists(repo, &base)? {
                            return Err(FtrackError::TargetBranchMissing(base));
                        }
                        tracing::debug!(base = %base, "switching to base before branching");
                        ctx.git.checkout(repo, &base)?;
                    }
                }
                BranchSource::Warn => {
                    if !is_trunk_name(&current) {
                        ctx.reporter.warn(&format!(
                            "creating '{}' from '{}', which is not a trunk branch",
                            branch, current
                        ));
                    }
                }
                BranchSource::Current => {}
            }

            ctx.git.create_branch(repo, &branch)?;
            ctx.git.checkout(repo, &branch)?;
            tracing::info!(branch = %branch, "created feature branch");
            ctx.reporter
                .info(&format!("created and switched to branch '{}'", branch));
            Ok(Some(branch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::git::GitAdapter;
    use crate::workflows::testing::Harness;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_policy_table() {
        use BranchAction::{Create, Stay};
        use WorkflowMode::*;

        // (mode, same, isolate, allow_shared, expected)
        let cases = [
            (TrunkBased, true, true, false, Err(())),
            (TrunkBased, true, true, true, Err(())),
            (BranchPerFeature, true, true, true, Err(())),
            (TrunkBased, true, false, true, Err(())),
            (TrunkBased, false, true, false, Err(())),
            (TrunkBased, false, false, false, Ok(BranchAction::None)),
            (TrunkBased, false, false, true, Ok(BranchAction::None)),
            (BranchPerFeature, true, false, false, Err(())),
            (BranchPerFeature, true, false, true, Ok(Stay)),
            (BranchPerFeature, false, false, false, Ok(Create)),
            (BranchPerFeature, false, true, false, Ok(Create)),
            (BranchPerFeature, false, true, true, Ok(Create)),
        ];

        for (mode, same, isolate, allow_shared, expected) in cases {
            let actual = decide_branch_action(mode, allow_shared, same, isolate);
            match expected {
                Ok(action) => assert_eq!(
                    actual.unwrap(),
                    action,
                    "{mode} same={same} isolate={isolate} shared={allow_shared}"
                ),
                Err(()) => assert!(
                    matches!(actual, Err(FtrackError::InvalidFlags(_))),
                    "{mode} same={same} isolate={isolate} shared={allow_shared}"
                ),
            }
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Login Flow"), "login-flow");
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("  api/v2 -- Endpoints! "), "api/v2-endpoints");
        assert_eq!(slugify("a - /b//c/"), "a/b/c");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slug_is_capped() {
        let name = "x".repeat(500);
        assert_eq!(slugify(&name).chars().count(), MAX_SLUG_LEN);

        let dashed = format!("{}-tail", "y".repeat(MAX_SLUG_LEN - 1));
        assert_eq!(slugify(&dashed), "y".repeat(MAX_SLUG_LEN - 1));
    }

    #[test]
    fn test_derive_branch_name_falls_back_to_id() {
        assert_eq!(derive_branch_name("Login", "abc"), "feature/login");
        assert_eq!(derive_branch_name("???", "abc"), "feature/abc");
    }

    #[test]
    fn test_create_from_trunk_switches_to_base_first() {
        let h = Harness::new();
        h.git.put_file("main", "README.md", "hi");
        h.git.set_current("feature/old");

        let branch = handle_branch_creation(&h.ctx(), BranchAction::Create, "Login", "id1", None)
            .unwrap();

        assert_eq!(branch.as_deref(), Some("feature/login"));
        let repo = Path::new(crate::workflows::testing::ROOT);
        assert_eq!(h.git.current_branch(repo).unwrap(), "feature/login");
        assert_eq!(
            h.git.read_file_at(repo, "feature/login", "README.md").unwrap(),
            "hi"
        );
    }

    #[test]
    fn test_warn_strategy_warns_off_trunk() {
        let h = Harness::new();
        h.git.set_current("feature/old");

        handle_branch_creation(
            &h.ctx(),
            BranchAction::Create,
            "Login",
            "id1",
            Some(BranchSource::Warn),
        )
        .unwrap();

        assert_eq!(h.reporter.warnings().len(), 1);
        assert!(h.reporter.warnings()[0].contains("feature/old"));
    }

    #[test]
    fn test_create_outside_repo_is_skipped() {
        let mut h = Harness::new();
        h.config = crate::config::FtrackConfig::new(PathBuf::from("/elsewhere"));

        let branch =
            handle_branch_creation(&h.ctx(), BranchAction::Create, "Login", "id1", None).unwrap();
        assert_eq!(branch, None);
        assert_eq!(h.reporter.warnings().len(), 1);

        assert!(matches!(
            handle_branch_creation(&h.ctx(), BranchAction::Stay, "Login", "id1", None),
            Err(FtrackError::NotGitRepository(_))
        ));
    }

    #[test]
    fn test_create_fatal_conditions() {
        let h = Harness::new();
        h.git.add_branch("feature/login");
        assert!(matches!(
            handle_branch_creation(&h.ctx(), BranchAction::Create, "Login", "id1", None),
            Err(FtrackError::BranchExists(b)) if b == "feature/login"
        ));

        h.git.set_empty();
        assert!(matches!(
            handle_branch_creation(&h.ctx(), BranchAction::Create, "Other", "id2", None),
            Err(FtrackError::EmptyRepository)
        ));
    }

    #[test]
    fn test_stay_reports_current_branch() {
        let h = Harness::new();
        h.git.set_current("feature/shared");
        let branch =
            handle_branch_creation(&h.ctx(), BranchAction::Stay, "Login", "id1", None).unwrap();
        assert_eq!(branch.as_deref(), Some("feature/shared"));
    }

    #[test]
    fn test_resolve_base_branch_order() {
        let mut h = Harness::new();
        assert_eq!(resolve_base_branch(&h.ctx(), None).unwrap(), "main");
        assert_eq!(
            resolve_base_branch(&h.ctx(), Some("develop")).unwrap(),
            "develop"
        );

        h.config.git.base_branch = Some("release".to_string());
        assert_eq!(resolve_base_branch(&h.ctx(), None).unwrap(), "release");

        h.config.git.base_branch = None;
        h.git.remove_branch("main");
        h.git.add_branch("master");
        assert_eq!(resolve_base_branch(&h.ctx(), None).unwrap(), "master");

        h.git.remove_branch("master");
        assert_eq!(resolve_base_branch(&h.ctx(), None).unwrap(), "main");
    }
}
