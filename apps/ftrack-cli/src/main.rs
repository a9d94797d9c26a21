//! ftrack CLI - feature tracking on top of git.
//!
//! Thin command-line layer over [`ftrack_core::Tracker`]: parses arguments,
//! sets up logging and renders workflow outcomes with next-step hints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ftrack_core::workflows::{CommitOptions, MergeOptions, MergeResult, NewFeature};
use ftrack_core::{BranchSource, CrossBranchFeature, Feature, FeatureFilter, FeatureState, Reporter, Tracker};
use tracing::{error, info};

/// ftrack - feature tracking on top of git
///
/// Keeps a record per unit of work next to your code and ties it to git
/// branches, commits and merges.
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available ftrack commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize the repository for ftrack
    ///
    /// Creates .ftrack/ with a default config.toml and the features directory.
    Init,

    /// Create a feature (and its branch in branch-per-feature mode)
    New {
        /// Feature name
        name: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tag, may be repeated
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Share the current branch instead of creating one
        #[arg(long)]
        same: bool,

        /// Always create a dedicated branch
        #[arg(long)]
        isolate: bool,

        /// Where the new branch starts: trunk, warn or current
        #[arg(long)]
        from: Option<BranchSource>,
    },

    /// List features
    List {
        /// Include features from every local and remote branch
        #[arg(long)]
        all_branches: bool,

        /// Only features in this state: open, in-progress or closed
        #[arg(long)]
        state: Option<FeatureState>,
    },

    /// Show one feature, searching every branch
    Show {
        /// Feature ID or name
        feature: String,
    },

    /// Switch to a feature
    Switch {
        /// Feature ID or name
        feature: String,
    },

    /// Commit work for every feature on the current branch
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,

        /// Author as "Name <email>"
        #[arg(long)]
        author: Option<String>,

        /// Link changed files to the primary feature
        #[arg(long)]
        link_files: bool,
    },

    /// Close features and merge their branch
    Merge {
        /// Feature ID or name; defaults to the features on the current branch
        feature: Option<String>,

        /// Branch to merge into
        #[arg(long)]
        base: Option<String>,

        /// Keep the feature branch
        #[arg(long)]
        no_delete: bool,

        /// Squash merge
        #[arg(long)]
        squash: bool,

        /// Finish a merge after resolving conflicts
        #[arg(long = "continue", conflicts_with_all = ["abort", "feature", "base", "no_delete", "squash"])]
        continue_merge: bool,

        /// Abandon a conflicted merge and reopen its features
        #[arg(long, conflicts_with_all = ["feature", "base", "no_delete", "squash"])]
        abort: bool,
    },

    /// Reopen a closed feature
    Reopen {
        /// Feature ID or name
        feature: String,
    },

    /// Relate two features (depends-on, required-by, relates-to, duplicates, duplicated-by)
    Relate {
        /// Source feature ID or name
        from: String,

        /// Relationship kind
        kind: String,

        /// Target feature ID or name
        to: String,
    },
}

/// Prints progress to stdout and warnings to stderr.
struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("  {}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run_command(cli.command) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for structured logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("ftrack=debug,ftrack_core=debug")
    } else {
        EnvFilter::new("ftrack=info,ftrack_core=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<()> {
    let tracker = open_tracker()?;

    match command {
        Commands::Init => run_init(&tracker),
        Commands::New {
            name,
            description,
            tags,
            same,
            isolate,
            from,
        } => run_new(
            &tracker,
            NewFeature {
                name,
                description,
                tags,
                same,
                isolate,
                from,
            },
        ),
        Commands::List {
            all_branches,
            state,
        } => run_list(&tracker, all_branches, state),
        Commands::Show { feature } => run_show(&tracker, &feature),
        Commands::Switch { feature } => run_switch(&tracker, &feature),
        Commands::Commit {
            message,
            author,
            link_files,
        } => run_commit(
            &tracker,
            CommitOptions {
                message,
                author,
                link_files,
            },
        ),
        Commands::Merge {
            feature,
            base,
            no_delete,
            squash,
            continue_merge,
            abort,
        } => {
            if continue_merge {
                run_merge_continue(&tracker)
            } else if abort {
                run_merge_abort(&tracker)
            } else {
                run_merge(
                    &tracker,
                    MergeOptions {
                        feature,
                        base,
                        no_delete,
                        squash,
                    },
                )
            }
        }
        Commands::Reopen { feature } => run_reopen(&tracker, &feature),
        Commands::Relate { from, kind, to } => run_relate(&tracker, &from, &kind, &to),
    }
}

/// Locates the repository around the current directory and loads its config.
fn open_tracker() -> Result<Tracker> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let tracker = Tracker::discover(&current_dir, Box::new(ConsoleReporter))
        .context("Failed to find repository root - are you in a git repository?")?;
    info!("Repository root: {}", tracker.config.repo_root.display());
    Ok(tracker)
}

fn run_init(tracker: &Tracker) -> Result<()> {
    tracker
        .init_project()
        .context("Failed to initialize repository")?;

    println!("✔ Created .ftrack/ with default configuration");
    println!("\nNext steps:");
    println!("  git add .ftrack && git commit -m \"Initialize ftrack\"");
    println!("  ftrack new <name>    Create a feature");
    Ok(())
}

fn run_new(tracker: &Tracker, request: NewFeature) -> Result<()> {
    let created = tracker
        .new_feature(request)
        .context("Failed to create feature")?;

    println!(
        "✔ Created feature '{}' ({})",
        created.feature.name, created.feature.id
    );
    if let Some(branch) = &created.branch {
        println!("✔ On branch {}", branch);
    }
    println!("\nNext steps:");
    println!("  ftrack commit -m <message>    Commit your work");
    println!("  ftrack merge                  Close the feature and merge it");
    Ok(())
}

fn run_list(tracker: &Tracker, all_branches: bool, state: Option<FeatureState>) -> Result<()> {
    let filter = state.map(FeatureFilter::State).unwrap_or_default();

    if all_branches {
        let entries = tracker
            .list_all_branches(filter)
            .context("Failed to list features across branches")?;
        if entries.is_empty() {
            println!("No features found.");
        }
        for entry in &entries {
            let origin = if entry.is_remote { " (remote)" } else { "" };
            println!("{}  [{}{}]", summary_line(&entry.feature), entry.branch, origin);
        }
        return Ok(());
    }

    let features = tracker.list(filter).context("Failed to list features")?;
    if features.is_empty() {
        println!("No features found. Create one with `ftrack new <name>`.");
    }
    for feature in &features {
        println!("{}", summary_line(feature));
    }
    Ok(())
}

fn run_show(tracker: &Tracker, identifier: &str) -> Result<()> {
    let found = tracker
        .show(identifier)
        .context("Failed to look up feature")?;
    print_feature(&found);
    Ok(())
}

fn run_switch(tracker: &Tracker, identifier: &str) -> Result<()> {
    let result = tracker
        .switch(identifier)
        .context("Failed to switch feature")?;

    match (&result.branch, result.checked_out) {
        (Some(branch), true) if result.created => {
            println!("✔ Created and switched to branch {}", branch)
        }
        (Some(branch), true) => println!("✔ Switched to branch {}", branch),
        (Some(branch), false) => println!("✔ Already on branch {}", branch),
        (None, _) => {}
    }
    println!("✔ Active feature: {}", result.feature.name);
    Ok(())
}

fn run_commit(tracker: &Tracker, options: CommitOptions) -> Result<()> {
    let report = tracker.commit(options).context("Failed to commit")?;

    let names: Vec<&str> = report.features.iter().map(|f| f.name.as_str()).collect();
    if report.nothing_to_commit {
        println!("Nothing to commit for {}.", names.join(", "));
        return Ok(());
    }

    if let Some(commit) = &report.commit {
        println!("✔ Committed {}", short(commit));
    }
    println!("✔ Updated {}", names.join(", "));
    for path in &report.linked_files {
        println!("✔ Linked {}", path);
    }
    Ok(())
}

fn run_merge(tracker: &Tracker, options: MergeOptions) -> Result<()> {
    let result = tracker.merge(options).context("Failed to merge")?;
    print_merge(&result);
    Ok(())
}

fn run_merge_continue(tracker: &Tracker) -> Result<()> {
    let result = tracker
        .merge_continue()
        .context("Failed to continue merge")?;
    print_merge(&result);
    Ok(())
}

fn run_merge_abort(tracker: &Tracker) -> Result<()> {
    let result = tracker.merge_abort().context("Failed to abort merge")?;

    println!("✔ Aborted merge, back on {}", result.restored_branch);
    for feature in &result.reopened {
        println!("✔ Reopened {}", feature.name);
    }
    println!("\nThe reopened records are uncommitted; commit them when ready.");
    Ok(())
}

fn run_reopen(tracker: &Tracker, identifier: &str) -> Result<()> {
    let feature = tracker
        .reopen(identifier)
        .context("Failed to reopen feature")?;
    println!("✔ {} is {}", feature.name, feature.state());
    Ok(())
}

fn run_relate(tracker: &Tracker, from: &str, kind: &str, to: &str) -> Result<()> {
    let (source, target) = tracker
        .relate(from, kind, to)
        .context("Failed to relate features")?;
    println!("✔ {} {} {}", source.name, kind, target.name);
    Ok(())
}

fn print_merge(result: &MergeResult) {
    for feature in &result.closed_features {
        println!("✔ Closed {}", feature.name);
    }

    if result.conflict_detected {
        println!(
            "\nMerge of {} into {} stopped on conflicts:",
            result.feature_branch, result.base_branch
        );
        for path in &result.conflict_files {
            println!("  {}", path);
        }
        println!("\nNext steps:");
        println!("  resolve the conflicts, then `git add <files>`");
        println!("  ftrack merge --continue    Finish the merge");
        println!("  ftrack merge --abort       Abandon it and reopen the features");
        return;
    }

    if result.is_main_branch {
        println!("✔ Already on {} - no merge needed", result.feature_branch);
        return;
    }

    if result.merge_performed {
        println!(
            "✔ Merged {} into {}",
            result.feature_branch, result.base_branch
        );
    }
    if result.branch_deleted {
        println!("✔ Deleted branch {}", result.feature_branch);
    }
    if result.pushed {
        println!("✔ Pushed {}", result.base_branch);
    }
}

fn summary_line(feature: &Feature) -> String {
    format!(
        "{}  {:<11}  {}",
        short(&feature.id),
        feature.state().as_str(),
        feature.name
    )
}

fn print_feature(found: &CrossBranchFeature) {
    let feature = &found.feature;
    println!("{} ({})", feature.name, feature.id);
    println!("  state:    {}", feature.state());
    if let Some(branch) = feature.branch() {
        println!("  branch:   {}", branch);
    }
    let origin = if found.is_remote { " (remote)" } else { "" };
    println!("  found on: {}{}", found.branch, origin);
    println!("  modified: {}", feature.modified_at().to_rfc3339());
    if !feature.description.is_empty() {
        println!("  {}", feature.description);
    }
    if !feature.tags.is_empty() {
        let tags: Vec<&str> = feature.tags.iter().map(String::as_str).collect();
        println!("  tags:     {}", tags.join(", "));
    }
    for rel in &feature.relationships {
        println!("  {} {}", rel.kind, rel.target);
    }
    for path in &feature.files {
        println!("  file:     {}", path);
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
