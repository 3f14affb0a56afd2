//! relic command-line tool.
//!
//! Provides subcommands for initializing a repository, staging and
//! committing changes, inspecting status and history, diffing, merging,
//! and reading configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use console::Style;
use tracing_subscriber::EnvFilter;

use relic_core::diff::LineKind;
use relic_core::{ConfigKey, FileDiff, MergeOutcome, Repository, StageStatus};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// relic command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "relic",
    version,
    about = "Version control backed by a relational store"
)]
struct Cli {
    /// Directory to operate in (defaults to the current directory).
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new repository in the current directory.
    Init,

    /// Stage files as added or modified.
    Add {
        /// Paths relative to the repository root.
        paths: Vec<String>,
    },

    /// Stage file deletions.
    Rm {
        /// Paths relative to the repository root.
        paths: Vec<String>,
    },

    /// Remove paths from the staging index.
    Unstage {
        /// Paths relative to the repository root.
        paths: Vec<String>,
    },

    /// Show staged, modified, deleted, and untracked files.
    Status,

    /// Commit the staging index.
    Commit {
        /// Commit message.
        #[arg(short, long)]
        message: String,
    },

    /// Show commit history, newest first.
    Log {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Diff the working copy against HEAD.
    Diff {
        /// Restrict the diff to one path.
        path: Option<String>,
    },

    /// Print a file's content at a given commit.
    Show {
        /// Commit id.
        commit: String,
        /// Path relative to the repository root.
        path: String,
    },

    /// Merge a commit from the shared history into HEAD.
    Merge {
        /// Commit id to merge.
        commit: String,
    },

    /// Mark a conflicted path as resolved.
    Resolve {
        /// Path relative to the repository root.
        path: String,
    },

    /// Abort an in-progress merge and restore the working copy.
    Abort,

    /// Read or write configuration values.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print one value, or all values when no key is given.
    Get {
        /// Dotted key, e.g. user.name.
        key: Option<String>,
    },
    /// Set a value.
    Set {
        /// Dotted key, e.g. user.name.
        key: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Minimal logging for CLI; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", Style::new().red().apply_to("error:"), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    if let Commands::Init = cli.command {
        let repo = Repository::init(&dir).context("failed to initialize repository")?;
        println!(
            "Initialized empty relic repository in {}",
            repo.root().join(relic_core::RELIC_DIR).display()
        );
        return Ok(());
    }

    let mut repo = Repository::open(&dir).context("failed to open repository")?;
    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add { paths } => cmd_add(&repo, &paths),
        Commands::Rm { paths } => cmd_rm(&repo, &paths),
        Commands::Unstage { paths } => cmd_unstage(&repo, &paths),
        Commands::Status => cmd_status(&repo),
        Commands::Commit { message } => cmd_commit(&repo, &message),
        Commands::Log { limit } => cmd_log(&repo, limit),
        Commands::Diff { path } => cmd_diff(&repo, path.as_deref()),
        Commands::Show { commit, path } => cmd_show(&repo, &commit, &path),
        Commands::Merge { commit } => cmd_merge(&repo, &commit),
        Commands::Resolve { path } => cmd_resolve(&repo, &path),
        Commands::Abort => cmd_abort(&repo),
        Commands::Config { action } => cmd_config(&mut repo, action),
    }
}

// ---------------------------------------------------------------------------
// Styling helpers
// ---------------------------------------------------------------------------

fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

fn status_style(status: StageStatus) -> Style {
    match status {
        StageStatus::Added => Style::new().green(),
        StageStatus::Modified => Style::new().yellow(),
        StageStatus::Deleted => Style::new().red(),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_add(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }
    for path in paths {
        let status = repo
            .add(path)
            .with_context(|| format!("failed to stage '{path}'"))?;
        println!("{}", success(&format!("staged {path} ({status})")));
    }
    Ok(())
}

fn cmd_rm(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }
    for path in paths {
        repo.remove(path)
            .with_context(|| format!("failed to stage deletion of '{path}'"))?;
        println!("{}", success(&format!("staged deletion of {path}")));
    }
    Ok(())
}

fn cmd_unstage(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }
    for path in paths {
        repo.unstage(path)
            .with_context(|| format!("failed to unstage '{path}'"))?;
        println!("{}", success(&format!("unstaged {path}")));
    }
    Ok(())
}

fn cmd_status(repo: &Repository) -> Result<()> {
    let status = repo.status()?;

    if !status.conflicted.is_empty() {
        println!("{}", warn("merge in progress with unresolved conflicts:"));
        for path in &status.conflicted {
            println!("  {}", Style::new().red().apply_to(path));
        }
        println!();
    }

    if status.is_clean() {
        println!("nothing to commit, working copy clean");
        return Ok(());
    }

    if !status.staged.is_empty() {
        println!("Staged changes:");
        for (path, stage_status) in &status.staged {
            let styled = status_style(*stage_status).apply_to(format!("{stage_status}: {path}"));
            println!("  {styled}");
        }
        println!();
    }

    if !status.modified.is_empty() || !status.deleted.is_empty() {
        println!("Changes not staged:");
        for path in &status.modified {
            println!("  {}", Style::new().yellow().apply_to(format!("modified: {path}")));
        }
        for path in &status.deleted {
            println!("  {}", Style::new().red().apply_to(format!("deleted: {path}")));
        }
        println!();
    }

    if !status.untracked.is_empty() {
        println!("Untracked files:");
        for path in &status.untracked {
            println!("  {}", Style::new().dim().apply_to(path));
        }
    }
    Ok(())
}

fn cmd_commit(repo: &Repository, message: &str) -> Result<()> {
    let commit = repo.commit(message).context("commit failed")?;
    println!(
        "{}",
        success(&format!("[{}] {}", commit.short_id(), commit.summary()))
    );
    Ok(())
}

fn cmd_log(repo: &Repository, limit: usize) -> Result<()> {
    let commits = repo.log(limit)?;
    if commits.is_empty() {
        println!("no commits yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Commit", "Author", "Date", "Message"]);
    for commit in &commits {
        table.add_row(vec![
            Cell::new(commit.short_id()),
            Cell::new(&commit.author.name),
            Cell::new(
                commit
                    .committer
                    .timestamp
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            ),
            Cell::new(commit.summary()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn print_file_diff(file: &FileDiff) {
    println!(
        "{}",
        Style::new().bold().apply_to(format!("--- {}", file.path))
    );
    if file.is_binary {
        println!("  (binary content differs)");
        return;
    }
    for hunk in &file.hunks {
        println!("{}", Style::new().cyan().apply_to(hunk.header()));
        for line in &hunk.lines {
            let text = line.text.strip_suffix('\n').unwrap_or(&line.text);
            match line.kind {
                LineKind::Equal => println!(" {text}"),
                LineKind::Insert => {
                    println!("{}", Style::new().green().apply_to(format!("+{text}")))
                }
                LineKind::Delete => {
                    println!("{}", Style::new().red().apply_to(format!("-{text}")))
                }
            }
        }
    }
}

fn cmd_diff(repo: &Repository, path: Option<&str>) -> Result<()> {
    let diffs = repo.diff_workdir(path)?;
    if diffs.is_empty() {
        println!("no changes");
        return Ok(());
    }
    for file in &diffs {
        print_file_diff(file);
    }
    Ok(())
}

fn cmd_show(repo: &Repository, commit: &str, path: &str) -> Result<()> {
    let content = repo
        .file_at(commit, path)?
        .with_context(|| format!("'{path}' does not exist at commit {commit}"))?;
    match content.as_text() {
        Some(text) => print!("{text}"),
        None => anyhow::bail!("'{path}' is binary at commit {commit}"),
    }
    Ok(())
}

fn cmd_merge(repo: &Repository, commit: &str) -> Result<()> {
    match repo.merge(commit).context("merge failed")? {
        MergeOutcome::Completed(commit) => {
            println!(
                "{}",
                success(&format!(
                    "merge committed as [{}] {}",
                    commit.short_id(),
                    commit.summary()
                ))
            );
        }
        MergeOutcome::UpToDate => println!("already up to date"),
        MergeOutcome::Conflicted(paths) => {
            println!("{}", warn(&format!("{} conflicted path(s):", paths.len())));
            for path in &paths {
                println!("  {}", Style::new().red().apply_to(path));
            }
            println!();
            println!("Fix the conflicts, then run 'relic resolve <path>' for each file.");
            println!("The merge commits automatically once every conflict is resolved.");
        }
    }
    Ok(())
}

fn cmd_resolve(repo: &Repository, path: &str) -> Result<()> {
    repo.merge_resolve(path)
        .with_context(|| format!("failed to resolve '{path}'"))?;
    println!("{}", success(&format!("resolved {path}")));

    let status = repo.status()?;
    if status.conflicted.is_empty() {
        match repo.merge_complete(None).context("merge completion failed")? {
            MergeOutcome::Completed(commit) => println!(
                "{}",
                success(&format!(
                    "merge committed as [{}] {}",
                    commit.short_id(),
                    commit.summary()
                ))
            ),
            MergeOutcome::UpToDate => println!("already up to date"),
            MergeOutcome::Conflicted(_) => unreachable!(),
        }
    } else {
        println!("{} conflict(s) remaining", status.conflicted.len());
    }
    Ok(())
}

fn cmd_abort(repo: &Repository) -> Result<()> {
    repo.merge_abort().context("failed to abort merge")?;
    println!("{}", success("merge aborted, working copy restored"));
    Ok(())
}

fn cmd_config(repo: &mut Repository, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key: Some(key) } => {
            let key = ConfigKey::parse(&key)?;
            match key.get(repo.config()) {
                Some(value) => println!("{value}"),
                None => println!("{}", Style::new().dim().apply_to("(unset)")),
            }
        }
        ConfigAction::Get { key: None } => {
            for key in ConfigKey::ALL {
                let value = key
                    .get(repo.config())
                    .unwrap_or_else(|| "(unset)".to_string());
                println!("{} = {value}", key.key());
            }
        }
        ConfigAction::Set { key, value } => {
            let key = ConfigKey::parse(&key)?;
            key.set(repo.config_mut(), &value)?;
            repo.save_config()?;
            println!("{}", success(&format!("set {}", key.key())));
        }
    }
    Ok(())
}
