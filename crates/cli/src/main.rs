//! gitorch command-line tool.
//!
//! Runs rebases, history rewrites, cherry-picks and remote operations in a
//! local repository, renders their progress, and reports where each one
//! stopped so it can be resumed with `continue` or abandoned with `abort`.

mod progress;
mod style;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gitorch_core::log::{commits_to_head, CommitOneLine};
use gitorch_core::state;
use gitorch_core::status::{get_status, FileChange, ManualConflictResolution, StatusEntryKind};
use gitorch_core::{
    CherryPicker, EngineConfig, GitProcess, GitRunner, ProgressSink, RebaseResult, Rebaser,
    RemoteOps, Repository,
};

use crate::progress::ProgressDisplay;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// gitorch command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "gitorch",
    version,
    about = "Run multi-step git operations and report where they stop"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to
    /// `<config dir>/gitorch/config.toml` when that file exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run as if started in this directory.
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Do not draw progress bars.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebase <target> onto <base>.
    Rebase { base: String, target: String },

    /// Stage resolved files and resume the rebase or cherry-pick in progress.
    Continue {
        /// Resolve this conflicted path by keeping our side.
        #[arg(long, value_name = "PATH")]
        ours: Vec<String>,

        /// Resolve this conflicted path by keeping their side.
        #[arg(long, value_name = "PATH")]
        theirs: Vec<String>,
    },

    /// Abandon the rebase or cherry-pick in progress.
    Abort,

    /// Show the operation in progress and any conflicted files.
    State {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fold commits into another commit.
    Squash {
        /// Commit to squash onto.
        #[arg(long)]
        onto: String,

        /// Message for the combined commit. Empty keeps git's combined message.
        #[arg(short, long, default_value = "")]
        message: String,

        /// Newest commit left untouched. Omit to rewrite from the root.
        #[arg(long)]
        last_retained: Option<String>,

        /// Commits to fold into --onto.
        #[arg(required = true)]
        commits: Vec<String>,
    },

    /// Move commits directly above another commit (or to the top).
    Reorder {
        /// Place the moved commits directly above this one.
        #[arg(long)]
        before: Option<String>,

        /// Newest commit left untouched. Omit to rewrite from the root.
        #[arg(long)]
        last_retained: Option<String>,

        /// Commits to move, in the order they should end up.
        #[arg(required = true)]
        commits: Vec<String>,
    },

    /// Apply a commit or range onto the current branch.
    CherryPick { range: String },

    /// Clone a repository.
    Clone {
        url: String,
        path: PathBuf,

        /// Branch to check out instead of the remote's default.
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Fetch and prune a remote.
    Fetch {
        #[arg(default_value = "origin")]
        remote: String,
    },

    /// Fast-forward the current branch from a remote.
    Pull {
        #[arg(default_value = "origin")]
        remote: String,
    },

    /// Push a branch to a remote.
    Push { remote: String, branch: String },

    /// Switch to a branch.
    Checkout { branch: String },

    /// Write a starter configuration file.
    InitConfig {
        #[arg(default_value = "./gitorch.toml")]
        path: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config: config_path,
        repo: dir,
        quiet,
        command,
    } = cli;

    match &command {
        Commands::InitConfig { path } => {
            cmd_init_config(path)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Validate => {
            cmd_validate(config_path.as_deref())?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = load_config(config_path.as_deref())?;
    init_logging(&config)?;
    debug!(binary = %config.git.binary.display(), "using git");

    let runner: Arc<dyn GitRunner> =
        Arc::new(GitProcess::new(config.git.binary.clone()).with_env(config.git.process_env()));
    let reports_progress = matches!(
        command,
        Commands::Rebase { .. }
            | Commands::Continue { .. }
            | Commands::Squash { .. }
            | Commands::Reorder { .. }
            | Commands::Clone { .. }
            | Commands::Fetch { .. }
            | Commands::Pull { .. }
            | Commands::Push { .. }
            | Commands::Checkout { .. }
    );
    let display = (reports_progress && !quiet).then(ProgressDisplay::new);
    let mut sink = display.as_ref().map(ProgressDisplay::sink);

    let outcome = match command {
        Commands::Clone { url, path, branch } => {
            RemoteOps::new(runner)
                .clone_repository(&url, &path, branch.as_deref(), as_sink(&mut sink))
                .await
                .context("clone failed")?;
            Outcome::Done(format!("Cloned {url} into {}", path.display()))
        }
        command => {
            let repo = Repository::open(&dir)
                .with_context(|| format!("{} is not a git repository", dir.display()))?;
            info!(repo = %repo.path().display(), "opened repository");
            run_in_repo(command, runner, repo, &mut sink).await?
        }
    };

    if let Some(display) = display {
        display.finish();
    }

    Ok(report(outcome))
}

/// What a command has to say once it is done.
enum Outcome {
    Stopped(&'static str, RebaseResult),
    Done(String),
    Quiet,
}

async fn run_in_repo<S: ProgressSink>(
    command: Commands,
    runner: Arc<dyn GitRunner>,
    repo: Repository,
    sink: &mut Option<S>,
) -> Result<Outcome> {
    let outcome = match command {
        Commands::Rebase { base, target } => {
            let rebaser = Rebaser::new(runner, repo);
            let result = rebaser.start(&base, &target, as_sink(sink)).await?;
            Outcome::Stopped("Rebase", result)
        }
        Commands::Continue { ours, theirs } => cmd_continue(runner, repo, ours, theirs, sink).await?,
        Commands::Abort => cmd_abort(runner, repo).await?,
        Commands::State { json } => {
            cmd_state(runner, repo, json).await?;
            Outcome::Quiet
        }
        Commands::Squash {
            onto,
            message,
            last_retained,
            commits,
        } => {
            let log = commits_to_head(runner.as_ref(), &repo, last_retained.as_deref()).await?;
            let onto = resolve_commit(&log, &onto)?.clone();
            let to_squash = commits
                .iter()
                .map(|sha| resolve_commit(&log, sha).cloned())
                .collect::<Result<Vec<_>>>()?;
            let rebaser = Rebaser::new(runner, repo);
            let result = rebaser
                .squash(&to_squash, &onto, last_retained.as_deref(), &message, as_sink(sink))
                .await?;
            Outcome::Stopped("Squash", result)
        }
        Commands::Reorder {
            before,
            last_retained,
            commits,
        } => {
            let log = commits_to_head(runner.as_ref(), &repo, last_retained.as_deref()).await?;
            let to_move = commits
                .iter()
                .map(|sha| resolve_commit(&log, sha).map(|c| c.sha.clone()))
                .collect::<Result<Vec<_>>>()?;
            let before = match before {
                Some(sha) => Some(resolve_commit(&log, &sha)?.sha.clone()),
                None => None,
            };
            let rebaser = Rebaser::new(runner, repo);
            let result = rebaser
                .reorder(&to_move, before.as_deref(), last_retained.as_deref(), as_sink(sink))
                .await?;
            Outcome::Stopped("Reorder", result)
        }
        Commands::CherryPick { range } => {
            let result = CherryPicker::new(runner, repo).cherry_pick(&range).await?;
            Outcome::Stopped("Cherry-pick", result)
        }
        Commands::Fetch { remote } => {
            RemoteOps::new(runner)
                .fetch(&repo, &remote, as_sink(sink))
                .await
                .context("fetch failed")?;
            Outcome::Done(format!("Fetched {remote}"))
        }
        Commands::Pull { remote } => {
            RemoteOps::new(runner)
                .pull(&repo, &remote, as_sink(sink))
                .await
                .context("pull failed")?;
            Outcome::Done(format!("Pulled {remote}"))
        }
        Commands::Push { remote, branch } => {
            RemoteOps::new(runner)
                .push(&repo, &remote, &branch, as_sink(sink))
                .await
                .context("push failed")?;
            Outcome::Done(format!("Pushed {branch} to {remote}"))
        }
        Commands::Checkout { branch } => {
            RemoteOps::new(runner)
                .checkout(&repo, &branch, as_sink(sink))
                .await
                .context("checkout failed")?;
            Outcome::Done(format!("Switched to {branch}"))
        }
        Commands::Clone { .. } | Commands::InitConfig { .. } | Commands::Validate => {
            anyhow::bail!("command does not run inside a repository")
        }
    };
    Ok(outcome)
}

fn as_sink<S: ProgressSink>(sink: &mut Option<S>) -> Option<&mut dyn ProgressSink> {
    sink.as_mut().map(|s| s as &mut dyn ProgressSink)
}

fn report(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Stopped(operation, result) => {
            println!("{}", style::outcome(operation, result));
            match result {
                RebaseResult::CompletedWithoutError | RebaseResult::AlreadyUpToDate => {
                    ExitCode::SUCCESS
                }
                RebaseResult::ConflictsEncountered | RebaseResult::OutstandingFilesNotStaged => {
                    ExitCode::from(1)
                }
                RebaseResult::Aborted | RebaseResult::Error => ExitCode::from(2),
            }
        }
        Outcome::Done(msg) => {
            println!("{}", style::success(&msg));
            ExitCode::SUCCESS
        }
        Outcome::Quiet => ExitCode::SUCCESS,
    }
}

// ---------------------------------------------------------------------------
// Config & logging
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gitorch").join("config.toml"))
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => Some(expand_tilde(path)),
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => EngineConfig::load_and_resolve(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let mut config = EngineConfig::default();
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables")?;
            Ok(config)
        }
    }
}

fn init_logging(config: &EngineConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;

    let file_layer = match config.logging.file {
        Some(ref path) => {
            let path = expand_tilde(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(tracing_appender::rolling::never(dir, name)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("failed to install logging")?;
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_continue<S: ProgressSink>(
    runner: Arc<dyn GitRunner>,
    repo: Repository,
    ours: Vec<String>,
    theirs: Vec<String>,
    sink: &mut Option<S>,
) -> Result<Outcome> {
    let status = get_status(runner.as_ref(), &repo)
        .await?
        .context("unable to read repository status")?;
    let view = repo.metadata();

    if state::is_cherry_pick_in_progress(&view) {
        if !ours.is_empty() || !theirs.is_empty() {
            anyhow::bail!("--ours/--theirs only apply to a rebase");
        }
        let result = CherryPicker::new(runner, repo)
            .continue_cherry_pick(&status.files)
            .await?;
        return Ok(Outcome::Stopped("Cherry-pick", result));
    }

    if !state::is_rebase_in_progress(&view) {
        anyhow::bail!("no rebase or cherry-pick in progress");
    }

    let resolutions = manual_resolutions(ours, theirs)?;
    let result = Rebaser::new(runner, repo)
        .continue_rebase(&status.files, &resolutions, as_sink(sink))
        .await?;
    Ok(Outcome::Stopped("Rebase", result))
}

fn manual_resolutions(
    ours: Vec<String>,
    theirs: Vec<String>,
) -> Result<BTreeMap<String, ManualConflictResolution>> {
    let mut resolutions = BTreeMap::new();
    for path in ours {
        resolutions.insert(path, ManualConflictResolution::Ours);
    }
    for path in theirs {
        if resolutions.contains_key(&path) {
            anyhow::bail!("'{path}' given with both --ours and --theirs");
        }
        resolutions.insert(path, ManualConflictResolution::Theirs);
    }
    Ok(resolutions)
}

async fn cmd_abort(runner: Arc<dyn GitRunner>, repo: Repository) -> Result<Outcome> {
    let view = repo.metadata();
    if state::is_cherry_pick_in_progress(&view) {
        CherryPicker::new(runner, repo).abort_cherry_pick().await?;
        Ok(Outcome::Done("Cherry-pick aborted".into()))
    } else if state::is_rebase_in_progress(&view) {
        Rebaser::new(runner, repo).abort().await?;
        Ok(Outcome::Done("Rebase aborted".into()))
    } else {
        anyhow::bail!("no rebase or cherry-pick in progress")
    }
}

async fn cmd_state(runner: Arc<dyn GitRunner>, repo: Repository, json: bool) -> Result<()> {
    let cherry_pick_head = state::read_cherry_pick_head(&repo.metadata());
    let status = get_status(runner.as_ref(), &repo).await?;
    let rebaser = Rebaser::new(runner, repo);
    let rebase = rebaser.state();
    let snapshot = rebaser.snapshot().await?;
    let conflicts: Vec<FileChange> = status
        .as_ref()
        .map(|s| s.conflicted().cloned().collect())
        .unwrap_or_default();

    if json {
        let value = serde_json::json!({
            "rebase": rebase,
            "snapshot": snapshot,
            "cherry_pick_head": cherry_pick_head,
            "conflicts": conflicts,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    match (&rebase, &cherry_pick_head) {
        (Some(rebase), _) => {
            println!("{}", style::header("Rebase in progress"));
            println!("  Branch     {}", rebase.target_branch);
            println!("  Onto       {}", style::short_sha(&rebase.base_tip));
            println!("  Original   {}", style::short_sha(&rebase.original_tip));
        }
        (None, Some(head)) => {
            println!("{}", style::header("Cherry-pick in progress"));
            println!("  Applying   {}", style::short_sha(head));
        }
        (None, None) => {
            println!("{}", style::success("No operation in progress"));
        }
    }

    if let Some(ref snapshot) = snapshot {
        println!(
            "  Step       {} of {} ({:.0}%)",
            snapshot.position,
            snapshot.total,
            snapshot.fraction * 100.0
        );
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["#", "Commit", "Summary"]);
        for (i, commit) in snapshot.commits.iter().enumerate() {
            let row = commit_row(i + 1, commit);
            if i + 1 == snapshot.position {
                table.add_row(row.into_iter().map(|c| c.fg(Color::Yellow)));
            } else {
                table.add_row(row);
            }
        }
        println!("{table}");
    }

    if !conflicts.is_empty() {
        println!();
        println!(
            "{}",
            style::header(&format!("Conflicted files ({})", conflicts.len()))
        );
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Path", "Ours", "Theirs", "Markers"]);
        for file in &conflicts {
            if let Some(entry) = file.conflict() {
                let markers = match entry.markers {
                    Some(n) => n.to_string(),
                    None => style::dim("pick a side"),
                };
                table.add_row(vec![
                    Cell::new(&file.path),
                    Cell::new(kind_label(entry.us)),
                    Cell::new(kind_label(entry.them)),
                    Cell::new(markers),
                ]);
            }
        }
        println!("{table}");
    }

    println!();
    Ok(())
}

fn commit_row(position: usize, commit: &CommitOneLine) -> Vec<Cell> {
    vec![
        Cell::new(position),
        Cell::new(style::short_sha(&commit.sha)),
        Cell::new(&commit.summary),
    ]
}

fn kind_label(kind: StatusEntryKind) -> &'static str {
    match kind {
        StatusEntryKind::Added => "added",
        StatusEntryKind::UpdatedButUnmerged => "modified",
        StatusEntryKind::Deleted => "deleted",
    }
}

/// Find the single commit in `log` whose id starts with `sha`.
fn resolve_commit<'a>(log: &'a [CommitOneLine], sha: &str) -> Result<&'a CommitOneLine> {
    let mut matches = log.iter().filter(|c| c.sha.starts_with(sha));
    let first = matches
        .next()
        .with_context(|| format!("commit {sha} is not among the commits being rewritten"))?;
    if matches.next().is_some() {
        anyhow::bail!("commit id {sha} is ambiguous");
    }
    Ok(first)
}

fn cmd_init_config(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, EngineConfig::sample_toml()).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Point [git] binary at the git you want to drive");
    println!(
        "  2. Validate with: gitorch validate --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => expand_tilde(path),
        None => default_config_path().context("no --config given and no config directory")?,
    };
    println!("Validating configuration: {}", path.display());
    println!();

    let mut config =
        EngineConfig::load_from_file(&path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    if let Err(e) = config.resolve_env_vars() {
        println!("  [FAIL] Environment variable error: {e}");
        anyhow::bail!("environment variable resolution failed");
    }
    println!("  [OK] Environment variable references processed");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {e}");
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All fields are valid");

    println!();
    println!("Configuration summary:");
    println!("  Git binary : {}", config.git.binary.display());
    println!(
        "  Askpass    : {}",
        if config.git.askpass.is_some() { "set" } else { "not set" }
    );
    println!("  Git env    : {} variable(s)", config.git.env.len());
    println!("  Log level  : {}", config.logging.level);
    println!(
        "  Log file   : {}",
        config
            .logging
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".into())
    );
    println!();
    println!("{}", style::success("Configuration is valid."));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn log() -> Vec<CommitOneLine> {
        vec![
            CommitOneLine::new("abc1230000", "third"),
            CommitOneLine::new("abd4560000", "second"),
            CommitOneLine::new("fff0000000", "first"),
        ]
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_continue_resolutions() {
        let cli = Cli::try_parse_from([
            "gitorch", "-C", "/work", "continue", "--ours", "a.txt", "--theirs", "b.txt",
        ])
        .unwrap();
        assert_eq!(cli.repo, PathBuf::from("/work"));
        match cli.command {
            Commands::Continue { ours, theirs } => {
                assert_eq!(ours, vec!["a.txt"]);
                assert_eq!(theirs, vec!["b.txt"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_squash_requires_commits() {
        assert!(Cli::try_parse_from(["gitorch", "squash", "--onto", "abc"]).is_err());
        let cli =
            Cli::try_parse_from(["gitorch", "squash", "--onto", "abc", "-m", "msg", "def"]).unwrap();
        assert!(matches!(cli.command, Commands::Squash { ref commits, .. } if commits == &["def"]));
    }

    #[test]
    fn test_manual_resolutions_reject_both_sides() {
        let ok = manual_resolutions(vec!["a".into()], vec!["b".into()]).unwrap();
        assert_eq!(ok.get("a"), Some(&ManualConflictResolution::Ours));
        assert_eq!(ok.get("b"), Some(&ManualConflictResolution::Theirs));
        assert!(manual_resolutions(vec!["a".into()], vec!["a".into()]).is_err());
    }

    #[test]
    fn test_resolve_commit_by_prefix() {
        let log = log();
        assert_eq!(resolve_commit(&log, "fff").unwrap().summary, "first");
        assert_eq!(resolve_commit(&log, "abd456").unwrap().summary, "second");
        assert!(resolve_commit(&log, "ab").is_err());
        assert!(resolve_commit(&log, "999").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/etc/gitorch.toml")), PathBuf::from("/etc/gitorch.toml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/g.toml")), home.join("g.toml"));
        }
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitorch.toml");
        cmd_init_config(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, EngineConfig::sample_toml());
        assert!(cmd_init_config(&path).is_err());
        cmd_validate(Some(&path)).unwrap();
    }

    #[test]
    fn test_validate_with_askpass_env_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitorch.toml");
        std::fs::write(&path, "[git]\naskpass_env = \"TEST_GITORCH_VALIDATE_UNSET\"\n").unwrap();
        cmd_validate(Some(&path)).unwrap();

        std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(cmd_validate(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_missing_config_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/gitorch.toml"))).is_err());
    }
}
