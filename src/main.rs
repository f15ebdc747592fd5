//! # Repo Index CLI (`rix`)
//!
//! Incrementally indexes the repositories listed in a TOML config into
//! chunk files, re-processing only what changed since the last run.
//!
//! ## Usage
//!
//! ```bash
//! rix --config ./config/rix.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rix plan` | Show what a run would index and delete |
//! | `rix run` | Index changed files and delete artifacts of removed ones |
//! | `rix reindex <repo> <path> --mode chunk` | Force one file to be reprocessed |
//! | `rix status` | List index records and their state |

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use repo_index::commands;
use repo_index::config;
use repo_index::progress::ProgressMode;
use repo_index_core::ReindexDirective;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Repo Index CLI: incremental, crash-safe indexing of source trees.
#[derive(Parser)]
#[command(name = "rix", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rix.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr: `off`, `human`, or `json`.
    /// Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and plan without indexing, deleting, or saving.
    Plan {
        /// Only this repository.
        #[arg(long)]
        repo: Option<String>,

        /// Treat every file as needing reindex.
        #[arg(long)]
        reindex: bool,
    },

    /// Index changed files, delete artifacts of removed files.
    ///
    /// Exits non-zero if any repository failed or the run was interrupted.
    Run {
        /// Only this repository.
        #[arg(long)]
        repo: Option<String>,

        /// Reindex every file regardless of content hash.
        #[arg(long)]
        reindex: bool,
    },

    /// Set the sticky reindex directive for one file.
    Reindex {
        /// Repository id.
        repo: String,

        /// Canonical (`/<repo>/...`) or repository-relative path.
        path: String,

        #[arg(long, value_enum, default_value = "chunk")]
        mode: DirectiveArg,
    },

    /// List index records with change state and directive.
    Status {
        /// Only this repository.
        #[arg(long)]
        repo: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectiveArg {
    None,
    Chunk,
    Full,
}

impl From<DirectiveArg> for Option<ReindexDirective> {
    fn from(arg: DirectiveArg) -> Self {
        match arg {
            DirectiveArg::None => None,
            DirectiveArg::Chunk => Some(ReindexDirective::Chunk),
            DirectiveArg::Full => Some(ReindexDirective::Full),
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Plan { repo, reindex } => {
            commands::run_plan(&cfg, repo.as_deref(), reindex).await?;
        }
        Commands::Run { repo, reindex } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received Ctrl+C, stopping after the current file");
                    on_signal.cancel();
                }
            });

            let summary =
                commands::run_index(&cfg, repo.as_deref(), reindex, progress, &cancel).await?;
            if summary.cancelled {
                anyhow::bail!("run cancelled");
            }
            if !summary.failed_repositories.is_empty() {
                anyhow::bail!(
                    "{} repositor{} failed",
                    summary.failed_repositories.len(),
                    if summary.failed_repositories.len() == 1 { "y" } else { "ies" }
                );
            }
        }
        Commands::Reindex { repo, path, mode } => {
            commands::set_directive(&cfg, &repo, &path, mode.into())?;
        }
        Commands::Status { repo } => {
            commands::show_status(&cfg, repo.as_deref())?;
        }
    }

    Ok(())
}
