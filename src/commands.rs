//! CLI command implementations.
//!
//! Each command prints a human-readable report to stdout and ends with `ok`
//! on success. Logs and progress go to stderr.

use anyhow::{bail, Context, Result};
use repo_index_core::{canonical_path, Chunker, ReindexDirective};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::orchestrator::{IndexRunOrchestrator, RunSummary};
use crate::planner::IngestionPlanner;
use crate::progress::ProgressMode;
use crate::repo::GitCliInspector;
use crate::sink::JsonlChunkSink;
use crate::store::{LoadOutcome, LocalIndexStore};
use crate::walker::FileWalker;

pub fn build_planner(cfg: &Config) -> Result<IngestionPlanner> {
    let walker = FileWalker::new(&cfg.ingestion.include, &cfg.ingestion.exclude)
        .context("Invalid include/exclude globs")?
        .with_max_file_bytes(cfg.ingestion.max_file_bytes)
        .with_excluded_dir(cfg.output.chunks_dir.clone());
    Ok(IngestionPlanner::new(walker, cfg.ingestion.hash_concurrency))
}

fn load_store(cfg: &Config, repo_id: &str) -> Result<LocalIndexStore> {
    let root = cfg.repo_root(repo_id);
    if !root.is_dir() {
        bail!("Repository root does not exist: {}", root.display());
    }
    let outcome = LocalIndexStore::load(LocalIndexStore::path_for_repo(&root));
    if let LoadOutcome::Recovered {
        quarantined,
        reason,
        ..
    } = &outcome
    {
        tracing::warn!(repo = %repo_id, quarantined = ?quarantined, reason = %reason, "index was unreadable");
    }
    Ok(outcome.into_store())
}

/// Discovery and planning only: nothing is indexed, deleted, or saved.
pub async fn run_plan(cfg: &Config, only: Option<&str>, reindex: bool) -> Result<()> {
    let planner = build_planner(cfg)?;
    let force = reindex || cfg.ingestion.reindex;

    for repo_id in cfg.selected_repositories(only)? {
        let mut store = load_store(cfg, &repo_id)?;
        let plan = planner
            .plan(&repo_id, &cfg.repo_root(&repo_id), &mut store, force)
            .await
            .with_context(|| format!("Failed to plan repository '{}'", repo_id))?;

        println!("plan {}", repo_id);
        println!("  discovered: {}", plan.discovered);
        println!("  unchanged: {}", plan.unchanged.len());
        println!("  to index: {}", plan.to_index.len());
        for f in &plan.to_index {
            println!("    + {} ({})", f.file.canonical_path, f.reason);
        }
        println!("  missing: {}", plan.missing.len());
        for r in &plan.missing {
            println!("    - {}", r.file_path);
        }
        if !plan.hash_failures.is_empty() {
            println!("  unreadable: {}", plan.hash_failures.len());
            for f in &plan.hash_failures {
                println!("    ! {} ({})", f.file.canonical_path, f.error);
            }
        }
    }
    println!("ok");
    Ok(())
}

/// Full orchestrated run writing chunks with [`JsonlChunkSink`].
pub async fn run_index(
    cfg: &Config,
    only: Option<&str>,
    reindex: bool,
    progress: ProgressMode,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let repos = cfg.selected_repositories(only)?;
    let sink = JsonlChunkSink::new(
        Chunker::new(cfg.chunking.to_chunker_config()),
        cfg.output.chunks_dir.clone(),
    );
    let orchestrator = IndexRunOrchestrator::new(
        cfg.ingestion.source_root.clone(),
        build_planner(cfg)?,
        Arc::new(GitCliInspector),
        Arc::new(sink),
    )
    .with_progress(progress.reporter())
    .with_force_reindex(reindex || cfg.ingestion.reindex);

    let summary = orchestrator.run(&repos, cancel).await;

    for repo in &summary.repositories {
        println!("index {}", repo.repo_id);
        println!("  discovered: {}", repo.discovered);
        println!("  indexed: {}", repo.indexed);
        println!("  unchanged: {}", repo.unchanged);
        println!("  deleted: {}", repo.deleted);
        if let Some(path) = &repo.recovered_from {
            println!("  recovered corrupt index: {}", path.display());
        }
        if !repo.failures.is_empty() {
            println!("  failed: {}", repo.failures.len());
            for f in &repo.failures {
                println!("    ! {} ({})", f.path, f.error);
            }
        }
    }
    for (repo_id, error) in &summary.failed_repositories {
        println!("index {}", repo_id);
        println!("  error: {}", error);
    }
    if summary.cancelled {
        println!("cancelled");
    } else if summary.failed_repositories.is_empty() {
        println!("ok");
    }
    Ok(summary)
}

/// Set or clear the sticky reindex directive of one file.
///
/// `path` may be canonical (`/<repo>/...`) or repository-relative.
pub fn set_directive(
    cfg: &Config,
    repo_id: &str,
    path: &str,
    directive: Option<ReindexDirective>,
) -> Result<()> {
    cfg.selected_repositories(Some(repo_id))?;
    let canonical = if path.starts_with('/') {
        path.to_lowercase()
    } else {
        canonical_path(repo_id, path)?
    };

    let mut store = load_store(cfg, repo_id)?;
    if !store.contains(&canonical) {
        bail!("'{}' is not in the index of '{}'", canonical, repo_id);
    }
    store.set_reindex_directive(&canonical, directive)?;
    store.save()?;

    println!(
        "reindex {} {}",
        canonical,
        directive.map_or("none", |d| d.as_str())
    );
    println!("ok");
    Ok(())
}

/// Print every record with its change state and directive.
pub fn show_status(cfg: &Config, only: Option<&str>) -> Result<()> {
    for repo_id in cfg.selected_repositories(only)? {
        let store = load_store(cfg, &repo_id)?;
        println!("status {} ({} files)", repo_id, store.len());
        for record in store.records() {
            let state = if !record.has_content_hash() {
                "new"
            } else if record.is_active() {
                "changed"
            } else {
                "indexed"
            };
            let directive = record.reindex.map_or("-", |d| d.as_str());
            let last = record
                .last_indexed_utc
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<8} {:<6} {}  {}",
                state, directive, last, record.file_path
            );
        }
    }
    println!("ok");
    Ok(())
}
