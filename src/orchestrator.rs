//! Run orchestration across repositories.
//!
//! Per repository: inspect metadata, load the index, plan, delete artifacts
//! of vanished files, then index each selected file. Every completed file is
//! checkpointed with a save, so a crash loses at most one file's work.
//!
//! A failing file is recorded and skipped; a failing repository is logged and
//! the next one runs. Cancellation stops everything at the next file boundary.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use repo_index_core::compute_doc_id;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{is_cancellation, IndexError, Result};
use crate::pipeline::{IndexFileContext, IndexingPipeline, MissingFileContext};
use crate::planner::IngestionPlanner;
use crate::progress::{NoProgress, RunProgressEvent, RunProgressReporter};
use crate::repo::RepoInspector;
use crate::store::{LoadOutcome, LocalIndexStore};

/// A file that could not be hashed, indexed, or deleted this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSummary {
    pub repo_id: String,
    pub discovered: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failures: Vec<FileFailure>,
    /// Path the corrupt index was moved to, if this run recovered from one.
    pub recovered_from: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub repositories: Vec<RepoSummary>,
    /// (repo id, error) for repositories that aborted.
    pub failed_repositories: Vec<(String, String)>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed_repositories.is_empty() && !self.cancelled
    }
}

pub struct IndexRunOrchestrator {
    source_root: PathBuf,
    planner: IngestionPlanner,
    inspector: Arc<dyn RepoInspector>,
    pipeline: Arc<dyn IndexingPipeline>,
    progress: Box<dyn RunProgressReporter>,
    force_reindex: bool,
}

impl IndexRunOrchestrator {
    pub fn new(
        source_root: impl Into<PathBuf>,
        planner: IngestionPlanner,
        inspector: Arc<dyn RepoInspector>,
        pipeline: Arc<dyn IndexingPipeline>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            planner,
            inspector,
            pipeline,
            progress: Box::new(NoProgress),
            force_reindex: false,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn RunProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_force_reindex(mut self, force: bool) -> Self {
        self.force_reindex = force;
        self
    }

    /// Index every repository in order. Never fails as a whole: per-repository
    /// errors are collected in the summary.
    pub async fn run(&self, repo_ids: &[String], cancel: &CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();

        for repo_id in repo_ids {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            match self.run_repository(repo_id, cancel).await {
                Ok(repo_summary) => summary.repositories.push(repo_summary),
                Err(IndexError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(repo = %repo_id, error = %format_error(&e), "repository indexing failed");
                    summary
                        .failed_repositories
                        .push((repo_id.clone(), format_error(&e)));
                }
            }
        }

        if summary.cancelled {
            info!("indexing run cancelled");
        }
        summary
    }

    /// Index one repository at `<source_root>/<repo_id>`.
    pub async fn run_repository(
        &self,
        repo_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RepoSummary> {
        let repo_root = self.source_root.join(repo_id);
        if !repo_root.is_dir() {
            return Err(IndexError::Configuration(format!(
                "repository root does not exist: {}",
                repo_root.display()
            )));
        }

        let repo = self
            .inspector
            .inspect(&repo_root)
            .map_err(|source| IndexError::Delegate {
                operation: "inspect repository",
                path: repo_root.display().to_string(),
                source,
            })?;

        let mut summary = RepoSummary {
            repo_id: repo_id.to_string(),
            ..Default::default()
        };

        let mut store = match LocalIndexStore::load(LocalIndexStore::path_for_repo(&repo_root)) {
            LoadOutcome::Loaded(store) => store,
            LoadOutcome::Recovered {
                store,
                quarantined,
                reason,
            } => {
                warn!(
                    repo = %repo_id,
                    quarantined = ?quarantined,
                    reason = %reason,
                    "index was unreadable; starting from an empty index"
                );
                summary.recovered_from = quarantined;
                store
            }
        };

        self.progress.report(RunProgressEvent::Discovering {
            repo: repo_id.to_string(),
        });
        let plan = self
            .planner
            .plan(repo_id, &repo_root, &mut store, self.force_reindex)
            .await?;
        summary.discovered = plan.discovered;
        summary.unchanged = plan.unchanged.len();
        info!(
            repo = %repo_id,
            discovered = plan.discovered,
            selected = plan.to_index.len(),
            missing = plan.missing.len(),
            "planned repository"
        );

        for failure in plan.hash_failures {
            warn!(repo = %repo_id, path = %failure.file.canonical_path, error = %format_error(&failure.error), "could not hash file");
            summary.failures.push(FileFailure {
                path: failure.file.canonical_path,
                error: format_error(&failure.error),
            });
        }

        let total_missing = plan.missing.len() as u64;
        for (i, record) in plan.missing.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let path = record.file_path.clone();
            let ctx = MissingFileContext {
                repo_id: repo_id.to_string(),
                repo_root: repo_root.clone(),
                repo: repo.clone(),
                record,
                cancel: cancel.clone(),
            };
            match self.pipeline.handle_missing_file(&ctx).await {
                Ok(()) => {
                    store.remove(&path);
                    store.save()?;
                    summary.deleted += 1;
                    debug!(repo = %repo_id, path = %path, target = ?ctx.target(), "removed missing file");
                }
                Err(e) if is_cancellation(&e) || cancel.is_cancelled() => {
                    return Err(IndexError::Cancelled);
                }
                Err(e) => {
                    let err = IndexError::Delegate {
                        operation: "delete missing file",
                        path: path.clone(),
                        source: e,
                    };
                    warn!(repo = %repo_id, error = %format_error(&err), "deletion failed; record kept for retry");
                    summary.failures.push(FileFailure {
                        path,
                        error: format_error(&err),
                    });
                }
            }
            self.progress.report(RunProgressEvent::Deleting {
                repo: repo_id.to_string(),
                n: i as u64 + 1,
                total: total_missing,
            });
        }

        let total = plan.to_index.len() as u64;
        for (i, planned) in plan.to_index.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let path = planned.file.canonical_path;
            let doc_id = match store.get(&path).and_then(|r| r.doc_id.clone()) {
                Some(existing) if !existing.trim().is_empty() => existing,
                _ => store.assign_doc_id(&path, &compute_doc_id(&repo.remote_url, &path)?)?,
            };
            let record = store.get_or_add(&path)?.clone();
            debug!(repo = %repo_id, path = %path, doc_id = %doc_id, reason = %planned.reason, "indexing file");

            let mut ctx = IndexFileContext {
                repo_id: repo_id.to_string(),
                repo_root: repo_root.clone(),
                repo: repo.clone(),
                full_path: planned.file.full_path,
                relative_path: planned.file.relative_path,
                canonical_path: path.clone(),
                doc_id,
                content_hash: planned.content_hash.clone(),
                record,
                cancel: cancel.clone(),
                sub_kind: None,
                facets: Vec::new(),
            };

            match self.pipeline.index_file(&mut ctx).await {
                Ok(()) => {
                    store.mark_indexed(
                        &path,
                        &planned.content_hash,
                        Utc::now(),
                        ctx.sub_kind.as_deref(),
                        &ctx.facets,
                    )?;
                    store.save()?;
                    summary.indexed += 1;
                }
                Err(e) if is_cancellation(&e) || cancel.is_cancelled() => {
                    return Err(IndexError::Cancelled);
                }
                Err(e) => {
                    let err = IndexError::Delegate {
                        operation: "index file",
                        path: path.clone(),
                        source: e,
                    };
                    warn!(repo = %repo_id, error = %format_error(&err), "indexing failed; file will be retried next run");
                    summary.failures.push(FileFailure {
                        path,
                        error: format_error(&err),
                    });
                }
            }
            self.progress.report(RunProgressEvent::Indexing {
                repo: repo_id.to_string(),
                n: i as u64 + 1,
                total,
            });
        }

        // persists refreshed active hashes of unchanged files
        store.save()?;

        info!(
            repo = %repo_id,
            indexed = summary.indexed,
            unchanged = summary.unchanged,
            deleted = summary.deleted,
            failed = summary.failures.len(),
            "repository indexed"
        );
        Ok(summary)
    }
}

/// Render an error with its source chain, `outer: inner: root`.
fn format_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
