//! Collaborator contract for per-file indexing and deletion.
//!
//! The orchestrator decides *what* changed; an [`IndexingPipeline`] does the
//! work for one file: chunk, embed, upsert, or delete downstream artifacts.
//! Implementations report metadata back through [`IndexFileContext`] so the
//! orchestrator can persist it with the checkpoint.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use repo_index::pipeline::{IndexFileContext, IndexingPipeline, MissingFileContext};
//!
//! struct CountingPipeline;
//!
//! #[async_trait]
//! impl IndexingPipeline for CountingPipeline {
//!     async fn index_file(&self, ctx: &mut IndexFileContext) -> Result<()> {
//!         ctx.sub_kind = Some("code".to_string());
//!         Ok(())
//!     }
//!
//!     async fn handle_missing_file(&self, _ctx: &MissingFileContext) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use repo_index_core::{Facet, IndexRecord};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::error::IndexError;
use crate::repo::RepoInfo;

/// Everything a pipeline needs to index one file.
#[derive(Debug, Clone)]
pub struct IndexFileContext {
    pub repo_id: String,
    pub repo_root: PathBuf,
    pub repo: RepoInfo,
    pub full_path: PathBuf,
    /// Repo-relative path, forward slashes.
    pub relative_path: String,
    pub canonical_path: String,
    pub doc_id: String,
    /// Normalized content hash the file is being indexed at.
    pub content_hash: String,
    /// Snapshot of the record before this index.
    pub record: IndexRecord,
    pub cancel: CancellationToken,

    /// Output: classification to persist if the record has none yet.
    pub sub_kind: Option<String>,
    /// Output: facets to merge into the record.
    pub facets: Vec<Facet>,
}

impl IndexFileContext {
    /// Bail out with [`IndexError::Cancelled`] if the run was cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled.into());
        }
        Ok(())
    }
}

/// How to find the downstream artifacts of a vanished file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    DocId(String),
    /// Records indexed before DocIds existed: filter by repository and path.
    Path {
        repo_url: String,
        canonical_path: String,
    },
}

#[derive(Debug, Clone)]
pub struct MissingFileContext {
    pub repo_id: String,
    pub repo_root: PathBuf,
    pub repo: RepoInfo,
    pub record: IndexRecord,
    pub cancel: CancellationToken,
}

impl MissingFileContext {
    pub fn target(&self) -> DeletionTarget {
        match self.record.doc_id.as_deref().map(str::trim) {
            Some(doc_id) if !doc_id.is_empty() => DeletionTarget::DocId(doc_id.to_string()),
            _ => DeletionTarget::Path {
                repo_url: self.repo.remote_url.clone(),
                canonical_path: self.record.file_path.clone(),
            },
        }
    }
}

/// Per-file indexing and deletion. Failures are reported per file; return an
/// error wrapping [`IndexError::Cancelled`] to stop the whole run.
#[async_trait]
pub trait IndexingPipeline: Send + Sync {
    async fn index_file(&self, ctx: &mut IndexFileContext) -> Result<()>;

    /// Delete the downstream artifacts of a file that no longer exists. The
    /// record is removed from the store only after this returns `Ok`.
    async fn handle_missing_file(&self, ctx: &MissingFileContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(doc_id: Option<&str>) -> MissingFileContext {
        let mut record = IndexRecord::new("/p/gone.rs");
        record.doc_id = doc_id.map(str::to_string);
        MissingFileContext {
            repo_id: "p".into(),
            repo_root: PathBuf::from("/src/p"),
            repo: RepoInfo {
                remote_url: "https://x/p".into(),
                branch: None,
            },
            record,
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn target_prefers_doc_id() {
        assert_eq!(
            missing(Some("ABC")).target(),
            DeletionTarget::DocId("ABC".into())
        );
    }

    #[test]
    fn target_falls_back_to_path() {
        for doc_id in [None, Some("  ")] {
            assert_eq!(
                missing(doc_id).target(),
                DeletionTarget::Path {
                    repo_url: "https://x/p".into(),
                    canonical_path: "/p/gone.rs".into()
                }
            );
        }
    }
}
