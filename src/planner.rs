//! Discovery and ingestion planning.
//!
//! Walks a repository, hashes what it finds, refreshes each record's
//! `ActiveContentHash`, and splits the result into files to (re)index, files
//! that are unchanged, and records whose files have vanished.

use std::path::{Path, PathBuf};

use repo_index_core::{canonical_path, select, IndexRecord, SelectionReason};

use crate::error::{IndexError, Result};
use crate::hashing::hash_files;
use crate::store::LocalIndexStore;
use crate::walker::FileWalker;

/// A file found on disk, with its canonical identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub full_path: PathBuf,
    pub relative_path: String,
    pub canonical_path: String,
}

/// A file selected for (re)indexing.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub file: DiscoveredFile,
    pub content_hash: String,
    pub reason: SelectionReason,
}

/// A discovered file whose hash could not be computed. It is never treated
/// as unchanged.
#[derive(Debug)]
pub struct HashFailure {
    pub file: DiscoveredFile,
    pub error: IndexError,
}

#[derive(Debug, Default)]
pub struct IngestionPlan {
    pub discovered: usize,
    pub to_index: Vec<PlannedFile>,
    pub unchanged: Vec<DiscoveredFile>,
    /// Records whose files are gone, in path order.
    pub missing: Vec<IndexRecord>,
    pub hash_failures: Vec<HashFailure>,
}

impl IngestionPlan {
    /// Nothing to index and nothing to delete.
    pub fn is_noop(&self) -> bool {
        self.to_index.is_empty() && self.missing.is_empty() && self.hash_failures.is_empty()
    }
}

pub struct IngestionPlanner {
    walker: FileWalker,
    hash_concurrency: usize,
}

impl IngestionPlanner {
    pub fn new(walker: FileWalker, hash_concurrency: usize) -> Self {
        Self {
            walker,
            hash_concurrency: hash_concurrency.max(1),
        }
    }

    /// Enumerate files under `repo_root` and compute their canonical paths.
    pub fn discover(&self, project_id: &str, repo_root: &Path) -> Result<Vec<DiscoveredFile>> {
        self.walker
            .walk(repo_root)?
            .into_iter()
            .map(|walked| -> Result<DiscoveredFile> {
                let canonical = canonical_path(project_id, &walked.relative_path)?;
                Ok(DiscoveredFile {
                    full_path: walked.full_path,
                    relative_path: walked.relative_path,
                    canonical_path: canonical,
                })
            })
            .collect()
    }

    /// Discover, hash, and classify. Refreshes `ActiveContentHash` in `store`
    /// for every file hashed successfully; nothing is saved.
    pub async fn plan(
        &self,
        project_id: &str,
        repo_root: &Path,
        store: &mut LocalIndexStore,
        force_reindex: bool,
    ) -> Result<IngestionPlan> {
        let files = self.discover(project_id, repo_root)?;
        let mut plan = IngestionPlan {
            discovered: files.len(),
            missing: store.missing_files(files.iter().map(|f| f.canonical_path.as_str())),
            ..Default::default()
        };

        let paths = files.iter().map(|f| f.full_path.clone()).collect();
        let hashes = hash_files(paths, self.hash_concurrency).await;

        for (file, (_, hashed)) in files.into_iter().zip(hashes) {
            let hash = match hashed {
                Ok(hash) => hash,
                Err(error) => {
                    plan.hash_failures.push(HashFailure { file, error });
                    continue;
                }
            };
            store.update_active_content_hash(&file.canonical_path, &hash)?;
            let record = store.get_or_add(&file.canonical_path)?;
            match select(record, force_reindex) {
                Some(reason) => plan.to_index.push(PlannedFile {
                    file,
                    content_hash: hash,
                    reason,
                }),
                None => plan.unchanged.push(file),
            }
        }

        Ok(plan)
    }
}
