//! Local chunk sink: an [`IndexingPipeline`] that writes chunks to JSONL.
//!
//! Each indexed file becomes `<chunks_dir>/<DocId>.jsonl`, one chunk per
//! line with its deterministic point id. Rewriting a file replaces its JSONL
//! atomically; a vanished file's JSONL is deleted. This is the pipeline the
//! `rix` binary runs; embedding and vector upserts can consume the output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use repo_index_core::{compute_doc_id, point_id, Chunk, Chunker, Facet, NoStructure, SpanProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::hashing::decode_text;
use crate::pipeline::{DeletionTarget, IndexFileContext, IndexingPipeline, MissingFileContext};
use crate::store::write_atomic;

#[derive(Serialize)]
struct ChunkLine<'a> {
    point_id: String,
    doc_id: &'a str,
    repo_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    canonical_path: &'a str,
    content_hash: &'a str,
    #[serde(flatten)]
    chunk: &'a Chunk,
}

pub struct JsonlChunkSink {
    chunker: Chunker,
    spans: Arc<dyn SpanProvider>,
    chunks_dir: PathBuf,
}

impl JsonlChunkSink {
    /// `chunks_dir` is resolved against each repository root unless absolute.
    pub fn new(chunker: Chunker, chunks_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunker,
            spans: Arc::new(NoStructure),
            chunks_dir: chunks_dir.into(),
        }
    }

    pub fn with_span_provider(mut self, spans: Arc<dyn SpanProvider>) -> Self {
        self.spans = spans;
        self
    }

    pub fn output_dir(&self, repo_root: &Path) -> PathBuf {
        if self.chunks_dir.is_absolute() {
            self.chunks_dir.clone()
        } else {
            repo_root.join(&self.chunks_dir)
        }
    }

    pub fn chunk_file(&self, repo_root: &Path, doc_id: &str) -> PathBuf {
        self.output_dir(repo_root).join(format!("{}.jsonl", doc_id))
    }
}

#[async_trait]
impl IndexingPipeline for JsonlChunkSink {
    async fn index_file(&self, ctx: &mut IndexFileContext) -> Result<()> {
        ctx.check_cancelled()?;
        let bytes = tokio::fs::read(&ctx.full_path)
            .await
            .with_context(|| format!("Failed to read {}", ctx.full_path.display()))?;
        let text = decode_text(&bytes);

        let chunks = self
            .chunker
            .chunk_with(&ctx.canonical_path, &text, self.spans.as_ref());
        ctx.check_cancelled()?;

        let mut body = String::new();
        for chunk in &chunks {
            let line = ChunkLine {
                point_id: point_id(&ctx.doc_id, chunk.chunk_index).to_string(),
                doc_id: &ctx.doc_id,
                repo_url: &ctx.repo.remote_url,
                branch: ctx.repo.branch.as_deref(),
                canonical_path: &ctx.canonical_path,
                content_hash: &ctx.content_hash,
                chunk,
            };
            body.push_str(&serde_json::to_string(&line)?);
            body.push('\n');
        }

        let target = self.chunk_file(&ctx.repo_root, &ctx.doc_id);
        let written = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, body.as_bytes()))
            .await
            .context("chunk writer task panicked")?
            .with_context(|| format!("Failed to write {}", written.display()))?;

        let category = FileCategory::from_path(&ctx.relative_path);
        ctx.sub_kind = Some(category.as_str().to_string());
        ctx.facets.push(Facet::new("Kind", category.as_str()));
        if let Some(ext) = extension(&ctx.relative_path) {
            ctx.facets.push(Facet::new("Extension", ext));
        }

        tracing::debug!(
            path = %ctx.canonical_path,
            doc_id = %ctx.doc_id,
            chunks = chunks.len(),
            "wrote chunks"
        );
        Ok(())
    }

    async fn handle_missing_file(&self, ctx: &MissingFileContext) -> Result<()> {
        let doc_id = match ctx.target() {
            DeletionTarget::DocId(doc_id) => doc_id,
            DeletionTarget::Path {
                repo_url,
                canonical_path,
            } => compute_doc_id(&repo_url, &canonical_path)?,
        };
        let target = self.chunk_file(&ctx.repo_root, &doc_id);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", target.display())),
        }
    }
}

/// Coarse classification reported as the record's `SubKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Code,
    Docs,
    Config,
    Other,
}

impl FileCategory {
    pub fn from_path(path: &str) -> Self {
        let Some(ext) = extension(path) else {
            return FileCategory::Other;
        };
        match ext.as_str() {
            "rs" | "cs" | "ts" | "tsx" | "js" | "jsx" | "py" | "go" | "java" | "kt" | "c"
            | "h" | "cpp" | "hpp" | "cc" | "rb" | "php" | "swift" | "scala" | "sh" | "ps1"
            | "sql" | "lua" => FileCategory::Code,
            "md" | "markdown" | "txt" | "rst" | "adoc" | "html" | "htm" => FileCategory::Docs,
            "json" | "toml" | "yaml" | "yml" | "xml" | "ini" | "cfg" | "conf" | "csproj"
            | "props" | "targets" | "sln" => FileCategory::Config,
            _ => FileCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Code => "code",
            FileCategory::Docs => "docs",
            FileCategory::Config => "config",
            FileCategory::Other => "other",
        }
    }
}

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoInfo;
    use repo_index_core::{ChunkerConfig, IndexRecord};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn repo() -> RepoInfo {
        RepoInfo {
            remote_url: "https://example.com/org/proj".into(),
            branch: Some("main".into()),
        }
    }

    fn sink() -> JsonlChunkSink {
        JsonlChunkSink::new(Chunker::new(ChunkerConfig::default()), ".nuvos/chunks")
    }

    fn index_ctx(root: &Path, rel: &str) -> IndexFileContext {
        let canonical = format!("/proj/{}", rel.to_lowercase());
        IndexFileContext {
            repo_id: "proj".into(),
            repo_root: root.to_path_buf(),
            repo: repo(),
            full_path: root.join(rel),
            relative_path: rel.to_string(),
            doc_id: compute_doc_id(&repo().remote_url, &canonical).unwrap(),
            canonical_path: canonical.clone(),
            content_hash: "h".into(),
            record: IndexRecord::new(canonical),
            cancel: CancellationToken::new(),
            sub_kind: None,
            facets: Vec::new(),
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_chunk_with_point_ids() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("lib.rs"), "fn a() {}\nfn b() {}\n").unwrap();
        let sink = sink();
        let mut ctx = index_ctx(tmp.path(), "lib.rs");
        sink.index_file(&mut ctx).await.unwrap();

        let out = std::fs::read_to_string(sink.chunk_file(tmp.path(), &ctx.doc_id)).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["doc_id"], ctx.doc_id.as_str());
        assert_eq!(lines[0]["point_id"], point_id(&ctx.doc_id, 0).to_string());
        assert_eq!(lines[0]["start_line"], 1);
        assert_eq!(lines[0]["end_line"], 2);
        assert_eq!(lines[0]["branch"], "main");

        assert_eq!(ctx.sub_kind.as_deref(), Some("code"));
        assert_eq!(
            ctx.facets,
            vec![Facet::new("Kind", "code"), Facet::new("Extension", "rs")]
        );
    }

    #[tokio::test]
    async fn cancelled_context_does_no_work() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "# a\n").unwrap();
        let sink = sink();
        let mut ctx = index_ctx(tmp.path(), "a.md");
        ctx.cancel.cancel();
        let err = sink.index_file(&mut ctx).await.unwrap_err();
        assert!(crate::error::is_cancellation(&err));
        assert!(!sink.chunk_file(tmp.path(), &ctx.doc_id).exists());
    }

    #[tokio::test]
    async fn missing_file_deletes_by_doc_id_or_path() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "# a\n").unwrap();
        let sink = sink();
        let mut ctx = index_ctx(tmp.path(), "a.md");
        sink.index_file(&mut ctx).await.unwrap();
        let out = sink.chunk_file(tmp.path(), &ctx.doc_id);
        assert!(out.exists());

        // a record indexed before DocIds were tracked
        let missing = MissingFileContext {
            repo_id: "proj".into(),
            repo_root: tmp.path().to_path_buf(),
            repo: repo(),
            record: IndexRecord::new(ctx.canonical_path.clone()),
            cancel: CancellationToken::new(),
        };
        sink.handle_missing_file(&missing).await.unwrap();
        assert!(!out.exists());

        // idempotent
        sink.handle_missing_file(&missing).await.unwrap();
    }

    #[test]
    fn categories() {
        assert_eq!(FileCategory::from_path("src/Main.CS"), FileCategory::Code);
        assert_eq!(FileCategory::from_path("README.md"), FileCategory::Docs);
        assert_eq!(FileCategory::from_path("Cargo.toml"), FileCategory::Config);
        assert_eq!(FileCategory::from_path("LICENSE"), FileCategory::Other);
        assert_eq!(FileCategory::from_path(".gitignore"), FileCategory::Other);
    }
}
