//! Repository metadata: remote URL and branch.
//!
//! The remote URL is an input to every DocId, so it must be stable across
//! runs. Repositories without an `origin` remote fall back to a `file://` URL
//! of their root.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub remote_url: String,
    pub branch: Option<String>,
}

/// Resolves [`RepoInfo`] for a repository root.
pub trait RepoInspector: Send + Sync {
    fn inspect(&self, repo_root: &Path) -> Result<RepoInfo>;
}

/// Reads metadata with the `git` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCliInspector;

impl RepoInspector for GitCliInspector {
    fn inspect(&self, repo_root: &Path) -> Result<RepoInfo> {
        let remote_url = match git_output(repo_root, &["remote", "get-url", "origin"]) {
            Ok(url) if !url.is_empty() => url,
            Ok(_) | Err(_) => {
                let fallback = file_url(repo_root)?;
                tracing::warn!(
                    root = %repo_root.display(),
                    url = %fallback,
                    "no origin remote; using local file url for document ids"
                );
                fallback
            }
        };
        let branch = git_output(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .ok()
            .filter(|b| !b.is_empty() && b != "HEAD");
        Ok(RepoInfo { remote_url, branch })
    }
}

/// Fixed metadata, for repositories whose identity is configured rather than
/// discovered.
#[derive(Debug, Clone)]
pub struct StaticInspector(pub RepoInfo);

impl RepoInspector for StaticInspector {
    fn inspect(&self, _repo_root: &Path) -> Result<RepoInfo> {
        Ok(self.0.clone())
    }
}

fn git_output(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn file_url(repo_root: &Path) -> Result<String> {
    let absolute = repo_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", repo_root.display()))?;
    let path = absolute.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        Ok(format!("file://{}", path))
    } else {
        Ok(format!("file:///{}", path))
    }
}
