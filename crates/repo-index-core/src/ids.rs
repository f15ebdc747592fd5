//! Canonical paths and deterministic document identity.
//!
//! A file's canonical path is `/<projectId>/<path in repo>`, lower-cased with
//! forward slashes. Its DocId is a UUIDv5 over `"<repoUrl>|<canonicalPath>"`,
//! so it is stable while the file stays put and changes when the file moves.
//! Chunk point ids are derived from the DocId and the chunk index, so
//! re-upserting an unchanged file addresses the same downstream points.

use thiserror::Error;
use uuid::Uuid;

/// Namespace for all name-based ids produced by this crate. Must never change:
/// every persisted DocId depends on it.
pub const DOC_ID_NAMESPACE: Uuid = Uuid::from_u128(0x9a9a77a0_6f19_4b44_a8a7_4e4e1a4f3d01);

/// A required argument was empty or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} must not be empty")]
pub struct EmptyArgument(pub &'static str);

/// Build the canonical path for a file.
///
/// ```rust
/// use repo_index_core::ids::canonical_path;
///
/// let p = canonical_path("co.core", "src\\Managers//DeviceManager.cs").unwrap();
/// assert_eq!(p, "/co.core/src/managers/devicemanager.cs");
/// ```
pub fn canonical_path(project_id: &str, path_in_repo: &str) -> Result<String, EmptyArgument> {
    let project = project_id.trim().trim_matches(|c| c == '/' || c == '\\');
    if project.is_empty() {
        return Err(EmptyArgument("project id"));
    }

    let normalized = path_in_repo.replace('\\', "/");
    let mut combined = String::with_capacity(project.len() + normalized.len() + 2);
    combined.push('/');
    combined.push_str(project);
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        combined.push('/');
        combined.push_str(segment);
    }

    Ok(combined.to_lowercase())
}

/// Trim whitespace and trailing slashes, then lower-case.
pub fn normalize_repo_url(repo_url: &str) -> Result<String, EmptyArgument> {
    let url = repo_url.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(EmptyArgument("repository url"));
    }
    Ok(url.to_lowercase())
}

/// Compute the DocId for a file: 32 upper-case hex characters, no hyphens.
pub fn compute_doc_id(repo_url: &str, canonical_path: &str) -> Result<String, EmptyArgument> {
    let repo = normalize_repo_url(repo_url)?;
    if canonical_path.trim().is_empty() {
        return Err(EmptyArgument("canonical path"));
    }
    let name = format!("{}|{}", repo, canonical_path);
    let id = Uuid::new_v5(&DOC_ID_NAMESPACE, name.as_bytes());
    Ok(id.simple().to_string().to_ascii_uppercase())
}

/// Deterministic point id for the `chunk_index`-th chunk of a document.
pub fn point_id(doc_id: &str, chunk_index: usize) -> Uuid {
    let name = format!("{}#{}", doc_id, chunk_index);
    Uuid::new_v5(&DOC_ID_NAMESPACE, name.as_bytes())
}
