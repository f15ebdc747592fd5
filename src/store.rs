//! Local index store: per-repository file → indexing state.
//!
//! One JSON document per repository at [`INDEX_RELATIVE_PATH`], holding an
//! array of [`IndexRecord`]s sorted by path. Keys compare case-insensitively.
//!
//! Saving writes a sibling temp file, syncs it, then renames it over the
//! target, so a crash at any point leaves either the old or the new document
//! on disk, never a torn one.
//!
//! Loading never fails. A document that cannot be parsed is renamed to
//! `<stem>.corrupt-<yyyyMMddHHmmss><ext>` and an empty store is returned as
//! [`LoadOutcome::Recovered`] so the caller can report the data loss.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use repo_index_core::{EmptyArgument, Facet, IndexRecord, ReindexDirective};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{IndexError, Result};

/// Location of the index document inside a repository root.
pub const INDEX_RELATIVE_PATH: &str = ".nuvos/index/local-index.json";

/// Result of [`LocalIndexStore::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LocalIndexStore),
    /// The document was unreadable or malformed; `store` is empty.
    Recovered {
        store: LocalIndexStore,
        /// Where the bad document was moved, if the rename succeeded.
        quarantined: Option<PathBuf>,
        reason: String,
    },
}

impl LoadOutcome {
    pub fn into_store(self) -> LocalIndexStore {
        match self {
            LoadOutcome::Loaded(store) => store,
            LoadOutcome::Recovered { store, .. } => store,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, LoadOutcome::Recovered { .. })
    }
}

/// Accepted on-disk shapes: a bare array, or an object wrapping one.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedIndex {
    Bare(Vec<IndexRecord>),
    Wrapped {
        #[serde(rename = "Records", alias = "records")]
        records: Vec<IndexRecord>,
    },
}

#[derive(Debug, Clone)]
pub struct LocalIndexStore {
    path: PathBuf,
    records: BTreeMap<String, IndexRecord>,
}

fn key(path: &str) -> String {
    path.trim().to_lowercase()
}

impl LocalIndexStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Index document location for a repository root.
    pub fn path_for_repo(repo_root: &Path) -> PathBuf {
        repo_root.join(INDEX_RELATIVE_PATH)
    }

    pub fn load(path: impl Into<PathBuf>) -> LoadOutcome {
        let path = path.into();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return LoadOutcome::Loaded(Self::empty(path));
            }
            Err(e) => {
                return LoadOutcome::Recovered {
                    store: Self::empty(path),
                    quarantined: None,
                    reason: format!("unreadable index: {}", e),
                };
            }
        };

        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
        if body.iter().all(u8::is_ascii_whitespace) {
            return LoadOutcome::Loaded(Self::empty(path));
        }

        // Invalid UTF-8 fails here too and is quarantined like any malformed document.
        match serde_json::from_slice::<PersistedIndex>(body) {
            Ok(PersistedIndex::Bare(records)) | Ok(PersistedIndex::Wrapped { records }) => {
                let mut store = Self::empty(path);
                for record in records {
                    if record.file_path.trim().is_empty() {
                        continue;
                    }
                    store.records.entry(key(&record.file_path)).or_insert(record);
                }
                LoadOutcome::Loaded(store)
            }
            Err(parse_err) => {
                let reason = format!("malformed index: {}", parse_err);
                let quarantined = match quarantine(&path) {
                    Ok(moved) => Some(moved),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "could not quarantine corrupt index");
                        None
                    }
                };
                LoadOutcome::Recovered {
                    store: Self::empty(path),
                    quarantined,
                    reason,
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&IndexRecord> {
        self.records.get(&key(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(&key(path))
    }

    /// Records in path order.
    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> {
        self.records.values()
    }

    pub fn get_or_add(&mut self, path: &str) -> Result<&mut IndexRecord> {
        if path.trim().is_empty() {
            return Err(EmptyArgument("file path").into());
        }
        Ok(self
            .records
            .entry(key(path))
            .or_insert_with(|| IndexRecord::new(path.trim())))
    }

    /// Record the hash of the current on-disk content. `ContentHash` is untouched.
    pub fn update_active_content_hash(&mut self, path: &str, hash: &str) -> Result<()> {
        self.get_or_add(path)?.active_content_hash = Some(hash.to_string());
        Ok(())
    }

    /// Assign a DocId unless the record already has one. Returns the DocId in effect.
    pub fn assign_doc_id(&mut self, path: &str, doc_id: &str) -> Result<String> {
        let record = self.get_or_add(path)?;
        match record.doc_id.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(existing) => Ok(existing.to_string()),
            None => {
                record.doc_id = Some(doc_id.to_string());
                Ok(doc_id.to_string())
            }
        }
    }

    /// Record a successful index of `path` at content `hash`.
    pub fn mark_indexed(
        &mut self,
        path: &str,
        hash: &str,
        indexed_at: DateTime<Utc>,
        sub_kind: Option<&str>,
        facets: &[Facet],
    ) -> Result<()> {
        let record = self.get_or_add(path)?;
        record.content_hash = Some(hash.to_string());
        record.active_content_hash = Some(hash.to_string());
        record.last_indexed_utc = Some(indexed_at);
        record.reindex = None;

        let unset = record
            .sub_kind
            .as_deref()
            .map_or(true, |s| s.trim().is_empty());
        if let Some(kind) = sub_kind.filter(|k| !k.trim().is_empty()) {
            if unset {
                record.sub_kind = Some(kind.to_string());
            }
        }

        if !facets.is_empty() {
            record.merge_facets(facets);
        }
        Ok(())
    }

    pub fn set_reindex_directive(
        &mut self,
        path: &str,
        directive: Option<ReindexDirective>,
    ) -> Result<()> {
        self.get_or_add(path)?.reindex = directive;
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<IndexRecord> {
        self.records.remove(&key(path))
    }

    /// Records whose path is not in `current_paths`, in path order.
    pub fn missing_files<'a, I>(&self, current_paths: I) -> Vec<IndexRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current: std::collections::HashSet<String> =
            current_paths.into_iter().map(key).collect();
        self.records
            .iter()
            .filter(|(k, _)| !current.contains(*k))
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Persist atomically. Errors propagate; nothing is swallowed.
    pub fn save(&self) -> Result<()> {
        let temp = self.write_temp()?;
        self.commit(&temp)
    }

    /// First half of [`save`](Self::save): write and sync the full document to
    /// a temp file beside the target. The target is not touched.
    pub fn write_temp(&self) -> Result<PathBuf> {
        let records: Vec<&IndexRecord> = self.records.values().collect();
        let json = serde_json::to_string_pretty(&records)?;

        write_temp_beside(&self.path, json.as_bytes()).map_err(|source| IndexError::Persist {
            path: self.path.clone(),
            source,
        })
    }

    /// Second half of [`save`](Self::save): rename `temp` over the target.
    pub fn commit(&self, temp: &Path) -> Result<()> {
        replace_with_temp(temp, &self.path).map_err(|source| IndexError::Persist {
            path: self.path.clone(),
            source,
        })
    }
}

/// Write `bytes` to a synced temp file in `path`'s directory and return it.
/// `path` itself is not touched.
pub fn write_temp_beside(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = dir.join(format!("{}.tmp-{}", file_name, Uuid::new_v4().simple()));

    let write = |temp: &Path| -> std::io::Result<()> {
        let mut file = File::create(temp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(e) = write(&temp) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }
    Ok(temp)
}

/// Rename `temp` over `path`; the temp file is removed if that fails.
pub fn replace_with_temp(temp: &Path, path: &Path) -> std::io::Result<()> {
    if let Err(e) = std::fs::rename(temp, path) {
        let _ = std::fs::remove_file(temp);
        return Err(e);
    }
    Ok(())
}

/// Replace `path` with `bytes` so readers see either the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = write_temp_beside(path, bytes)?;
    replace_with_temp(&temp, path)
}

/// Move a corrupt document aside and return its new path.
fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let target = path.with_file_name(format!("{}.corrupt-{}{}", stem, stamp, ext));
    std::fs::rename(path, &target)?;
    Ok(target)
}
