//! File hashing: the I/O side of content hashing.
//!
//! Hashing is pure apart from the read, so it fans out over a bounded pool of
//! blocking tasks. Results come back in input order.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use repo_index_core::hash_text;

use crate::error::{IndexError, Result};

const BOM: char = '\u{feff}';

/// Read `path` and hash its text. Invalid UTF-8 is replaced rather than
/// rejected and a leading byte-order mark is ignored.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| IndexError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_text(&decode_text(&bytes)))
}

/// Decode file bytes the way every reader in the pipeline sees them.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix(BOM).unwrap_or(&text).to_string()
}

/// Hash many files with at most `concurrency` reads in flight.
pub async fn hash_files(paths: Vec<PathBuf>, concurrency: usize) -> Vec<(PathBuf, Result<String>)> {
    stream::iter(paths)
        .map(|path| async move {
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || hash_file(&task_path))
                .await
                .unwrap_or_else(|join_err| {
                    Err(IndexError::FileRead {
                        path: path.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, join_err),
                    })
                });
            (path, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
