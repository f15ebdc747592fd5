//! Normalized content hashing for change detection.
//!
//! Two texts hash identically when they differ only in line-ending style
//! (`\r\n`, `\r`, `\n`) or in characters past the 500th on some line. The
//! truncation bounds the cost of hashing minified or generated files; an edit
//! that only touches the tail of such a line is not detected.

use sha2::{Digest, Sha256};

/// Lines longer than this many characters are truncated before hashing.
pub const MAX_HASHED_LINE_CHARS: usize = 500;

/// Hash `text` after normalization. Returns 64 lowercase hex characters.
///
/// ```rust
/// use repo_index_core::hash::hash_text;
///
/// assert_eq!(hash_text("a\r\nb\r\n"), hash_text("a\nb\n"));
/// assert_eq!(hash_text("x").len(), 64);
/// ```
pub fn hash_text(text: &str) -> String {
    let normalized = normalize(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse line endings to `\n` and truncate every line to
/// [`MAX_HASHED_LINE_CHARS`] characters.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match line.char_indices().nth(MAX_HASHED_LINE_CHARS) {
            Some((cut, _)) => out.push_str(&line[..cut]),
            None => out.push_str(line),
        }
    }
    out
}
