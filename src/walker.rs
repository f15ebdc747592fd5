//! File discovery with include/exclude globs.
//!
//! Patterns are matched against the forward-slash relative path,
//! case-insensitively, with `*` confined to one path segment. An empty include
//! list matches everything. Version-control metadata, the index's own state
//! directory, and known binary formats are never yielded.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};

/// Always excluded, regardless of configuration.
const BUILTIN_EXCLUDES: [&str; 2] = ["**/.git/**", "**/.nuvos/**"];

/// Extensions of binary formats that are never indexed.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "zip", "gz", "tgz", "7z", "rar", "dll",
    "exe", "so", "dylib", "a", "lib", "mp3", "mp4", "mov", "wav", "avi", "mkv", "woff", "woff2",
    "eot", "ttf", "otf",
];

/// A file found under a repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub full_path: PathBuf,
    /// Relative to the walk root, forward slashes.
    pub relative_path: String,
}

pub struct FileWalker {
    include: Option<GlobSet>,
    exclude: GlobSet,
    excluded_dirs: Vec<PathBuf>,
    max_file_bytes: u64,
}

impl FileWalker {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };

        let mut all_excludes: Vec<String> = BUILTIN_EXCLUDES.iter().map(|s| s.to_string()).collect();
        all_excludes.extend(exclude.iter().cloned());
        let exclude = build_globset(&all_excludes)?;

        Ok(Self {
            include,
            exclude,
            excluded_dirs: Vec::new(),
            max_file_bytes: 0,
        })
    }

    /// Skip files larger than `bytes`. 0 disables the cap.
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Never descend into `dir`. A relative `dir` is resolved against each walk root.
    pub fn with_excluded_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }

    /// Whether a relative path passes the glob and extension filters.
    pub fn is_match(&self, relative_path: &str) -> bool {
        let rel = normalize_relative(relative_path);
        if self.exclude.is_match(&rel) {
            return false;
        }
        if let Some(include) = &self.include {
            if !include.is_match(&rel) {
                return false;
            }
        }
        !is_binary(&rel)
    }

    /// Enumerate matching files under `root`, sorted by relative path.
    pub fn walk(&self, root: &Path) -> Result<Vec<WalkedFile>> {
        if !root.is_dir() {
            return Err(IndexError::Configuration(format!(
                "repository root does not exist: {}",
                root.display()
            )));
        }

        let skipped: Vec<PathBuf> = self
            .excluded_dirs
            .iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir.clone()
                } else {
                    root.join(dir)
                }
            })
            .collect();

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skipped.iter().any(|dir| e.path().starts_with(dir)));
        for entry in walker {
            let entry = entry.map_err(|source| IndexError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = normalize_relative(&relative.to_string_lossy());

            if !self.is_match(&rel_str) {
                continue;
            }

            if self.max_file_bytes > 0 {
                let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if len > self.max_file_bytes {
                    tracing::debug!(path = %rel_str, bytes = len, "skipping oversized file");
                    continue;
                }
            }

            files.push(WalkedFile {
                full_path: path.to_path_buf(),
                relative_path: rel_str,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }
}

fn normalize_relative(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

fn is_binary(relative_path: &str) -> bool {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = normalize_relative(pattern.trim());
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .case_insensitive(true)
            .build()
            .map_err(|source| IndexError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| IndexError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_include_matches_everything_but_binaries() {
        let walker = FileWalker::new(&[], &[]).unwrap();
        assert!(walker.is_match("src/main.rs"));
        assert!(walker.is_match("README"));
        assert!(!walker.is_match("assets/logo.PNG"));
        assert!(!walker.is_match(".git/config"));
        assert!(!walker.is_match("sub/.nuvos/index/local-index.json"));
    }

    #[test]
    fn star_stays_within_one_segment() {
        let walker = FileWalker::new(&strings(&["src/*.rs"]), &[]).unwrap();
        assert!(walker.is_match("src/lib.rs"));
        assert!(!walker.is_match("src/nested/lib.rs"));
    }

    #[test]
    fn double_star_matches_zero_or_more_segments() {
        let walker = FileWalker::new(&strings(&["**/*.cs"]), &[]).unwrap();
        assert!(walker.is_match("Program.cs"));
        assert!(walker.is_match("a/b/c/Thing.CS"));
        assert!(!walker.is_match("a/b/readme.md"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let walker = FileWalker::new(&strings(&["v?.txt"]), &[]).unwrap();
        assert!(walker.is_match("v1.txt"));
        assert!(!walker.is_match("v10.txt"));
    }

    #[test]
    fn exclude_wins_and_separators_normalize() {
        let walker =
            FileWalker::new(&strings(&["**/*.rs"]), &strings(&["/target/**"])).unwrap();
        assert!(!walker.is_match("target\\debug\\build.rs"));
        assert!(walker.is_match("src\\lib.rs"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = FileWalker::new(&strings(&["src/[.rs"]), &[]).err().unwrap();
        assert!(matches!(err, IndexError::Glob { .. }));
    }

    #[test]
    fn walk_is_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src/b")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join(".nuvos/index")).unwrap();
        std::fs::write(root.join("src/b/z.rs"), "z").unwrap();
        std::fs::write(root.join("src/a.rs"), "a").unwrap();
        std::fs::write(root.join("src/img.png"), "x").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(root.join(".nuvos/index/local-index.json"), "[]").unwrap();
        std::fs::write(root.join("big.txt"), "x".repeat(100)).unwrap();

        let walker = FileWalker::new(&[], &[]).unwrap().with_max_file_bytes(50);
        let files = walker.walk(root).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["src/a.rs", "src/b/z.rs"]);
        assert_eq!(files[0].full_path, root.join("src/a.rs"));
    }

    #[test]
    fn excluded_dirs_are_not_descended() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(root.join("chunks")).unwrap();
        std::fs::create_dir_all(root.join("out/jsonl")).unwrap();
        std::fs::write(root.join("lib.rs"), "a").unwrap();
        std::fs::write(root.join("chunks/ABC.jsonl"), "{}").unwrap();
        std::fs::write(root.join("out/jsonl/DEF.jsonl"), "{}").unwrap();

        let walker = FileWalker::new(&[], &[])
            .unwrap()
            .with_excluded_dir("./chunks")
            .with_excluded_dir(root.join("out"));
        let files = walker.walk(&root).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["lib.rs"]);
    }

    #[test]
    fn missing_root_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let walker = FileWalker::new(&[], &[]).unwrap();
        let err = walker.walk(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }
}
