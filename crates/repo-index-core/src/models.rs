//! Core data models shared by the indexing pipeline.
//!
//! [`IndexRecord`] is the persisted per-file state; its serde layout is the
//! on-disk format of `local-index.json` (PascalCase field names, every field
//! optional on read, unknown fields ignored). [`Span`] and [`Chunk`] are the
//! transient input and output of the chunker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sticky operator override forcing a file to be re-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReindexDirective {
    /// Re-chunk and re-embed the file.
    Chunk,
    /// Full re-processing, including any enrichment beyond chunking.
    Full,
}

impl ReindexDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReindexDirective::Chunk => "chunk",
            ReindexDirective::Full => "full",
        }
    }
}

impl fmt::Display for ReindexDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReindexDirective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("chunk") {
            Ok(ReindexDirective::Chunk)
        } else if trimmed.eq_ignore_ascii_case("full") {
            Ok(ReindexDirective::Full)
        } else {
            Err(format!("unknown reindex directive '{}'", s))
        }
    }
}

/// A (property, value) metadata pair captured at the last successful index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Facet {
    pub property: String,
    pub value: String,
}

impl Facet {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.property.trim().is_empty() || self.value.trim().is_empty()
    }

    fn dedup_key(&self) -> (String, String) {
        (self.property.to_lowercase(), self.value.to_lowercase())
    }
}

/// Persisted indexing state of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IndexRecord {
    /// Canonical path; the store key (compared case-insensitively).
    pub file_path: String,
    pub doc_id: Option<String>,
    /// Hash at the last successful index.
    pub content_hash: Option<String>,
    /// Hash of the on-disk content as of the latest discovery pass.
    pub active_content_hash: Option<String>,
    pub sub_kind: Option<String>,
    pub last_indexed_utc: Option<DateTime<Utc>>,
    pub flag_for_review: Option<bool>,
    #[serde(deserialize_with = "lenient_directive")]
    pub reindex: Option<ReindexDirective>,
    pub facets: Vec<Facet>,
}

impl IndexRecord {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn has_content_hash(&self) -> bool {
        non_blank(self.content_hash.as_deref()).is_some()
    }

    /// Content changed since the last index: both hashes present and different.
    pub fn is_active(&self) -> bool {
        match (
            non_blank(self.content_hash.as_deref()),
            non_blank(self.active_content_hash.as_deref()),
        ) {
            (Some(indexed), Some(active)) => !indexed.eq_ignore_ascii_case(active),
            _ => false,
        }
    }

    /// Append `incoming` facets after the existing ones, skipping blanks and
    /// case-insensitive duplicates. First occurrence wins.
    pub fn merge_facets(&mut self, incoming: &[Facet]) {
        let mut merged: Vec<Facet> = Vec::with_capacity(self.facets.len() + incoming.len());
        let mut seen = std::collections::HashSet::new();
        for facet in self.facets.iter().chain(incoming.iter()) {
            if facet.is_blank() {
                continue;
            }
            if seen.insert(facet.dedup_key()) {
                merged.push(facet.clone());
            }
        }
        self.facets = merged;
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Unknown or malformed directive values read as "no directive" so one bad
/// record never invalidates the whole index file.
fn lenient_directive<'de, D>(deserializer: D) -> Result<Option<ReindexDirective>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok()))
}

/// A named structural region reported by a parser, 1-based inclusive lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub name: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            start_line,
            end_line,
        }
    }
}

/// A bounded, line-ranged slice of a file's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub kind: String,
    pub symbol: Option<String>,
    pub estimated_tokens: usize,
    /// Position within the file's chunk list, contiguous from 0.
    pub chunk_index: usize,
    /// SHA-256 of `text`.
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_roundtrips_pascal_case() {
        let mut rec = IndexRecord::new("/p/a.rs");
        rec.doc_id = Some("ABC".into());
        rec.reindex = Some(ReindexDirective::Full);
        rec.facets.push(Facet::new("Kind", "code"));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["FilePath"], "/p/a.rs");
        assert_eq!(json["DocId"], "ABC");
        assert_eq!(json["Reindex"], "full");
        assert_eq!(json["Facets"][0]["Property"], "Kind");

        let back: IndexRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn missing_and_unknown_fields_are_tolerated() {
        let rec: IndexRecord =
            serde_json::from_str(r#"{"FilePath":"/p/x","Extra":42,"FlagForReview":true}"#)
                .unwrap();
        assert_eq!(rec.file_path, "/p/x");
        assert_eq!(rec.flag_for_review, Some(true));
        assert!(rec.content_hash.is_none());
        assert!(rec.facets.is_empty());
    }

    #[test]
    fn directive_decoding_is_lenient() {
        let rec: IndexRecord =
            serde_json::from_str(r#"{"FilePath":"/p/x","Reindex":"CHUNK"}"#).unwrap();
        assert_eq!(rec.reindex, Some(ReindexDirective::Chunk));

        for raw in [r#""bogus""#, "null", "7", r#""""#] {
            let json = format!(r#"{{"FilePath":"/p/x","Reindex":{}}}"#, raw);
            let rec: IndexRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(rec.reindex, None, "input {}", raw);
        }
    }

    #[test]
    fn is_active_requires_both_hashes() {
        let mut rec = IndexRecord::new("/p/x");
        assert!(!rec.is_active());
        rec.active_content_hash = Some("aa".into());
        assert!(!rec.is_active());
        rec.content_hash = Some("AA".into());
        assert!(!rec.is_active());
        rec.active_content_hash = Some("bb".into());
        assert!(rec.is_active());
        rec.content_hash = Some("  ".into());
        assert!(!rec.is_active());
    }

    #[test]
    fn facet_merge_keeps_existing_first_and_dedups() {
        let mut rec = IndexRecord::new("/p/x");
        rec.facets = vec![Facet::new("Kind", "code"), Facet::new("Lang", "rust")];
        rec.merge_facets(&[
            Facet::new("kind", "CODE"),
            Facet::new("Extension", "rs"),
            Facet::new("", "empty"),
            Facet::new("Extension", "rs"),
        ]);
        assert_eq!(
            rec.facets,
            vec![
                Facet::new("Kind", "code"),
                Facet::new("Lang", "rust"),
                Facet::new("Extension", "rs"),
            ]
        );
    }

    #[test]
    fn directive_parses_case_insensitively() {
        assert_eq!("Full".parse::<ReindexDirective>(), Ok(ReindexDirective::Full));
        assert_eq!(" chunk ".parse::<ReindexDirective>(), Ok(ReindexDirective::Chunk));
        assert!("none".parse::<ReindexDirective>().is_err());
    }
}
