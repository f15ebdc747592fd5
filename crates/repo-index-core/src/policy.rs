//! (Re)index selection policy.
//!
//! A file is selected when it was never indexed, its content changed, an
//! operator directive is pending, or the run forces a full reindex. The first
//! matching reason is reported so callers can log why work happened.

use std::fmt;

use crate::models::{IndexRecord, ReindexDirective};

/// Why a file was selected for (re)indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    NeverIndexed,
    ContentChanged,
    Directive(ReindexDirective),
    ForcedReindex,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::NeverIndexed => f.write_str("never indexed"),
            SelectionReason::ContentChanged => f.write_str("content changed"),
            SelectionReason::Directive(d) => write!(f, "reindex directive ({})", d),
            SelectionReason::ForcedReindex => f.write_str("forced reindex"),
        }
    }
}

/// Decide whether `record` needs (re)indexing. `record.active_content_hash`
/// must already reflect the current on-disk content.
pub fn select(record: &IndexRecord, force_reindex: bool) -> Option<SelectionReason> {
    if !record.has_content_hash() {
        return Some(SelectionReason::NeverIndexed);
    }
    let indexed = record.content_hash.as_deref().unwrap_or_default().trim();
    let active = record
        .active_content_hash
        .as_deref()
        .unwrap_or_default()
        .trim();
    if !indexed.eq_ignore_ascii_case(active) {
        return Some(SelectionReason::ContentChanged);
    }
    if let Some(directive) = record.reindex {
        return Some(SelectionReason::Directive(directive));
    }
    if force_reindex {
        return Some(SelectionReason::ForcedReindex);
    }
    None
}
