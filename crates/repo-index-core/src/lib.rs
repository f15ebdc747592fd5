//! # Repo Index Core
//!
//! Shared, side-effect-free logic for repo-index: index record models,
//! normalized content hashing, canonical paths and document identity, the
//! (re)index selection policy, and the structure-aware chunker.
//!
//! This crate performs no filesystem I/O and depends on no async runtime.
//! Everything here is deterministic and can be tested with plain strings and
//! synthetic span lists.

pub mod chunk;
pub mod hash;
pub mod ids;
pub mod models;
pub mod policy;

pub use chunk::{estimate_line_tokens, Chunker, ChunkerConfig, NoStructure, SpanProvider};
pub use hash::hash_text;
pub use ids::{canonical_path, compute_doc_id, normalize_repo_url, point_id, EmptyArgument};
pub use models::{Chunk, Facet, IndexRecord, ReindexDirective, Span};
pub use policy::{select, SelectionReason};
