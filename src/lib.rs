//! # Repo Index
//!
//! Incremental, crash-safe indexing of source trees into chunked retrieval
//! units.
//!
//! Re-runs only do work proportional to what changed: every file's
//! normalized content hash is tracked in a per-repository index
//! (`.nuvos/index/local-index.json`), files whose hash moved (or that carry an
//! operator reindex directive) are handed to an [`pipeline::IndexingPipeline`],
//! and records whose files vanished have their downstream artifacts deleted.
//! Every completed file is checkpointed, so a crash loses at most one file's
//! work.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ FileWalker │──▶│  Planner   │──▶│ Orchestrator │──▶│   Pipeline   │
//! │ glob+walk  │   │ hash+select│   │ per-file ckpt│   │ chunk+write  │
//! └────────────┘   └─────┬──────┘   └──────┬───────┘   └──────────────┘
//!                        │                 │
//!                        ▼                 ▼
//!                  ┌──────────────────────────┐
//!                  │ LocalIndexStore (JSON)   │
//!                  └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`commands`] | `rix` command implementations |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`hashing`] | File hashing, bounded parallel |
//! | [`walker`] | Glob-filtered file discovery |
//! | [`store`] | Local index store with atomic save |
//! | [`planner`] | Discovery and (re)index selection |
//! | [`pipeline`] | Per-file indexing collaborator contract |
//! | [`repo`] | Repository metadata |
//! | [`orchestrator`] | Multi-repository run driver |
//! | [`sink`] | JSONL chunk output pipeline |
//! | [`progress`] | Run progress reporting |

pub mod commands;
pub mod config;
pub mod error;
pub mod hashing;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod repo;
pub mod sink;
pub mod store;
pub mod walker;

pub use error::{IndexError, Result};
