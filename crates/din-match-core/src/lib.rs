//! DIN Match Core Library
//!
//! Resolves loosely specified drug rows to drug identification numbers (DINs)
//! against the national product registry, then enriches resolved rows with
//! secondary codes from a per-identifier lookup service.
//!
//! # Architecture
//!
//! ```text
//!   products ─┐
//!   statuses ─┼─► RegistryAssembler ──► Registry ──► MatchEngine ──► result column
//!   ingreds. ─┘          │  ▲                           (brand / generic)
//!                        ▼  │
//!                   ChunkedCache ◄──► KvStore (memory | SQLite)
//!
//!   result column ──► CheckpointedEnricher ──► CodeLookup (one call per row)
//!                        │   ▲
//!                        ▼   │ cursor
//!                     PropertyStore        Scheduler re-invokes when suspended
//! ```
//!
//! # Core Principle
//!
//! **Every invocation is short-lived.** The registry is cached in fragments
//! across size-bounded store entries, and enrichment checkpoints a cursor
//! before its time budget runs out so the next invocation resumes exactly
//! where this one stopped.
//!
//! # Modules
//!
//! - [`cache`]: Chunked TTL cache over a size-bounded key-value store
//! - [`config`]: TOML settings
//! - [`db`]: SQLite-backed key-value and property store
//! - [`enrich`]: Resumable secondary-code enrichment
//! - [`jobs`]: Host entry points (matching, enrichment, stop, clear cache)
//! - [`models`]: Registry, feed and target record types
//! - [`registry`]: Feed join and cached registry loading
//! - [`resolver`]: Normalization and brand/generic matching
//! - [`sheet`]: Tabular boundary adapter
//! - [`store`]: Store traits and the in-memory store

pub mod cache;
pub mod config;
pub mod db;
pub mod enrich;
pub mod jobs;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod sheet;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheLookup, CacheMiss, ChunkedCache};
pub use config::Settings;
pub use db::Database;
pub use enrich::{CheckpointedEnricher, CodeLookup, EnrichmentOutcome, TimeBudget};
pub use jobs::{Jobs, LogNotifier, Notifier, Scheduler};
pub use models::{DrugKind, MarketStatus, Registry, RegistryEntry, TargetRecord};
pub use registry::{RegistryAssembler, RegistrySource};
pub use resolver::MatchEngine;
pub use sheet::Table;
pub use store::{KvStore, MemoryStore, PropertyStore};

use thiserror::Error;

/// Errors that abort a job. Everything else is recorded per row or logged.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] sheet::SheetError),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] registry::RegistryError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Settings error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] enrich::EnrichError),

    #[error("Scheduler error: {0}")]
    Schedule(#[from] jobs::ScheduleError),
}

pub type JobResult<T> = Result<T, JobError>;
