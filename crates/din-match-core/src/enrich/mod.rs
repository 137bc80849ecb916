//! Secondary-code enrichment under a per-invocation time budget.
//!
//! Pipeline: Cursor → Per-row lookup → Parse → Checkpoint or complete

mod enricher;
mod parser;

pub use enricher::*;
pub use parser::*;

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;

/// Per-identifier lookup failures. Recorded inline, never fatal.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Enrichment errors: only the cursor store can abort a run.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Cursor store error: {0}")]
    Cursor(#[from] StoreError),
}

pub type EnrichResult<T> = Result<T, EnrichError>;

/// One network round-trip per identifier, returning the raw response body as JSON.
pub trait CodeLookup {
    fn lookup(&self, identifier: &str) -> LookupResult<Value>;
}

impl<F> CodeLookup for F
where
    F: Fn(&str) -> LookupResult<Value>,
{
    fn lookup(&self, identifier: &str) -> LookupResult<Value> {
        self(identifier)
    }
}

/// Decides when the current invocation must stop and checkpoint.
pub trait Budget {
    fn exhausted(&self) -> bool;
}

/// Wall-clock budget measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Budget for TimeBudget {
    fn exhausted(&self) -> bool {
        self.started.elapsed() >= self.limit
    }
}
