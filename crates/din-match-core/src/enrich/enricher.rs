//! Resumable enrichment loop.
//!
//! Each invocation is a fresh process. The only memory between invocations
//! is the cursor property:
//!
//! ```text
//!   Idle ──run──► Running ──budget spent──► Suspended { cursor }
//!                    ▲                            │
//!                    └────── scheduler re-runs ───┘
//!   Running ──rows exhausted──► Idle (cursor deleted)
//! ```

use tracing::{debug, info, warn};

use crate::store::PropertyStore;

use super::{error_marker, format_secondary_codes, Budget, CodeLookup, EnrichResult};

/// A row to enrich: its resolved identifier and current secondary code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichmentRow {
    pub identifier: String,
    pub secondary_code: Option<String>,
}

impl EnrichmentRow {
    pub fn new(identifier: &str, secondary_code: Option<&str>) -> Self {
        Self {
            identifier: identifier.to_string(),
            secondary_code: secondary_code.map(str::to_string),
        }
    }

    /// Holds an identifier but no secondary code yet.
    pub fn needs_lookup(&self) -> bool {
        let has_code = self
            .secondary_code
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty());
        !has_code && !self.identifier.trim().is_empty()
    }
}

/// Persisted state between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    /// No checkpoint; the next run starts at row 0
    Idle,
    /// A previous run stopped before `cursor`
    Suspended { cursor: usize },
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    /// Lookups that produced a code string (including "no matches")
    pub looked_up: usize,
    /// Lookups recorded as an error marker
    pub failed: usize,
    /// Rows visited that needed no lookup
    pub skipped: usize,
}

impl EnrichmentStats {
    pub fn lookups(&self) -> usize {
        self.looked_up + self.failed
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub completed: bool,
    /// First row the next invocation will visit (row count when completed)
    pub next_cursor: usize,
    pub stats: EnrichmentStats,
}

/// Called with (rows visited so far, total rows).
pub type ProgressFn<'a> = dyn Fn(usize, usize) + 'a;

/// Enrichment loop with a cursor persisted in a [`PropertyStore`].
pub struct CheckpointedEnricher<'a> {
    cursor_store: &'a dyn PropertyStore,
    cursor_key: String,
    progress: Option<(usize, &'a ProgressFn<'a>)>,
}

impl<'a> CheckpointedEnricher<'a> {
    pub fn new(cursor_store: &'a dyn PropertyStore, cursor_key: &str) -> Self {
        Self {
            cursor_store,
            cursor_key: cursor_key.to_string(),
            progress: None,
        }
    }

    /// Report progress every `interval` visited rows. Zero disables reporting.
    pub fn with_progress(mut self, interval: usize, report: &'a ProgressFn<'a>) -> Self {
        self.progress = (interval > 0).then_some((interval, report));
        self
    }

    /// Current persisted state.
    pub fn state(&self) -> EnrichResult<EnrichmentState> {
        Ok(match self.read_cursor()? {
            Some(cursor) => EnrichmentState::Suspended { cursor },
            None => EnrichmentState::Idle,
        })
    }

    /// Forget any checkpoint.
    pub fn reset(&self) -> EnrichResult<()> {
        self.cursor_store.delete_property(&self.cursor_key)?;
        Ok(())
    }

    /// Enrich `rows` from the persisted cursor until done or out of budget.
    ///
    /// The budget is checked before every row, so a suspended run never
    /// starts a lookup it cannot finish inside the same invocation.
    pub fn run(
        &self,
        rows: &mut [EnrichmentRow],
        lookup: &dyn CodeLookup,
        budget: &dyn Budget,
    ) -> EnrichResult<EnrichmentOutcome> {
        let total = rows.len();
        let start = self.read_cursor()?.unwrap_or(0);
        if start > 0 {
            info!(cursor = start, total, "resuming enrichment");
        }

        let mut stats = EnrichmentStats::default();
        for (i, row) in rows.iter_mut().enumerate().skip(start) {
            if let Some((interval, report)) = self.progress {
                if i > start && (i - start) % interval == 0 {
                    report(i, total);
                }
            }

            if budget.exhausted() {
                self.cursor_store
                    .set_property(&self.cursor_key, &i.to_string())?;
                info!(cursor = i, total, "enrichment budget spent, checkpointed");
                return Ok(EnrichmentOutcome {
                    completed: false,
                    next_cursor: i,
                    stats,
                });
            }

            if !row.needs_lookup() {
                stats.skipped += 1;
                continue;
            }

            let code = match lookup
                .lookup(&row.identifier)
                .and_then(|response| format_secondary_codes(&response))
            {
                Ok(code) => {
                    stats.looked_up += 1;
                    debug!(row = i, identifier = %row.identifier, "secondary code found");
                    code
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(row = i, identifier = %row.identifier, error = %e, "secondary lookup failed");
                    error_marker(&e)
                }
            };
            row.secondary_code = Some(code);
        }

        self.reset()?;
        info!(
            looked_up = stats.looked_up,
            failed = stats.failed,
            skipped = stats.skipped,
            "enrichment complete"
        );
        Ok(EnrichmentOutcome {
            completed: true,
            next_cursor: total,
            stats,
        })
    }

    fn read_cursor(&self) -> EnrichResult<Option<usize>> {
        let raw = self.cursor_store.get_property(&self.cursor_key)?;
        Ok(raw.and_then(|value| match value.trim().parse::<usize>() {
            Ok(cursor) => Some(cursor),
            Err(_) => {
                warn!(value = %value, "ignoring unreadable enrichment cursor");
                None
            }
        }))
    }
}
