//! The four host-facing entry points, wired over injected collaborators.
//!
//! Each entry point is one short-lived invocation. Nothing survives between
//! invocations except what the stores hold: the chunked registry cache and
//! the enrichment cursor.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::cache::ChunkedCache;
use crate::config::Settings;
use crate::enrich::{
    Budget, CheckpointedEnricher, CodeLookup, EnrichmentOutcome, EnrichmentRow, TimeBudget,
};
use crate::models::TargetRecord;
use crate::registry::{RegistryAssembler, RegistrySource, REGISTRY_CACHE_NAME};
use crate::resolver::MatchEngine;
use crate::sheet::{ColumnLayout, Table};
use crate::store::{KvStore, PropertyStore};
use crate::JobResult;

/// Job name handed to the scheduler for follow-up enrichment runs.
pub const ENRICHMENT_JOB: &str = "start_enrichment";

/// User-facing status surface.
pub trait Notifier {
    fn progress(&self, message: &str);
    fn alert(&self, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn progress(&self, message: &str) {
        info!(target: "din_match::notify", "{}", message);
    }

    fn alert(&self, message: &str) {
        warn!(target: "din_match::notify", "{}", message);
    }
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Scheduler rejected {job}: {reason}")]
    Rejected { job: String, reason: String },
}

/// External follow-up scheduler.
pub trait Scheduler {
    fn schedule_after(&self, job: &str, delay: Duration) -> Result<(), ScheduleError>;
    fn cancel_all(&self, job: &str) -> Result<(), ScheduleError>;
}

/// Counts from one matching run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Other country, existing identifier, or unknown type
    pub skipped: usize,
}

/// Result of one enrichment invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub rows: usize,
    pub outcome: EnrichmentOutcome,
    pub follow_up: Option<Duration>,
}

pub struct Jobs<'a> {
    settings: &'a Settings,
    cache_store: &'a dyn KvStore,
    properties: &'a dyn PropertyStore,
    notifier: &'a dyn Notifier,
    scheduler: &'a dyn Scheduler,
}

impl<'a> Jobs<'a> {
    pub fn new(
        settings: &'a Settings,
        cache_store: &'a dyn KvStore,
        properties: &'a dyn PropertyStore,
        notifier: &'a dyn Notifier,
        scheduler: &'a dyn Scheduler,
    ) -> Self {
        Self {
            settings,
            cache_store,
            properties,
            notifier,
            scheduler,
        }
    }

    fn cache(&self) -> ChunkedCache<'a> {
        ChunkedCache::new(
            self.cache_store,
            self.settings.cache.max_entry_bytes,
            self.settings.cache.fragment_ratio,
        )
    }

    fn enricher(&self) -> CheckpointedEnricher<'a> {
        CheckpointedEnricher::new(self.properties, &self.settings.enrichment.cursor_key)
    }

    /// Resolve every eligible row of `table` and write identifiers to the
    /// result column. Unmatched rows get an empty cell.
    pub fn start_matching(
        &self,
        table: &mut Table,
        source: &dyn RegistrySource,
    ) -> JobResult<MatchSummary> {
        let span = info_span!("start_matching", run_id = %Uuid::new_v4());
        let _guard = span.enter();

        let matching = &self.settings.matching;
        let layout = ColumnLayout::resolve(table, &matching.columns).map_err(|e| {
            self.notifier.alert(&e.to_string());
            e
        })?;

        let cache = self.cache();
        let registry = RegistryAssembler::new(source, &cache, self.settings.cache.ttl())
            .load()
            .map_err(|e| {
                self.notifier.alert(&format!("Registry unavailable: {}", e));
                e
            })?;
        let engine = MatchEngine::new(&registry);
        info!(rows = table.len(), eligible = engine.eligible_count(), "matching started");

        let mut summary = MatchSummary {
            rows: table.len(),
            ..MatchSummary::default()
        };

        for row in 0..table.len() {
            if matching.progress_interval > 0 && row > 0 && row % matching.progress_interval == 0 {
                self.notifier
                    .progress(&format!("Matched {} of {} rows", row, summary.rows));
            }

            let Some(record) = TargetRecord::from_row(table, row, &layout) else {
                debug!(row, kind = %table.cell(row, layout.kind), "unknown type, row skipped");
                summary.skipped += 1;
                continue;
            };
            if !record.country_code.eq_ignore_ascii_case(&matching.country_code) {
                debug!(row, country = %record.country_code, "other country, row skipped");
                summary.skipped += 1;
                continue;
            }
            if record.identifier.is_some() && !matching.overwrite_existing {
                summary.skipped += 1;
                continue;
            }

            let id = engine.resolve(&record).unwrap_or_default();
            if id.is_empty() {
                summary.unmatched += 1;
            } else {
                summary.matched += 1;
            }
            table.set_cell(row, layout.result, id);
        }

        info!(
            matched = summary.matched,
            unmatched = summary.unmatched,
            skipped = summary.skipped,
            "matching complete"
        );
        self.notifier.progress(&format!(
            "Matching complete: {} matched, {} unmatched, {} skipped",
            summary.matched, summary.unmatched, summary.skipped
        ));
        Ok(summary)
    }

    /// One time-boxed enrichment invocation under the configured budget.
    pub fn start_enrichment(
        &self,
        table: &mut Table,
        lookup: &dyn CodeLookup,
    ) -> JobResult<EnrichmentSummary> {
        let budget = TimeBudget::start(self.settings.enrichment.budget());
        self.run_enrichment(table, lookup, &budget)
    }

    /// Enrichment invocation under an explicit budget. Suspension schedules
    /// a follow-up; completion cancels pending ones.
    pub fn run_enrichment(
        &self,
        table: &mut Table,
        lookup: &dyn CodeLookup,
        budget: &dyn Budget,
    ) -> JobResult<EnrichmentSummary> {
        let span = info_span!("start_enrichment", run_id = %Uuid::new_v4());
        let _guard = span.enter();

        let settings = &self.settings.enrichment;
        let identifier_col = table.require_column(&settings.identifier_column).map_err(|e| {
            self.notifier.alert(&e.to_string());
            e
        })?;
        let output_col = table.ensure_column(&settings.output_column);

        let mut rows: Vec<EnrichmentRow> = (0..table.len())
            .map(|i| {
                let code = table.cell(i, output_col);
                EnrichmentRow::new(
                    table.cell(i, identifier_col).trim(),
                    (!code.is_empty()).then_some(code),
                )
            })
            .collect();

        let report = |done: usize, total: usize| {
            self.notifier
                .progress(&format!("Enriched {} of {} rows", done, total));
        };
        let outcome = self
            .enricher()
            .with_progress(settings.progress_interval, &report)
            .run(&mut rows, lookup, budget)?;
        for (i, row) in rows.into_iter().enumerate() {
            if let Some(code) = row.secondary_code {
                table.set_cell(i, output_col, code);
            }
        }

        let follow_up = if outcome.completed {
            self.scheduler.cancel_all(ENRICHMENT_JOB)?;
            self.notifier.progress(&format!(
                "Enrichment complete: {} looked up, {} failed",
                outcome.stats.looked_up, outcome.stats.failed
            ));
            None
        } else {
            let delay = settings.resume_delay();
            self.scheduler.schedule_after(ENRICHMENT_JOB, delay)?;
            self.notifier.progress(&format!(
                "Enrichment paused at row {} of {}; resuming in {}s",
                outcome.next_cursor,
                table.len(),
                delay.as_secs()
            ));
            Some(delay)
        };

        Ok(EnrichmentSummary {
            rows: table.len(),
            outcome,
            follow_up,
        })
    }

    /// Clear the cursor and cancel pending follow-ups. A run in progress is
    /// not interrupted.
    pub fn stop_enrichment(&self) -> JobResult<()> {
        let span = info_span!("stop_enrichment", run_id = %Uuid::new_v4());
        let _guard = span.enter();

        self.enricher().reset()?;
        self.scheduler.cancel_all(ENRICHMENT_JOB)?;
        info!("enrichment stopped");
        self.notifier.progress("Enrichment stopped");
        Ok(())
    }

    /// Drop the cached registry so the next matching run refetches it.
    pub fn clear_cache(&self) -> JobResult<usize> {
        let span = info_span!("clear_cache", run_id = %Uuid::new_v4());
        let _guard = span.enter();

        let removed = self.cache().clear(REGISTRY_CACHE_NAME)?;
        info!(removed, "registry cache cleared");
        self.notifier.progress("Registry cache cleared");
        Ok(removed)
    }
}
