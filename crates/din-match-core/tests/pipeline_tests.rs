//! End-to-end tests of the job entry points over real stores.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use din_match_core::enrich::{Budget, LookupError, LookupResult};
use din_match_core::jobs::{ScheduleError, ENRICHMENT_JOB};
use din_match_core::models::{IngredientRecord, ProductRecord, StatusRecord};
use din_match_core::registry::{Feed, RegistryError, RegistryResult, REGISTRY_CACHE_NAME};
use din_match_core::{
    CacheLookup, ChunkedCache, Database, JobError, Jobs, KvStore, MemoryStore, Notifier,
    PropertyStore, Registry, RegistrySource, Scheduler, Settings, Table,
};
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingNotifier {
    progress: RefCell<Vec<String>>,
    alerts: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn progress(&self, message: &str) {
        self.progress.borrow_mut().push(message.to_string());
    }

    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingScheduler {
    scheduled: RefCell<Vec<(String, Duration)>>,
    cancelled: RefCell<Vec<String>>,
}

impl Scheduler for RecordingScheduler {
    fn schedule_after(&self, job: &str, delay: Duration) -> Result<(), ScheduleError> {
        self.scheduled.borrow_mut().push((job.to_string(), delay));
        Ok(())
    }

    fn cancel_all(&self, job: &str) -> Result<(), ScheduleError> {
        self.cancelled.borrow_mut().push(job.to_string());
        Ok(())
    }
}

struct FixedSource {
    fetches: Cell<usize>,
    available: bool,
}

impl FixedSource {
    fn new() -> Self {
        Self {
            fetches: Cell::new(0),
            available: true,
        }
    }
}

impl RegistrySource for FixedSource {
    fn products(&self) -> RegistryResult<Vec<ProductRecord>> {
        self.fetches.set(self.fetches.get() + 1);
        if !self.available {
            return Err(RegistryError::Unavailable {
                feed: Feed::Products,
                reason: "HTTP 502".into(),
            });
        }
        Ok(vec![
            product("1", "02242963", "ADVIL"),
            product("2", "02284987", "EXFORGE"),
            product("3", "00000003", "LEGACYDRUG"),
        ])
    }

    fn statuses(&self) -> RegistryResult<Vec<StatusRecord>> {
        Ok(vec![
            status("1", "MARKETED"),
            status("2", "MARKETED"),
            status("3", "CANCELLED POST MARKET"),
        ])
    }

    fn active_ingredients(&self) -> RegistryResult<Vec<IngredientRecord>> {
        Ok(vec![
            ingredient("1", "IBUPROFEN", "200", "MG"),
            ingredient("2", "AMLODIPINE", "5", "MG"),
            ingredient("2", "VALSARTAN", "160", "MG"),
            ingredient("3", "OLDIUM", "1", "G"),
        ])
    }
}

fn product(code: &str, din: &str, name: &str) -> ProductRecord {
    ProductRecord {
        drug_code: code.into(),
        drug_identification_number: din.into(),
        brand_name: name.into(),
    }
}

fn status(code: &str, status: &str) -> StatusRecord {
    StatusRecord {
        drug_code: code.into(),
        status: status.into(),
    }
}

fn ingredient(code: &str, name: &str, strength: &str, unit: &str) -> IngredientRecord {
    IngredientRecord {
        drug_code: code.into(),
        ingredient_name: name.into(),
        strength: strength.into(),
        strength_unit: unit.into(),
    }
}

fn target_table() -> Table {
    let mut table = Table::new(["Type", "Name", "Ingredients", "Strength", "Form", "Country"]);
    table.push_row(["Brand", "Advil", "", "200mg", "Tablet", "CA"]);
    table.push_row(["Generic", "", "Amlodipine;Valsartan", "5mg/160mg", "Tablet", "CA"]);
    table.push_row(["Brand", "Legacydrug", "", "1 g", "Tablet", "CA"]);
    table.push_row(["Brand", "Advil", "", "200mg", "Tablet", "US"]);
    table.push_row(["Herbal", "Echinacea", "", "", "Capsule", "CA"]);
    table
}

struct StepBudget(Cell<usize>);

impl Budget for StepBudget {
    fn exhausted(&self) -> bool {
        match self.0.get() {
            0 => true,
            n => {
                self.0.set(n - 1);
                false
            }
        }
    }
}

#[test]
fn test_matching_writes_identifiers() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    let source = FixedSource::new();

    let mut table = target_table();
    let summary = jobs.start_matching(&mut table, &source).unwrap();

    assert_eq!(summary.rows, 5);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.unmatched, 1);
    assert_eq!(summary.skipped, 2);

    let result = table.column("DIN").unwrap();
    assert_eq!(table.cell(0, result), "02242963");
    assert_eq!(table.cell(1, result), "02284987");
    // Not marketed: resolved to nothing
    assert_eq!(table.cell(2, result), "");
    // Other country and unknown type are left untouched
    assert_eq!(table.cell(3, result), "");
    assert_eq!(table.cell(4, result), "");

    assert!(notifier
        .progress
        .borrow()
        .last()
        .is_some_and(|m| m.starts_with("Matching complete")));
}

#[test]
fn test_matching_reuses_cached_registry() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    let source = FixedSource::new();

    jobs.start_matching(&mut target_table(), &source).unwrap();
    jobs.start_matching(&mut target_table(), &source).unwrap();
    assert_eq!(source.fetches.get(), 1);

    assert!(jobs.clear_cache().unwrap() > 0);
    jobs.start_matching(&mut target_table(), &source).unwrap();
    assert_eq!(source.fetches.get(), 2);
}

#[test]
fn test_matching_keeps_existing_identifiers_unless_overwriting() {
    let mut settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let source = FixedSource::new();

    let mut table = target_table();
    let result = table.ensure_column("DIN");
    table.set_cell(0, result, "manual");

    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    jobs.start_matching(&mut table, &source).unwrap();
    assert_eq!(table.cell(0, result), "manual");

    settings.matching.overwrite_existing = true;
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    jobs.start_matching(&mut table, &source).unwrap();
    assert_eq!(table.cell(0, result), "02242963");
}

#[test]
fn test_matching_missing_column_is_configuration_error() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    let source = FixedSource::new();

    let mut table = Table::new(["Type", "Name", "Strength"]);
    let err = jobs.start_matching(&mut table, &source).unwrap_err();

    assert!(matches!(err, JobError::Configuration(_)));
    assert_eq!(source.fetches.get(), 0);
    assert_eq!(notifier.alerts.borrow().len(), 1);
}

#[test]
fn test_matching_source_unavailable() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);
    let source = FixedSource {
        fetches: Cell::new(0),
        available: false,
    };

    let mut table = target_table();
    let err = jobs.start_matching(&mut table, &source).unwrap_err();

    assert!(matches!(err, JobError::SourceUnavailable(_)));
    assert!(notifier.alerts.borrow()[0].starts_with("Registry unavailable"));
    assert!(store.is_empty());
}

fn enrichment_table(count: usize) -> Table {
    let mut table = Table::new(["Name", "DIN"]);
    for i in 0..count {
        table.push_row([format!("Drug {}", i), format!("0224296{}", i)]);
    }
    table
}

#[test]
fn test_enrichment_suspends_and_resumes() {
    let settings = Settings::default();
    let db = Database::open_in_memory().unwrap();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &db, &db, &notifier, &scheduler);

    let calls = Cell::new(0);
    let lookup = |id: &str| -> LookupResult<Value> {
        calls.set(calls.get() + 1);
        if id.ends_with('3') {
            return Err(LookupError::Status(429));
        }
        Ok(json!({"matches": {"3004-90-10": {"description": "Analgesics"}}}))
    };

    let mut table = enrichment_table(5);
    let first = jobs
        .run_enrichment(&mut table, &lookup, &StepBudget(Cell::new(2)))
        .unwrap();

    assert!(!first.outcome.completed);
    assert_eq!(first.outcome.next_cursor, 2);
    assert_eq!(first.follow_up, Some(settings.enrichment.resume_delay()));
    assert_eq!(
        scheduler.scheduled.borrow().as_slice(),
        &[(ENRICHMENT_JOB.to_string(), Duration::from_secs(60))]
    );
    assert_eq!(
        db.get_property(&settings.enrichment.cursor_key).unwrap().as_deref(),
        Some("2")
    );

    let output = table.column("Secondary Code").unwrap();
    assert_eq!(table.cell(1, output), "3004-90: Analgesics");
    assert_eq!(table.cell(2, output), "");

    // Next invocation sees the table as the host persisted it
    let second = jobs
        .run_enrichment(&mut table, &lookup, &StepBudget(Cell::new(usize::MAX)))
        .unwrap();

    assert!(second.outcome.completed);
    assert_eq!(second.outcome.stats.lookups(), 3);
    assert_eq!(calls.get(), 5);
    assert_eq!(table.cell(3, output), "error: HTTP status 429");
    assert_eq!(db.get_property(&settings.enrichment.cursor_key).unwrap(), None);
    assert_eq!(scheduler.cancelled.borrow().as_slice(), &[ENRICHMENT_JOB.to_string()]);
}

#[test]
fn test_enrichment_reports_progress_every_interval() {
    let mut settings = Settings::default();
    settings.enrichment.progress_interval = 2;
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);

    let lookup = |_: &str| -> LookupResult<Value> { Ok(json!({"matches": {}})) };
    let mut table = enrichment_table(5);
    jobs.run_enrichment(&mut table, &lookup, &StepBudget(Cell::new(usize::MAX)))
        .unwrap();

    assert_eq!(
        notifier.progress.borrow().as_slice(),
        &[
            "Enriched 2 of 5 rows".to_string(),
            "Enriched 4 of 5 rows".to_string(),
            "Enrichment complete: 5 looked up, 0 failed".to_string(),
        ]
    );
}

#[test]
fn test_enrichment_requires_identifier_column() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);

    let lookup = |_: &str| -> LookupResult<Value> { Ok(json!({})) };
    let mut table = Table::new(["Name"]);

    assert!(matches!(
        jobs.start_enrichment(&mut table, &lookup),
        Err(JobError::Configuration(_))
    ));
}

#[test]
fn test_stop_enrichment_clears_cursor() {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let scheduler = RecordingScheduler::default();
    let jobs = Jobs::new(&settings, &store, &store, &notifier, &scheduler);

    store.set_property(&settings.enrichment.cursor_key, "7").unwrap();
    jobs.stop_enrichment().unwrap();

    assert_eq!(store.get_property(&settings.enrichment.cursor_key).unwrap(), None);
    assert_eq!(scheduler.cancelled.borrow().as_slice(), &[ENRICHMENT_JOB.to_string()]);
}

#[test]
fn test_registry_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let settings = Settings::default();
    let ttl = settings.cache.ttl();

    let source = FixedSource::new();
    let expected: Registry = {
        let db = Database::open(&path).unwrap().with_entry_limit(256);
        let notifier = RecordingNotifier::default();
        let scheduler = RecordingScheduler::default();
        let mut small = settings.clone();
        small.cache.max_entry_bytes = 256;
        let jobs = Jobs::new(&small, &db, &db, &notifier, &scheduler);
        jobs.start_matching(&mut target_table(), &source).unwrap();

        let cache = ChunkedCache::new(&db, 256, 0.9);
        cache.load::<Registry>(REGISTRY_CACHE_NAME, ttl).into_option().unwrap()
    };

    let db = Database::open(&path).unwrap();
    let cache = ChunkedCache::new(&db, 256, 0.9);
    match cache.load::<Registry>(REGISTRY_CACHE_NAME, ttl) {
        CacheLookup::Hit(registry) => assert_eq!(registry, expected),
        CacheLookup::Miss(reason) => panic!("expected hit, got {:?}", reason),
    }
    assert!(db.get(&format!("{}:count", REGISTRY_CACHE_NAME)).unwrap().is_some());
}
