// 🚚 Import Runner - four sequential source passes over one cache
//
// Per run:   reset (optional) → preload disease → passes in import order
// Per pass:  parse → map → persist + reconcile caches → rebind cases →
//            save cases in chunks
// A pass that fails is logged and recorded; the next pass still runs.

use crate::cache::CacheManager;
use crate::config::ImportConfig;
use crate::db::{EntityCounts, EntityStore};
use crate::entities::{shared, Disease, DiseaseCase};
use crate::error::{EtlError, EtlResult};
use crate::mapper::{CovidCompleteMapper, FullGroupedMapper, RowMapper, UsaCountyMapper, WorldometerMapper};
use crate::parser::{
    parse_file, CovidCompleteParser, FullGroupedParser, SourceKind, SourceParser, UsaCountyParser,
    WorldometerParser,
};
use crate::persistence::PersistenceHelper;
use anyhow::anyhow;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

// ============================================================================
// REPORTING TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PassStatus {
    Completed,
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub source: SourceKind,
    pub status: PassStatus,
    pub lines_read: usize,
    pub line_errors: usize,
    pub duplicates: usize,
    pub skipped_rows: usize,
    pub cases_saved: usize,
    pub duration: Duration,
}

impl PassReport {
    fn new(source: SourceKind) -> Self {
        PassReport {
            source,
            status: PassStatus::Completed,
            lines_read: 0,
            line_errors: 0,
            duplicates: 0,
            skipped_rows: 0,
            cases_saved: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PassStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub passes: Vec<PassReport>,
    pub counts: EntityCounts,
    pub duration: Duration,
}

impl RunSummary {
    pub fn failed_sources(&self) -> Vec<SourceKind> {
        self.passes.iter().filter(|p| !p.is_ok()).map(|p| p.source).collect()
    }

    pub fn total_cases_saved(&self) -> usize {
        self.passes.iter().map(|p| p.cases_saved).sum()
    }

    pub fn pass(&self, source: SourceKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.source == source)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import run {}", self.run_id)?;
        writeln!(
            f,
            "{:<26} {:>9} {:>7} {:>6} {:>8} {:>10} {:>9}  {}",
            "SOURCE", "LINES", "ERRORS", "DUPES", "SKIPPED", "CASES", "MS", "STATUS"
        )?;
        writeln!(f, "{}", "─".repeat(96))?;

        for pass in &self.passes {
            let status = match &pass.status {
                PassStatus::Completed => "✅ ok".to_string(),
                PassStatus::Failed { kind, message } => format!("❌ {}: {}", kind, message),
            };
            writeln!(
                f,
                "{:<26} {:>9} {:>7} {:>6} {:>8} {:>10} {:>9}  {}",
                pass.source.name(),
                pass.lines_read,
                pass.line_errors,
                pass.duplicates,
                pass.skipped_rows,
                pass.cases_saved,
                pass.duration.as_millis(),
                status
            )?;
        }

        writeln!(f, "{}", "─".repeat(96))?;
        writeln!(
            f,
            "countries={} regions={} locations={} diseases={} cases={}  ({} ms)",
            self.counts.countries,
            self.counts.regions,
            self.counts.locations,
            self.counts.diseases,
            self.counts.disease_cases,
            self.duration.as_millis()
        )
    }
}

// ============================================================================
// IMPORT RUNNER
// ============================================================================

/// Owns the cache for exactly one run; borrows the store
pub struct ImportRunner<'s> {
    config: ImportConfig,
    store: &'s mut dyn EntityStore,
    cache: CacheManager,
}

impl<'s> ImportRunner<'s> {
    pub fn new(config: ImportConfig, store: &'s mut dyn EntityStore) -> Self {
        ImportRunner {
            config,
            store,
            cache: CacheManager::new(),
        }
    }

    /// Reset and disease preload failures abort the run; source failures do not
    pub fn run(mut self) -> EtlResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("import_run", run_id = %run_id);
        let _guard = span.enter();
        let started = Instant::now();

        info!(data_dir = %self.config.data_dir.display(), "import started");

        if self.config.reset_before_import {
            self.store
                .delete_all()
                .map_err(|e| EtlError::persistence("resetting tables", e))?;
        }

        self.preload_disease()?;

        let mut passes = Vec::with_capacity(SourceKind::IMPORT_ORDER.len());
        for kind in SourceKind::IMPORT_ORDER {
            passes.push(self.import_source(kind));
        }

        let counts = self
            .store
            .counts()
            .map_err(|e| EtlError::persistence("counting rows", e))?;

        let summary = RunSummary {
            run_id,
            passes,
            counts,
            duration: started.elapsed(),
        };
        info!(
            cases = summary.total_cases_saved(),
            failed = summary.failed_sources().len(),
            "import finished"
        );
        Ok(summary)
    }

    fn preload_disease(&mut self) -> EtlResult<()> {
        let name = self.config.disease_name.trim().to_string();

        let existing = self
            .store
            .find_disease_by_name(&name)
            .map_err(|e| EtlError::persistence("loading disease", e))?;

        let disease = match existing {
            Some(disease) => disease,
            None => self
                .store
                .save_diseases(&[shared(Disease::new(name.clone()))])
                .map_err(|e| EtlError::persistence("creating disease", e))?
                .into_iter()
                .next()
                .ok_or_else(|| EtlError::MissingDisease(name.clone()))?,
        };

        debug!(disease = %name, id = ?disease.borrow().id, "disease preloaded");
        self.cache.add_disease(disease);
        Ok(())
    }

    /// Run one source pass and turn its outcome into a report
    pub fn import_source(&mut self, kind: SourceKind) -> PassReport {
        let span = info_span!("source", file = kind.file_name());
        let _guard = span.enter();
        let started = Instant::now();
        let mut report = PassReport::new(kind);
        let disease_name = self.config.disease_name.trim().to_string();

        let result = match kind {
            SourceKind::Worldometer => self.run_pass(&WorldometerParser, &WorldometerMapper, &mut report),
            SourceKind::CovidComplete => self.run_pass(
                &CovidCompleteParser,
                &CovidCompleteMapper { disease_name },
                &mut report,
            ),
            SourceKind::FullGrouped => self.run_pass(
                &FullGroupedParser,
                &FullGroupedMapper { disease_name },
                &mut report,
            ),
            SourceKind::UsaCounty => self.run_pass(
                &UsaCountyParser,
                &UsaCountyMapper { disease_name },
                &mut report,
            ),
        };

        if let Err(err) = result {
            error!(source = kind.name(), error = %err, "source import failed, continuing with next source");
            report.status = PassStatus::Failed {
                kind: err.kind().to_string(),
                message: err.to_string(),
            };
        }

        report.duration = started.elapsed();
        report
    }

    fn run_pass<P, M>(&mut self, parser: &P, mapper: &M, report: &mut PassReport) -> EtlResult<()>
    where
        P: SourceParser,
        M: RowMapper<Row = P::Row>,
    {
        let path = self.config.source_path(parser.source_kind().file_name());
        let outcome = parse_file(parser, &path)?;
        report.lines_read = outcome.lines_read;
        report.line_errors = outcome.line_errors;
        report.duplicates = outcome.duplicates;

        let mut cases = Vec::new();
        for row in &outcome.rows {
            match mapper.map(row, &mut self.cache)? {
                Some(case) => cases.push(case),
                None => report.skipped_rows += 1,
            }
        }

        PersistenceHelper::persist_cached_entities(&mut self.cache, &mut *self.store)?;

        self.rebind_cases(&mut cases)?;
        report.cases_saved = self.save_cases(&cases)?;

        info!(
            rows = outcome.rows.len(),
            cases = report.cases_saved,
            skipped = report.skipped_rows,
            "source imported"
        );
        Ok(())
    }

    /// Point every case at the managed disease/location with the same business key
    fn rebind_cases(&self, cases: &mut [DiseaseCase]) -> EtlResult<()> {
        for case in cases.iter_mut() {
            let disease = self.cache.managed_disease_for(&case.disease.borrow());
            case.disease = disease.ok_or_else(|| EtlError::MissingDisease(case.disease.borrow().name.clone()))?;

            let location = self.cache.managed_location_for(&case.location.borrow());
            case.location = location.ok_or_else(|| {
                EtlError::persistence(
                    "rebinding cases",
                    anyhow!("location '{}' missing from cache", case.location.borrow().key()),
                )
            })?;
        }
        Ok(())
    }

    fn save_cases(&mut self, cases: &[DiseaseCase]) -> EtlResult<usize> {
        let mut saved = 0;
        for chunk in cases.chunks(self.config.case_chunk_size.max(1)) {
            saved += self
                .store
                .save_disease_cases(chunk)
                .map_err(|e| EtlError::persistence("saving disease cases", e))?;
            debug!(saved, total = cases.len(), "case chunk committed");
        }
        Ok(saved)
    }
}

// ============================================================================
// TESTS
// ============================================================================
