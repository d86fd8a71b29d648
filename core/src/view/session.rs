use crate::model::{derive_status, IncidentRecord, IncidentStatus, SeverityTier};
use crate::prelude::{TransportResult, ViewConfig};
use crate::reconcile::{matches, HighlightTracker, IncidentFilters, IngestReport, Reconciler};
use crate::telemetry::{LogManager, MetricsRecorder};
use log::debug;
use std::sync::Arc;
use tokio::time::Instant;

/// Identifies one snapshot request. Only the latest ticket is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied(IngestReport),
    /// The view was torn down or a newer load was requested.
    Dropped,
}

/// One rendered row: the merged record plus its derived presentation state.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRow {
    pub record: IncidentRecord,
    pub severity: SeverityTier,
    pub status: IncidentStatus,
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    pub total: usize,
    pub pending: usize,
    pub acknowledged: usize,
    pub critical: usize,
}

/// State owned by one mounted view. Never shared between views.
pub struct IncidentView {
    config: ViewConfig,
    reconciler: Reconciler,
    highlights: HighlightTracker,
    filters: IncidentFilters,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
    generation: u64,
    mounted: bool,
}

impl IncidentView {
    pub fn new(name: &str, config: ViewConfig, filters: IncidentFilters) -> Self {
        let logger = LogManager::new(name);
        logger.record(&format!("mounted with capacity {}", config.capacity));
        Self {
            reconciler: Reconciler::new(config.reconciler()),
            highlights: HighlightTracker::new(config.highlight()),
            config,
            filters,
            metrics: Arc::new(MetricsRecorder::new()),
            logger,
            generation: 0,
            mounted: true,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn filters(&self) -> &IncidentFilters {
        &self.filters
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn len(&self) -> usize {
        self.reconciler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconciler.is_empty()
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket(self.generation)
    }

    /// Replaces the filters; loads started before this are superseded.
    pub fn set_filters(&mut self, filters: IncidentFilters) -> LoadTicket {
        self.filters = filters;
        self.begin_load()
    }

    /// Applies a finished load. A failure empties the snapshot members, keeps
    /// live-derived records and is handed back to the caller.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: TransportResult<Vec<IncidentRecord>>,
    ) -> TransportResult<LoadOutcome> {
        if !self.mounted || ticket.0 != self.generation {
            debug!(
                "[{}] dropping load {} (current {}, mounted {})",
                self.logger.scope(),
                ticket.0,
                self.generation,
                self.mounted
            );
            return Ok(LoadOutcome::Dropped);
        }
        match result {
            Ok(records) => {
                let count = records.len();
                let report = self.reconciler.ingest_snapshot(records);
                self.metrics.record_snapshot();
                self.metrics.record_evicted(report.evicted.len());
                self.forget_evicted(&report);
                self.logger.record(&format!(
                    "snapshot applied: {} rows, {} visible",
                    count,
                    self.reconciler.len()
                ));
                Ok(LoadOutcome::Applied(report))
            }
            Err(err) => {
                let report = self.reconciler.ingest_snapshot(Vec::new());
                self.forget_evicted(&report);
                self.metrics.record_snapshot_failure();
                self.logger.warn(&format!("snapshot load failed: {}", err));
                Err(err)
            }
        }
    }

    pub fn on_live(&mut self, record: IncidentRecord) -> bool {
        self.on_live_at(record, Instant::now())
    }

    /// Merges one live record and marks it as just arrived. Ignored once unmounted.
    pub fn on_live_at(&mut self, record: IncidentRecord, now: Instant) -> bool {
        if !self.mounted {
            return false;
        }
        let id = record.id.clone();
        let report = self.reconciler.ingest_live(record);
        self.metrics.record_live();
        self.metrics.record_evicted(report.evicted.len());
        self.forget_evicted(&report);
        if report.retained(&id) {
            self.highlights.mark_new_at(id, now);
        }
        true
    }

    pub fn sweep(&mut self, now: Instant) -> usize {
        self.highlights.sweep(now)
    }

    pub fn rows(&self) -> Vec<IncidentRow> {
        self.rows_at(Instant::now())
    }

    /// Reconciled records passing the active filters, most recent first.
    pub fn rows_at(&self, now: Instant) -> Vec<IncidentRow> {
        self.reconciler
            .records()
            .filter(|record| matches(record, &self.filters))
            .map(|record| IncidentRow {
                severity: record.severity_tier(),
                status: derive_status(record),
                is_new: self.highlights.is_new_at(&record.id, now),
                record: record.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> ViewStats {
        self.reconciler
            .records()
            .fold(ViewStats::default(), |mut stats, record| {
                stats.total += 1;
                match derive_status(record) {
                    IncidentStatus::New => stats.pending += 1,
                    IncidentStatus::Acknowledged => stats.acknowledged += 1,
                }
                if record.severity_tier() == SeverityTier::Critical {
                    stats.critical += 1;
                }
                stats
            })
    }

    /// Tears the view down. Later loads and live records apply to nothing.
    pub fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            self.highlights.clear();
            self.logger.record("unmounted");
        }
    }

    fn forget_evicted(&mut self, report: &IngestReport) {
        for id in &report.evicted {
            self.highlights.forget(id);
        }
    }
}
