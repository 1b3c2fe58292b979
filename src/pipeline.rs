//! The two-phase table reset pipeline.
//!
//! Deletion walks the deletion list and empties each table; insertion walks
//! the insertion list and reloads seed rows from a source folder. Each table
//! gets exactly one awaited endpoint call per phase, strictly in list order.
//! A failing table is recorded and the phase moves on: there is no rollback,
//! no retry, no cancellation, and no deadline beyond the endpoint's own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{EndpointError, SeedEndpoint};
use crate::domain::aggregates::{ensure_unique, PhaseProgress, PhaseTotals, ResetRun, RunError, RunState};
use crate::domain::events::Phase;
use crate::domain::value_objects::{SourceFolder, TableName};
use crate::error::Result;
use crate::sink::ProgressSink;
use crate::tables::TableOrder;

/// Delay between `deletion-complete` and the start of insertion in a full run,
/// so sinks get to show the finished deletion list.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

const INTERRUPTED: &str = "Interrupted before this table finished";

/// Read-only copy of a run's progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub state: RunState,
    pub source: Option<SourceFolder>,
    pub deletion: Vec<PhaseProgress>,
    pub insertion: Vec<PhaseProgress>,
}

impl RunSnapshot {
    pub fn failed_tables(&self, phase: Phase) -> impl Iterator<Item = &PhaseProgress> {
        let entries = match phase { Phase::Deletion => &self.deletion, Phase::Insertion => &self.insertion };
        entries.iter().filter(|e| e.error.is_some())
    }
}

/// Totals of a full delete-then-insert run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub deletion: PhaseTotals,
    pub insertion: PhaseTotals,
    pub elapsed_ms: u64,
}

enum PhaseCall<'a> {
    Delete,
    Insert(&'a SourceFolder),
}

impl PhaseCall<'_> {
    fn phase(&self) -> Phase {
        match self { PhaseCall::Delete => Phase::Deletion, PhaseCall::Insert(_) => Phase::Insertion }
    }
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives reset runs against a [`SeedEndpoint`] and reports to a [`ProgressSink`].
///
/// Only one phase or run executes at a time; a start request that arrives
/// while one is in flight is ignored and returns `Ok(None)`.
pub struct TableResetPipeline<E, S> {
    endpoint: E,
    sink: S,
    settle_delay: Duration,
    in_progress: AtomicBool,
    run: Mutex<ResetRun>,
}

impl<E: SeedEndpoint, S: ProgressSink> TableResetPipeline<E, S> {
    pub fn new(endpoint: E, sink: S) -> Self {
        Self { endpoint, sink, settle_delay: DEFAULT_SETTLE_DELAY, in_progress: AtomicBool::new(false), run: Mutex::new(ResetRun::new()) }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &E { &self.endpoint }
    pub fn sink(&self) -> &S { &self.sink }

    pub fn is_running(&self) -> bool { self.in_progress.load(Ordering::Acquire) }

    pub async fn state(&self) -> RunState { self.run.lock().await.state() }

    pub async fn snapshot(&self) -> RunSnapshot {
        let run = self.run.lock().await;
        RunSnapshot {
            run_id: run.id(),
            state: run.state(),
            source: run.source().cloned(),
            deletion: run.progress(Phase::Deletion).to_vec(),
            insertion: run.progress(Phase::Insertion).to_vec(),
        }
    }

    /// Deletes every row of every table in `tables`, in order.
    ///
    /// Returns `Ok(None)` without touching the endpoint when another phase is
    /// already running.
    ///
    /// # Errors
    ///
    /// Returns an error if `tables` lists a table twice. No endpoint call is
    /// made in that case.
    pub async fn run_deletion_phase(&self, tables: &[TableName]) -> Result<Option<PhaseTotals>> {
        let Some(_guard) = self.start().await else { return Ok(None) };
        self.drive(tables, PhaseCall::Delete).await.map(Some)
    }

    /// Reloads seed rows from `source` into every table in `tables`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `tables` lists a table twice.
    pub async fn run_insertion_phase(&self, tables: &[TableName], source: &SourceFolder) -> Result<Option<PhaseTotals>> {
        let Some(_guard) = self.start().await else { return Ok(None) };
        self.drive(tables, PhaseCall::Insert(source)).await.map(Some)
    }

    /// Full run: deletion, a settle delay, then insertion from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if either list of `order` contains duplicates. Both
    /// lists are checked before the first endpoint call.
    pub async fn run(&self, order: &TableOrder, source: &SourceFolder) -> Result<Option<RunSummary>> {
        let Some(_guard) = self.start().await else { return Ok(None) };
        ensure_unique(order.deletion())?;
        ensure_unique(order.insertion())?;
        let started = Instant::now();

        let deletion = self.drive(order.deletion(), PhaseCall::Delete).await?;
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let insertion = self.drive(order.insertion(), PhaseCall::Insert(source)).await?;

        let run_id = self.run.lock().await.id();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(%run_id, deleted = deletion.records, inserted = insertion.records, elapsed_ms, "reset run finished");
        Ok(Some(RunSummary { run_id, deletion, insertion, elapsed_ms }))
    }

    /// Clears progress and returns to `idle`. Ignored (returns `false`) while
    /// a phase is running.
    pub async fn reset(&self) -> bool {
        let Some(_guard) = self.start().await else { return false };
        self.apply(ResetRun::reset).await.is_ok()
    }

    /// Takes the in-progress guard. Holding it proves no phase is in flight,
    /// so a run still marked active was left behind by a dropped future and
    /// is closed before anything else happens.
    async fn start(&self) -> Option<RunGuard<'_>> {
        let guard = self.try_start()?;
        if matches!(self.apply(|run| Ok(run.abandon(INTERRUPTED))).await, Ok(true)) {
            tracing::warn!("previous phase was interrupted, unfinished tables marked failed");
        }
        Some(guard)
    }

    fn try_start(&self) -> Option<RunGuard<'_>> {
        match self.in_progress.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Some(RunGuard(&self.in_progress)),
            Err(_) => {
                tracing::debug!("reset pipeline busy, start request ignored");
                None
            }
        }
    }

    async fn drive(&self, tables: &[TableName], call: PhaseCall<'_>) -> Result<PhaseTotals> {
        let phase = call.phase();
        let started = Instant::now();
        match &call {
            PhaseCall::Delete => self.apply(|run| run.begin_deletion(tables)).await?,
            PhaseCall::Insert(source) => self.apply(|run| run.begin_insertion(tables, (*source).clone())).await?,
        }
        tracing::info!(%phase, tables = tables.len(), "phase started");

        for table in tables {
            self.apply(|run| run.mark_running(phase, table)).await?;
            match self.call(&call, table).await {
                Ok(records) => self.apply(|run| run.mark_completed(phase, table, records)).await?,
                Err(e) => {
                    tracing::warn!(%phase, %table, error = %e, "table operation failed, continuing");
                    self.apply(|run| run.mark_failed(phase, table, e.to_string())).await?
                }
            }
        }

        let totals = match phase {
            Phase::Deletion => self.apply(ResetRun::finish_deletion).await?,
            Phase::Insertion => self.apply(ResetRun::finish_insertion).await?,
        };
        tracing::info!(
            %phase,
            succeeded = totals.succeeded,
            failed = totals.failed,
            records = totals.records,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "phase finished"
        );
        Ok(totals)
    }

    async fn call(&self, call: &PhaseCall<'_>, table: &TableName) -> std::result::Result<u64, EndpointError> {
        match call {
            PhaseCall::Delete => self.endpoint.delete_rows(table).await,
            PhaseCall::Insert(source) => self.endpoint.insert_rows(table, source).await,
        }
    }

    /// Mutates the run under the lock, then hands the resulting events to the
    /// sink after the lock is released.
    async fn apply<T>(&self, f: impl FnOnce(&mut ResetRun) -> std::result::Result<T, RunError>) -> Result<T> {
        let (out, events) = {
            let mut run = self.run.lock().await;
            let out = f(&mut *run);
            (out, run.take_events())
        };
        for event in &events {
            self.sink.on_event(event);
        }
        Ok(out?)
    }
}
