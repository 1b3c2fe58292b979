//! Progress sinks: whoever renders a run (terminal, UI bridge, logs).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::aggregates::{PhaseTotals, RunState, TableStatus};
use crate::domain::events::{Phase, PipelineEvent, ProgressUpdate};

/// Receives progress from a [`TableResetPipeline`](crate::pipeline::TableResetPipeline).
///
/// Per table, updates arrive as `pending -> running -> completed | failed`
/// and never move backwards. Callbacks run inline on the pipeline's task, so
/// implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_deletion_progress(&self, table: &str, update: &ProgressUpdate);

    fn on_insertion_progress(&self, table: &str, update: &ProgressUpdate);

    fn on_state_change(&self, _state: RunState) {}

    /// Summary notification once every table of a phase was attempted.
    fn on_phase_complete(&self, _phase: Phase, _totals: &PhaseTotals) {}

    /// Entry point used by the pipeline. Fans out to the callbacks above.
    fn on_event(&self, event: &PipelineEvent) { dispatch(self, event) }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn on_deletion_progress(&self, table: &str, update: &ProgressUpdate) { (**self).on_deletion_progress(table, update) }
    fn on_insertion_progress(&self, table: &str, update: &ProgressUpdate) { (**self).on_insertion_progress(table, update) }
    fn on_state_change(&self, state: RunState) { (**self).on_state_change(state) }
    fn on_phase_complete(&self, phase: Phase, totals: &PhaseTotals) { (**self).on_phase_complete(phase, totals) }
    fn on_event(&self, event: &PipelineEvent) { (**self).on_event(event) }
}

/// Routes an aggregate event to the matching sink callback.
pub fn dispatch<S: ProgressSink + ?Sized>(sink: &S, event: &PipelineEvent) {
    match event {
        PipelineEvent::StateChanged { state, .. } => sink.on_state_change(*state),
        PipelineEvent::Progress { phase: Phase::Deletion, table, update, .. } => sink.on_deletion_progress(table.as_str(), update),
        PipelineEvent::Progress { phase: Phase::Insertion, table, update, .. } => sink.on_insertion_progress(table.as_str(), update),
        PipelineEvent::PhaseCompleted { phase, totals, .. } => sink.on_phase_complete(*phase, totals),
    }
}

/// Writes progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl TracingProgressSink {
    fn log(phase: Phase, table: &str, update: &ProgressUpdate) {
        match update.status {
            TableStatus::Pending => tracing::trace!(%phase, table, "pending"),
            TableStatus::Running => tracing::debug!(%phase, table, "{}", update.message),
            TableStatus::Completed => tracing::info!(%phase, table, records = update.records_affected.unwrap_or(0), "{}", update.message),
            TableStatus::Failed => tracing::warn!(%phase, table, error = update.error.as_deref().unwrap_or_default(), "table failed"),
        }
    }
}

impl ProgressSink for TracingProgressSink {
    fn on_deletion_progress(&self, table: &str, update: &ProgressUpdate) { Self::log(Phase::Deletion, table, update) }
    fn on_insertion_progress(&self, table: &str, update: &ProgressUpdate) { Self::log(Phase::Insertion, table, update) }
    fn on_state_change(&self, state: RunState) { tracing::debug!(?state, "run state changed") }
    fn on_phase_complete(&self, phase: Phase, totals: &PhaseTotals) {
        if totals.failed == 0 {
            tracing::info!(%phase, tables = totals.tables, records = totals.records, "phase completed");
        } else {
            tracing::warn!(%phase, tables = totals.tables, failed = totals.failed, records = totals.records, "phase completed with failures");
        }
    }
}

/// Forwards every event into an unbounded channel, for consumers that would
/// rather read a stream than implement callbacks.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

// Events reach the channel only through `on_event`; the per-table callbacks
// are never routed to for this sink.
impl ProgressSink for ChannelProgressSink {
    fn on_deletion_progress(&self, _table: &str, _update: &ProgressUpdate) {}
    fn on_insertion_progress(&self, _table: &str, _update: &ProgressUpdate) {}

    fn on_event(&self, event: &PipelineEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(event.clone());
    }
}
