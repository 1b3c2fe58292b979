//! Reset Run Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use crate::domain::aggregates::progress::{PhaseProgress, PhaseTotals, TableStatus};
use crate::domain::events::{Phase, PipelineEvent};
use crate::domain::value_objects::{SourceFolder, TableName};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState { #[default] Idle, Deleting, DeletionComplete, Inserting, Complete }

impl RunState {
    pub fn is_running(&self) -> bool { matches!(self, Self::Deleting | Self::Inserting) }
}

/// State of one reset run: the run-state machine plus one ordered progress
/// list per phase. All mutation goes through methods that also record the
/// event a progress sink should see.
#[derive(Clone, Debug)]
pub struct ResetRun {
    id: Uuid,
    state: RunState,
    deletion: Vec<PhaseProgress>,
    insertion: Vec<PhaseProgress>,
    source: Option<SourceFolder>,
    updated_at: DateTime<Utc>,
    events: Vec<PipelineEvent>,
}

impl Default for ResetRun { fn default() -> Self { Self::new() } }

impl ResetRun {
    pub fn new() -> Self {
        Self { id: Uuid::now_v7(), state: RunState::Idle, deletion: vec![], insertion: vec![], source: None, updated_at: Utc::now(), events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn state(&self) -> RunState { self.state }
    pub fn source(&self) -> Option<&SourceFolder> { self.source.as_ref() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn progress(&self, phase: Phase) -> &[PhaseProgress] {
        match phase { Phase::Deletion => &self.deletion, Phase::Insertion => &self.insertion }
    }
    pub fn totals(&self, phase: Phase) -> PhaseTotals { PhaseTotals::from_progress(self.progress(phase)) }

    /// Starts a fresh run at the deletion phase. Previous progress is discarded.
    pub fn begin_deletion(&mut self, tables: &[TableName]) -> Result<(), RunError> {
        if self.state.is_running() { return Err(RunError::AlreadyRunning(self.state)); }
        ensure_unique(tables)?;
        self.id = Uuid::now_v7();
        self.source = None;
        self.insertion.clear();
        self.deletion = tables.iter().cloned().map(PhaseProgress::pending).collect();
        self.set_state(RunState::Deleting);
        self.raise_pending(Phase::Deletion);
        Ok(())
    }

    pub fn finish_deletion(&mut self) -> Result<PhaseTotals, RunError> {
        self.finish_phase(Phase::Deletion, RunState::Deleting, RunState::DeletionComplete)
    }

    /// Starts the insertion phase. After a completed deletion this continues the
    /// same run; from any other resting state it starts a new one.
    pub fn begin_insertion(&mut self, tables: &[TableName], source: SourceFolder) -> Result<(), RunError> {
        if self.state.is_running() { return Err(RunError::AlreadyRunning(self.state)); }
        ensure_unique(tables)?;
        if self.state != RunState::DeletionComplete {
            self.id = Uuid::now_v7();
            self.deletion.clear();
        }
        self.source = Some(source);
        self.insertion = tables.iter().cloned().map(PhaseProgress::pending).collect();
        self.set_state(RunState::Inserting);
        self.raise_pending(Phase::Insertion);
        Ok(())
    }

    pub fn finish_insertion(&mut self) -> Result<PhaseTotals, RunError> {
        self.finish_phase(Phase::Insertion, RunState::Inserting, RunState::Complete)
    }

    pub fn mark_running(&mut self, phase: Phase, table: &TableName) -> Result<(), RunError> {
        self.transition(phase, table, TableStatus::Running, |entry| {
            entry.message = phase.running_message().to_string();
        })
    }

    pub fn mark_completed(&mut self, phase: Phase, table: &TableName, records: u64) -> Result<(), RunError> {
        self.transition(phase, table, TableStatus::Completed, |entry| {
            entry.records_affected = Some(records);
            entry.message = phase.completed_message(records);
        })
    }

    pub fn mark_failed(&mut self, phase: Phase, table: &TableName, error: impl Into<String>) -> Result<(), RunError> {
        let error = error.into();
        self.transition(phase, table, TableStatus::Failed, |entry| {
            entry.message = error.clone();
            entry.error = Some(error);
        })
    }

    /// Back to `idle` with empty progress lists.
    pub fn reset(&mut self) -> Result<(), RunError> {
        if self.state.is_running() { return Err(RunError::AlreadyRunning(self.state)); }
        self.deletion.clear();
        self.insertion.clear();
        self.source = None;
        self.set_state(RunState::Idle);
        Ok(())
    }

    /// Closes a phase whose driver went away part way through. Unfinished
    /// tables are marked failed with `reason` and the phase reaches its
    /// terminal state. Returns `false` when no phase was active.
    pub fn abandon(&mut self, reason: &str) -> bool {
        let (phase, terminal) = match self.state {
            RunState::Deleting => (Phase::Deletion, RunState::DeletionComplete),
            RunState::Inserting => (Phase::Insertion, RunState::Complete),
            _ => return false,
        };
        let id = self.id;
        let entries = match phase { Phase::Deletion => &mut self.deletion, Phase::Insertion => &mut self.insertion };
        let mut closed = vec![];
        for entry in entries.iter_mut().filter(|e| !e.status.is_terminal()) {
            entry.status = TableStatus::Failed;
            entry.message = reason.to_string();
            entry.error = Some(reason.to_string());
            entry.updated_at = Utc::now();
            closed.push(PipelineEvent::Progress { run_id: id, phase, table: entry.table.clone(), update: entry.update() });
        }
        self.events.extend(closed);
        let totals = self.totals(phase);
        self.raise_event(PipelineEvent::PhaseCompleted { run_id: id, phase, totals });
        self.set_state(terminal);
        true
    }

    pub fn take_events(&mut self) -> Vec<PipelineEvent> { std::mem::take(&mut self.events) }

    fn transition(&mut self, phase: Phase, table: &TableName, next: TableStatus, apply: impl FnOnce(&mut PhaseProgress)) -> Result<(), RunError> {
        let expected = match phase { Phase::Deletion => RunState::Deleting, Phase::Insertion => RunState::Inserting };
        if self.state != expected { return Err(RunError::PhaseNotActive(phase)); }
        let entries = match phase { Phase::Deletion => &mut self.deletion, Phase::Insertion => &mut self.insertion };
        let entry = entries.iter_mut().find(|e| &e.table == table).ok_or_else(|| RunError::UnknownTable(table.clone()))?;
        if !entry.status.can_transition_to(next) {
            return Err(RunError::InvalidTransition { table: table.clone(), from: entry.status, to: next });
        }
        entry.status = next;
        apply(entry);
        entry.updated_at = Utc::now();
        let event = PipelineEvent::Progress { run_id: self.id, phase, table: entry.table.clone(), update: entry.update() };
        self.raise_event(event);
        self.touch();
        Ok(())
    }

    fn finish_phase(&mut self, phase: Phase, from: RunState, to: RunState) -> Result<PhaseTotals, RunError> {
        if self.state != from { return Err(RunError::PhaseNotActive(phase)); }
        if let Some(open) = self.progress(phase).iter().find(|e| !e.status.is_terminal()) {
            return Err(RunError::PhaseIncomplete(open.table.clone()));
        }
        let totals = self.totals(phase);
        self.raise_event(PipelineEvent::PhaseCompleted { run_id: self.id, phase, totals });
        self.set_state(to);
        Ok(totals)
    }

    fn raise_pending(&mut self, phase: Phase) {
        let id = self.id;
        let pending: Vec<PipelineEvent> = self.progress(phase).iter()
            .map(|e| PipelineEvent::Progress { run_id: id, phase, table: e.table.clone(), update: e.update() })
            .collect();
        self.events.extend(pending);
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.raise_event(PipelineEvent::StateChanged { run_id: self.id, state });
        self.touch();
    }

    fn raise_event(&mut self, e: PipelineEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Rejects a table list that names the same table twice.
pub fn ensure_unique(tables: &[TableName]) -> Result<(), RunError> {
    let mut seen = HashSet::with_capacity(tables.len());
    match tables.iter().find(|t| !seen.insert(*t)) {
        Some(dup) => Err(RunError::DuplicateTable(dup.clone())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    AlreadyRunning(RunState),
    DuplicateTable(TableName),
    UnknownTable(TableName),
    PhaseNotActive(Phase),
    PhaseIncomplete(TableName),
    InvalidTransition { table: TableName, from: TableStatus, to: TableStatus },
}
impl std::error::Error for RunError {}
impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning(s) => write!(f, "run already in progress ({s:?})"),
            Self::DuplicateTable(t) => write!(f, "table {t} listed more than once"),
            Self::UnknownTable(t) => write!(f, "table {t} is not part of this phase"),
            Self::PhaseNotActive(p) => write!(f, "{p} phase is not active"),
            Self::PhaseIncomplete(t) => write!(f, "table {t} has not finished"),
            Self::InvalidTransition { table, from, to } => write!(f, "table {table} cannot move from {from:?} to {to:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<TableName> { list.iter().map(|n| TableName::new(*n).unwrap()).collect() }

    #[test]
    fn test_run_workflow() {
        let tables = names(&["orderItems", "orders"]);
        let mut run = ResetRun::new();
        run.begin_deletion(&tables).unwrap();
        assert_eq!(run.state(), RunState::Deleting);
        assert!(run.progress(Phase::Deletion).iter().all(|e| e.status == TableStatus::Pending));

        run.mark_running(Phase::Deletion, &tables[0]).unwrap();
        run.mark_completed(Phase::Deletion, &tables[0], 5).unwrap();
        run.mark_running(Phase::Deletion, &tables[1]).unwrap();
        run.mark_failed(Phase::Deletion, &tables[1], "boom").unwrap();
        let totals = run.finish_deletion().unwrap();
        assert_eq!(totals, PhaseTotals { tables: 2, succeeded: 1, failed: 1, records: 5 });
        assert_eq!(run.state(), RunState::DeletionComplete);

        let failed = &run.progress(Phase::Deletion)[1];
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.message, "boom");
        assert_eq!(failed.records_affected, None);

        let id = run.id();
        run.begin_insertion(&tables, SourceFolder::demo_data()).unwrap();
        assert_eq!(run.id(), id);
        assert_eq!(run.progress(Phase::Deletion).len(), 2);
        for t in &tables {
            run.mark_running(Phase::Insertion, t).unwrap();
            run.mark_completed(Phase::Insertion, t, 1).unwrap();
        }
        run.finish_insertion().unwrap();
        assert_eq!(run.state(), RunState::Complete);

        run.reset().unwrap();
        assert_eq!(run.state(), RunState::Idle);
        assert!(run.progress(Phase::Deletion).is_empty());
        assert!(run.progress(Phase::Insertion).is_empty());
    }

    #[test]
    fn test_rejects_regression_and_unknown_tables() {
        let tables = names(&["users"]);
        let mut run = ResetRun::new();
        run.begin_deletion(&tables).unwrap();
        assert!(matches!(run.mark_completed(Phase::Deletion, &tables[0], 1), Err(RunError::InvalidTransition { .. })));
        run.mark_running(Phase::Deletion, &tables[0]).unwrap();
        run.mark_completed(Phase::Deletion, &tables[0], 1).unwrap();
        assert!(matches!(run.mark_running(Phase::Deletion, &tables[0]), Err(RunError::InvalidTransition { .. })));
        let stranger = TableName::new("ghosts").unwrap();
        assert_eq!(run.mark_running(Phase::Deletion, &stranger), Err(RunError::UnknownTable(stranger)));
        assert_eq!(run.mark_running(Phase::Insertion, &tables[0]), Err(RunError::PhaseNotActive(Phase::Insertion)));
    }

    #[test]
    fn test_guards() {
        let mut run = ResetRun::new();
        assert!(matches!(run.begin_deletion(&names(&["users", "users"])), Err(RunError::DuplicateTable(_))));
        assert_eq!(run.state(), RunState::Idle);

        let tables = names(&["users"]);
        run.begin_deletion(&tables).unwrap();
        assert!(matches!(run.begin_deletion(&tables), Err(RunError::AlreadyRunning(RunState::Deleting))));
        assert!(matches!(run.finish_deletion(), Err(RunError::PhaseIncomplete(_))));
        assert!(run.reset().is_err());
    }

    #[test]
    fn test_events_follow_transitions() {
        let tables = names(&["users"]);
        let mut run = ResetRun::new();
        run.begin_deletion(&tables).unwrap();
        run.mark_running(Phase::Deletion, &tables[0]).unwrap();
        run.mark_completed(Phase::Deletion, &tables[0], 2).unwrap();
        run.finish_deletion().unwrap();
        let events = run.take_events();
        let statuses: Vec<TableStatus> = events.iter().filter_map(|e| match e {
            PipelineEvent::Progress { update, .. } => Some(update.status),
            _ => None,
        }).collect();
        assert_eq!(statuses, vec![TableStatus::Pending, TableStatus::Running, TableStatus::Completed]);
        assert!(matches!(events.first(), Some(PipelineEvent::StateChanged { state: RunState::Deleting, .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::StateChanged { state: RunState::DeletionComplete, .. })));
        assert!(run.take_events().is_empty());
    }

    #[test]
    fn test_abandon_closes_the_active_phase() {
        let tables = names(&["orderItems", "orders", "users"]);
        let mut run = ResetRun::new();
        assert!(!run.abandon("interrupted"));

        run.begin_deletion(&tables).unwrap();
        run.mark_running(Phase::Deletion, &tables[0]).unwrap();
        run.mark_completed(Phase::Deletion, &tables[0], 4).unwrap();
        run.mark_running(Phase::Deletion, &tables[1]).unwrap();
        run.take_events();

        assert!(run.abandon("interrupted"));
        assert_eq!(run.state(), RunState::DeletionComplete);
        let statuses: Vec<TableStatus> = run.progress(Phase::Deletion).iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![TableStatus::Completed, TableStatus::Failed, TableStatus::Failed]);
        assert_eq!(run.progress(Phase::Deletion)[2].error.as_deref(), Some("interrupted"));
        assert_eq!(run.totals(Phase::Deletion), PhaseTotals { tables: 3, succeeded: 1, failed: 2, records: 4 });
        assert!(matches!(run.take_events().last(), Some(PipelineEvent::StateChanged { state: RunState::DeletionComplete, .. })));

        run.reset().unwrap();
        assert_eq!(run.state(), RunState::Idle);
    }

    #[test]
    fn test_ensure_unique() {
        assert!(ensure_unique(&names(&["users", "orders"])).is_ok());
        assert_eq!(ensure_unique(&names(&["a", "b", "a"])), Err(RunError::DuplicateTable(TableName::new("a").unwrap())));
    }
}
