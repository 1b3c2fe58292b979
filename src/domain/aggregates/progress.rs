//! Per-table progress entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::events::ProgressUpdate;
use crate::domain::value_objects::TableName;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus { #[default] Pending, Running, Completed, Failed }

impl TableStatus {
    /// Statuses only move forward: `pending -> running -> completed | failed`.
    pub fn can_transition_to(&self, next: TableStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running) | (Self::Running, Self::Completed) | (Self::Running, Self::Failed)
        )
    }
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// Progress of one table within one phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    pub table: TableName,
    pub status: TableStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_affected: Option<u64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PhaseProgress {
    pub fn pending(table: TableName) -> Self {
        Self { table, status: TableStatus::Pending, records_affected: None, message: "Pending".to_string(), error: None, updated_at: Utc::now() }
    }

    pub fn update(&self) -> ProgressUpdate {
        ProgressUpdate { status: self.status, records_affected: self.records_affected, message: self.message.clone(), error: self.error.clone() }
    }
}

/// Outcome counts for a finished phase. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTotals {
    pub tables: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: u64,
}

impl PhaseTotals {
    pub fn from_progress(entries: &[PhaseProgress]) -> Self {
        entries.iter().fold(Self { tables: entries.len(), ..Self::default() }, |mut acc, e| {
            match e.status {
                TableStatus::Completed => { acc.succeeded += 1; acc.records += e.records_affected.unwrap_or(0); }
                TableStatus::Failed => acc.failed += 1,
                TableStatus::Pending | TableStatus::Running => {}
            }
            acc
        })
    }
    pub fn all_succeeded(&self) -> bool { self.failed == 0 && self.succeeded == self.tables }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_transitions_are_monotonic() {
        use TableStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Running));
    }
    #[test]
    fn test_totals() {
        let mut a = PhaseProgress::pending(TableName::new("orders").unwrap());
        a.status = TableStatus::Completed; a.records_affected = Some(4);
        let mut b = PhaseProgress::pending(TableName::new("users").unwrap());
        b.status = TableStatus::Failed;
        let totals = PhaseTotals::from_progress(&[a, b]);
        assert_eq!(totals, PhaseTotals { tables: 2, succeeded: 1, failed: 1, records: 4 });
        assert!(!totals.all_succeeded());
    }
}
