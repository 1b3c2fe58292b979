//! Domain events
use crate::domain::aggregates::{PhaseTotals, RunState, TableStatus};
use crate::domain::value_objects::TableName;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the two passes over the table list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Deletion,
    Insertion,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self { Phase::Deletion => "deletion", Phase::Insertion => "insertion" }
    }
    pub(crate) fn running_message(&self) -> &'static str {
        match self { Phase::Deletion => "Deleting records...", Phase::Insertion => "Inserting records..." }
    }
    pub(crate) fn completed_message(&self, records: u64) -> String {
        let verb = match self { Phase::Deletion => "Deleted", Phase::Insertion => "Inserted" };
        let noun = if records == 1 { "record" } else { "records" };
        format!("{verb} {records} {noun}")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(self.as_str()) }
}

/// Partial update handed to progress sinks for a single table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub status: TableStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_affected: Option<u64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a reset run reports, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StateChanged { run_id: Uuid, state: RunState },
    Progress { run_id: Uuid, phase: Phase, table: TableName, update: ProgressUpdate },
    PhaseCompleted { run_id: Uuid, phase: Phase, totals: PhaseTotals },
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_completed_message() {
        assert_eq!(Phase::Deletion.completed_message(5), "Deleted 5 records");
        assert_eq!(Phase::Insertion.completed_message(1), "Inserted 1 record");
    }
    #[test]
    fn test_update_wire_shape() {
        let update = ProgressUpdate { status: TableStatus::Completed, records_affected: Some(3), message: "Deleted 3 records".into(), error: None };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"status": "completed", "recordsAffected": 3, "message": "Deleted 3 records"}));
    }
}
