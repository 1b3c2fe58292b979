//! Aggregates module
pub mod progress;
pub mod run;

pub use progress::{PhaseProgress, PhaseTotals, TableStatus};
pub use run::{ensure_unique, ResetRun, RunError, RunState};
