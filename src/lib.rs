//! OpenSASE Demo Data
//!
//! Resets the storefront database to a known seed bundle.
//!
//! ## Features
//! - Two-phase reset pipeline: delete children before parents, reinsert parents before children
//! - Per-table progress with a pluggable progress sink
//! - Row-delete and row-insert HTTP endpoints backed by Postgres
//! - Static, validated table ordering for ~40 storefront tables

pub mod api;
pub mod cli;
pub mod client;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod protocol;
pub mod seed;
pub mod sink;
pub mod store;
pub mod tables;

pub use client::{EndpointError, HttpSeedClient, SeedEndpoint};
pub use domain::aggregates::{PhaseProgress, PhaseTotals, RunState, TableStatus};
pub use domain::events::{Phase, PipelineEvent, ProgressUpdate};
pub use domain::value_objects::{SourceFolder, TableName};
pub use error::{DemoDataError, Result};
pub use pipeline::{RunSnapshot, RunSummary, TableResetPipeline};
pub use sink::{ChannelProgressSink, ProgressSink, TracingProgressSink};
pub use tables::TableOrder;
