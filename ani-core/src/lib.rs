//! ANI Core Library
//!
//! Incremental ANIm orchestration: comparison deduplication, job graphs,
//! executors, the result store and run summary matrices.

pub mod types;
pub mod io;
pub mod nucmer;
pub mod graph;
pub mod executor;
pub mod store;
pub mod genomes;
pub mod matrices;
pub mod anim;
mod progress;

// Re-export commonly used types and functions
pub use types::{Comparison, ComparisonKey, Genome, Run, RunStatus};
pub use anim::{start_run, AnimError, AnimParams, AnimRunner, RunOutcome, RunSummary};
pub use executor::{ExecutionReport, GraphExecutor, LocalExecutor, SgeExecutor, SgeParams};
pub use store::{ComparisonStore, SqliteStore, StoreError};
pub use matrices::{LabeledMatrix, RunMatrices};
pub use genomes::register_genomes;

/// Version information for the ANI core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
