//! Persistent result store
//!
//! The orchestrator talks to the store only through `ComparisonStore`, held as
//! `&mut dyn ComparisonStore` for the whole run and never handed to executor
//! workers. `SqliteStore` is the shipped implementation.

use crate::matrices::{MatrixError, RunMatrices};
use crate::types::{
    Comparison, ComparisonId, Genome, GenomeId, GenomeLabel, NewComparison, NewGenome, NewRun,
    Run, RunId, RunStatus,
};
use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No run with id {0}")]
    RunNotFound(RunId),

    #[error("Could not serialize run matrices: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Data corruption: {0}")]
    Corruption(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait ComparisonStore {
    fn add_run(&mut self, run: NewRun) -> StoreResult<Run>;

    fn get_run(&self, run_id: RunId) -> StoreResult<Run>;

    fn list_runs(&self) -> StoreResult<Vec<Run>>;

    fn set_run_status(&mut self, run_id: RunId, status: RunStatus) -> StoreResult<()>;

    /// Write the five serialized matrices onto a run
    fn set_run_matrices(&mut self, run_id: RunId, matrices: &RunMatrices) -> StoreResult<()>;

    /// Insert a genome, or return the existing row with the same content hash
    fn add_genome(&mut self, genome: NewGenome) -> StoreResult<Genome>;

    fn add_run_genome(&mut self, run_id: RunId, genome_id: GenomeId) -> StoreResult<()>;

    /// Genomes of a run, ordered by id
    fn run_genomes(&self, run_id: RunId) -> StoreResult<Vec<Genome>>;

    /// Set the label and class of a genome within one run, replacing any earlier values
    fn add_label(&mut self, label: GenomeLabel) -> StoreResult<()>;

    /// Labels recorded for a run, ordered by genome id
    fn run_labels(&self, run_id: RunId) -> StoreResult<Vec<GenomeLabel>>;

    /// Every comparison in the store, whichever run produced it
    fn comparisons(&self) -> StoreResult<Vec<Comparison>>;

    /// Insert a comparison. If one with the same key already exists it is
    /// returned unchanged and the new values are discarded.
    fn add_comparison(&mut self, comparison: NewComparison) -> StoreResult<Comparison>;

    /// Attach an existing comparison to a run (idempotent)
    fn add_run_comparison(&mut self, run_id: RunId, comparison_id: ComparisonId) -> StoreResult<()>;

    fn run_comparisons(&self, run_id: RunId) -> StoreResult<Vec<Comparison>>;
}
