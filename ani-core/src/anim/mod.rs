//! ANIm orchestration
//!
//! A run goes through deduplication against the store, job building (with
//! optional recovery of earlier output), dispatch to a `GraphExecutor`,
//! ingestion of the alignment output and finally matrix synthesis. The store
//! is only touched before and after dispatch.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::executor::{ExecutorError, GraphExecutor};
use crate::genomes::GenomeError;
use crate::graph::JobNode;
use crate::matrices::RunMatrices;
use crate::nucmer::NucmerError;
use crate::store::{ComparisonStore, StoreError};
use crate::types::{NewRun, Run, RunId, RunStatus, ANIM_METHOD};

pub mod dedup;
pub mod ingest;
pub mod jobs;
pub mod recovery;

pub use dedup::{candidate_pairs, deduplicate, Deduplication};
pub use ingest::{derive_metrics, ingest_results, IngestReport};
pub use jobs::{build_joblist, graph_nodes, ComparisonJob, JobNodes};
pub use recovery::collect_existing_output;

/// Subdirectory of the output directory holding NUCmer output
pub const ALIGNMENT_DIR: &str = "nucmer_output";

#[derive(Debug, Error)]
pub enum AnimError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Genome(#[from] GenomeError),

    #[error(transparent)]
    Nucmer(#[from] NucmerError),

    #[error("Job dispatch failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not scan {path} for existing output: {source}")]
    Recovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} of {total} jobs failed and {skipped} were skipped; run {run_id} marked failed")]
    JobsFailed {
        run_id: RunId,
        total: usize,
        failed: usize,
        skipped: usize,
    },
}

pub type AnimResult<T> = Result<T, AnimError>;

/// Settings for one ANIm run
#[derive(Debug, Clone, PartialEq)]
pub struct AnimParams {
    pub outdir: PathBuf,
    pub nucmer_exe: PathBuf,
    pub filter_exe: PathBuf,
    /// Use all anchor matches (`--maxmatch`) instead of unique ones (`--mum`)
    pub maxmatch: bool,
    /// Ingest raw `.delta` output without running delta-filter
    pub nofilter: bool,
    pub recovery: bool,
    pub job_prefix: String,
    pub show_progress: bool,
}

impl AnimParams {
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            nucmer_exe: PathBuf::from("nucmer"),
            filter_exe: PathBuf::from("delta-filter"),
            maxmatch: false,
            nofilter: false,
            recovery: false,
            job_prefix: "ANI".to_string(),
            show_progress: false,
        }
    }

    pub fn alignment_dir(&self) -> PathBuf {
        self.outdir.join(ALIGNMENT_DIR)
    }
}

/// Create the run record and the alignment output directory
pub fn start_run(
    store: &mut dyn ComparisonStore,
    params: &AnimParams,
    name: Option<&str>,
    cmdline: &str,
) -> AnimResult<Run> {
    let date = Utc::now();
    let name = match name {
        Some(name) => name.to_string(),
        None => format!("{}_{}", ANIM_METHOD, date.format("%Y-%m-%dT%H:%M:%S%.6f")),
    };
    log::info!("Analysis name: {}", name);

    let run = store.add_run(NewRun {
        method: ANIM_METHOD.to_string(),
        cmdline: cmdline.to_string(),
        date,
        status: RunStatus::Started,
        name,
    })?;
    log::info!("Added run {} to the store", run.run_id);

    let dir = params.alignment_dir();
    fs::create_dir_all(&dir).map_err(|source| AnimError::OutputDir {
        path: dir.clone(),
        source,
    })?;
    log::info!("NUCmer output will be written to {}", dir.display());
    Ok(run)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every pair was already in the store
    NothingToRun,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub genomes: usize,
    pub candidate_pairs: usize,
    pub reused: usize,
    pub jobs: usize,
    pub recovered: usize,
    pub nodes: usize,
    pub ingest: IngestReport,
}

/// Drives one run from deduplication to matrix synthesis
pub struct AnimRunner<'a> {
    params: &'a AnimParams,
    store: &'a mut dyn ComparisonStore,
    executor: &'a dyn GraphExecutor,
    version: String,
}

impl<'a> AnimRunner<'a> {
    pub fn new(
        params: &'a AnimParams,
        store: &'a mut dyn ComparisonStore,
        executor: &'a dyn GraphExecutor,
        version: impl Into<String>,
    ) -> Self {
        Self {
            params,
            store,
            executor,
            version: version.into(),
        }
    }

    /// Compare every genome pair of `run_id`, reusing stored results
    pub fn run(&mut self, run_id: RunId) -> AnimResult<RunSummary> {
        let genomes = self.store.run_genomes(run_id)?;
        log::info!("Collated {} genomes for run {}", genomes.len(), run_id);

        let pairs = candidate_pairs(&genomes);
        let candidate_count = pairs.len();
        log::info!("Total pairwise comparisons: {}", candidate_count);

        let dedup = deduplicate(
            pairs,
            self.store.comparisons()?,
            &self.version,
            self.params.maxmatch,
        );
        for comparison in &dedup.reused {
            self.store.add_run_comparison(run_id, comparison.comparison_id)?;
        }

        let mut summary = RunSummary {
            run_id,
            outcome: RunOutcome::NothingToRun,
            genomes: genomes.len(),
            candidate_pairs: candidate_count,
            reused: dedup.reused.len(),
            jobs: 0,
            recovered: 0,
            nodes: 0,
            ingest: IngestReport::default(),
        };

        if dedup.nothing_to_run() {
            log::info!("All comparison results already present in the store");
            self.finish(run_id)?;
            return Ok(summary);
        }

        let existing = if self.params.recovery {
            let dir = self.params.alignment_dir();
            let files = collect_existing_output(&dir, self.params.nofilter)
                .map_err(|source| AnimError::Recovery { path: dir, source })?;
            Some(files)
        } else {
            None
        };

        let jobs = build_joblist(&dedup.to_run, self.params, existing.as_ref());
        let nodes = graph_nodes(&jobs);
        summary.jobs = jobs.len();
        summary.recovered = jobs.iter().filter(|j| j.is_recovered()).count();
        summary.nodes = nodes.len();
        log::info!(
            "Generated {} jobs ({} recovered, {} graph nodes)",
            summary.jobs,
            summary.recovered,
            summary.nodes
        );

        if !nodes.is_empty() {
            self.dispatch(run_id, nodes)?;
        }

        summary.ingest = ingest_results(
            self.store,
            run_id,
            &jobs,
            &self.version,
            self.params.maxmatch,
            self.params.show_progress,
        )?;
        self.finish(run_id)?;
        summary.outcome = RunOutcome::Completed;
        Ok(summary)
    }

    fn dispatch(&mut self, run_id: RunId, nodes: Vec<JobNode>) -> AnimResult<()> {
        let total = nodes.len();
        log::info!("Passing {} jobs to the {} executor", total, self.executor.name());

        let report = match self.executor.execute(nodes) {
            Ok(report) => report,
            Err(e) => {
                self.store.set_run_status(run_id, RunStatus::Failed)?;
                return Err(e.into());
            }
        };

        if !report.is_success() {
            self.store.set_run_status(run_id, RunStatus::Failed)?;
            return Err(AnimError::JobsFailed {
                run_id,
                total,
                failed: report.failed(),
                skipped: report.skipped(),
            });
        }
        log::info!("Jobs complete");
        Ok(())
    }

    fn finish(&mut self, run_id: RunId) -> AnimResult<()> {
        let genomes = self.store.run_genomes(run_id)?;
        let comparisons = self.store.run_comparisons(run_id)?;
        let matrices = RunMatrices::synthesize(&genomes, &comparisons);
        self.store.set_run_matrices(run_id, &matrices)?;
        self.store.set_run_status(run_id, RunStatus::Complete)?;
        log::info!(
            "Run {} complete: {} genomes, {} comparisons",
            run_id,
            genomes.len(),
            comparisons.len()
        );
        Ok(())
    }
}
