//! Turn finished comparison output into stored comparisons

use std::path::PathBuf;

use crate::io::mummer::MummerParser;
use crate::progress::progress_bar;
use crate::store::{ComparisonStore, StoreResult};
use crate::types::{ComparisonId, ComparisonKey, ComparisonMetrics, NewComparison, RunId};

use super::jobs::ComparisonJob;

/// Identity and coverage for an alignment of `aln_length` bases.
///
/// An empty alignment is a real result (the genomes share nothing) and gets
/// zero identity and coverage. A zero genome length gives zero coverage.
pub fn derive_metrics(
    aln_length: u64,
    sim_errs: u64,
    query_length: u64,
    subject_length: u64,
) -> ComparisonMetrics {
    let fraction = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let identity = if aln_length == 0 {
        0.0
    } else {
        1.0 - sim_errs as f64 / aln_length as f64
    };

    ComparisonMetrics {
        aln_length,
        sim_errs,
        identity,
        cov_query: fraction(aln_length, query_length),
        cov_subject: fraction(aln_length, subject_length),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Comparisons attached to the run
    pub recorded: Vec<ComparisonId>,
    /// Output files that could not be read or parsed
    pub failed: Vec<PathBuf>,
}

/// Parse the output of every job and attach the results to `run_id`.
///
/// Unreadable output is logged and counted; the remaining jobs still go in.
/// Store errors abort ingestion.
pub fn ingest_results(
    store: &mut dyn ComparisonStore,
    run_id: RunId,
    jobs: &[ComparisonJob],
    version: &str,
    maxmatch: bool,
    show_progress: bool,
) -> StoreResult<IngestReport> {
    let pb = progress_bar(jobs.len(), show_progress);
    let mut report = IngestReport::default();

    for job in jobs {
        pb.inc(1);
        let summary = match MummerParser::parse_delta(&job.outfile) {
            Ok(summary) => summary,
            Err(e) => {
                log::warn!("Skipping {}: {}", job.outfile.display(), e);
                report.failed.push(job.outfile.clone());
                continue;
            }
        };

        let metrics = derive_metrics(
            summary.aln_length,
            summary.sim_errors,
            job.query.length,
            job.subject.length,
        );
        let key = ComparisonKey::nucmer(job.query.genome_id, job.subject.genome_id, version, maxmatch);
        let comparison = store.add_comparison(NewComparison { key, metrics })?;
        store.add_run_comparison(run_id, comparison.comparison_id)?;
        log::debug!(
            "Comparison {}: {} vs {} identity {:.4} over {} bp",
            comparison.comparison_id,
            job.query.genome_id,
            job.subject.genome_id,
            comparison.identity,
            comparison.aln_length
        );
        report.recorded.push(comparison.comparison_id);
    }

    pb.finish_and_clear();
    log::info!(
        "Ingested {} comparisons ({} unreadable)",
        report.recorded.len(),
        report.failed.len()
    );
    Ok(report)
}
