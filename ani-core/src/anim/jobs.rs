//! Comparison jobs and their graph nodes

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::graph::JobNode;
use crate::nucmer::construct_nucmer_cmdline;
use crate::types::Genome;

use super::AnimParams;

/// Graph nodes of one comparison; the filter depends on the alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNodes {
    pub align: JobNode,
    pub filter: JobNode,
}

/// One pairwise comparison of the current run
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonJob {
    pub query: Genome,
    pub subject: Genome,
    pub filter_cmd: String,
    pub nucmer_cmd: String,
    /// File parsed at ingestion
    pub outfile: PathBuf,
    /// `None` when the output was recovered from an earlier run
    pub nodes: Option<JobNodes>,
}

impl ComparisonJob {
    pub fn is_recovered(&self) -> bool {
        self.nodes.is_none()
    }
}

/// Build a job for every pair.
///
/// `existing` holds output file names found in recovery mode; a pair whose
/// output is already there gets a job without nodes so it is ingested but not
/// rerun.
pub fn build_joblist(
    pairs: &[(Genome, Genome)],
    params: &AnimParams,
    existing: Option<&HashSet<String>>,
) -> Vec<ComparisonJob> {
    let outdir = params.alignment_dir();
    let mut jobs = Vec::with_capacity(pairs.len());

    for (idx, (query, subject)) in pairs.iter().enumerate() {
        let cmds = construct_nucmer_cmdline(
            &query.path,
            &subject.path,
            &outdir.join(output_stem(query, subject)),
            &params.nucmer_exe,
            &params.filter_exe,
            params.maxmatch,
        );
        log::debug!("Commands to run:\n\t{}\n\t{}", cmds.nucmer, cmds.filter);
        let outfile = cmds.output_path(params.nofilter);

        let recovered = existing
            .map(|files| file_name(&outfile).map_or(false, |name| files.contains(name)))
            .unwrap_or(false);

        let nodes = if recovered {
            log::info!("Recovering output from {}", outfile.display());
            None
        } else {
            let align = JobNode::new(format!("{}_{:06}-n", params.job_prefix, idx), cmds.nucmer.clone());
            let filter = JobNode::new(format!("{}_{:06}-f", params.job_prefix, idx), cmds.filter.clone())
                .with_dependency(&align);
            Some(JobNodes { align, filter })
        };

        jobs.push(ComparisonJob {
            query: query.clone(),
            subject: subject.clone(),
            filter_cmd: cmds.filter,
            nucmer_cmd: cmds.nucmer,
            outfile,
            nodes,
        });
    }
    jobs
}

/// Every node of every job that still has to run
pub fn graph_nodes(jobs: &[ComparisonJob]) -> Vec<JobNode> {
    jobs.iter()
        .filter_map(|job| job.nodes.as_ref())
        .flat_map(|nodes| [nodes.align.clone(), nodes.filter.clone()])
        .collect()
}

/// `<query stem>_<query id>_vs_<subject stem>_<subject id>`.
///
/// Stems alone can collide (`x.fna` and `x.fasta` are distinct genomes);
/// genome ids are stable across runs, so recovery still finds the files.
pub fn output_stem(query: &Genome, subject: &Genome) -> String {
    format!(
        "{}_{}_vs_{}_{}",
        file_stem(&query.path),
        query.genome_id,
        file_stem(&subject.path),
        subject.genome_id
    )
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{dependency_levels, NodeId};
    use crate::types::GenomeId;

    fn genome(id: GenomeId, name: &str) -> Genome {
        Genome {
            genome_id: id,
            genome_hash: format!("{:016x}", id),
            path: PathBuf::from(format!("/data/{}.fna", name)),
            length: 1000,
            description: name.to_string(),
        }
    }

    fn params(nofilter: bool) -> AnimParams {
        AnimParams {
            job_prefix: "ANIm".to_string(),
            nofilter,
            ..AnimParams::new("/out")
        }
    }

    fn pairs() -> Vec<(Genome, Genome)> {
        let (a, b, c) = (genome(1, "A"), genome(2, "B"), genome(3, "C"));
        vec![(a.clone(), c.clone()), (b, c)]
    }

    #[test]
    fn test_two_linked_nodes_per_job() {
        let jobs = build_joblist(&pairs(), &params(false), None);
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.outfile, PathBuf::from("/out/nucmer_output/A_1_vs_C_3.filter"));
        assert!(first.nucmer_cmd.contains("--mum"));
        let nodes = first.nodes.as_ref().unwrap();
        assert_eq!(nodes.align.id, NodeId("ANIm_000000-n".to_string()));
        assert_eq!(nodes.filter.id, NodeId("ANIm_000000-f".to_string()));
        assert_eq!(nodes.filter.dependencies, vec![nodes.align.id.clone()]);
        assert_eq!(nodes.align.command, first.nucmer_cmd);
        assert_eq!(nodes.filter.command, first.filter_cmd);

        let graph = graph_nodes(&jobs);
        assert_eq!(graph.len(), 4);
        let levels = dependency_levels(graph).unwrap();
        assert_eq!(levels.len(), 2);
        assert!(levels[0].iter().all(|n| n.id.0.ends_with("-n")));
    }

    #[test]
    fn test_nofilter_output_is_delta() {
        let jobs = build_joblist(&pairs(), &params(true), None);
        assert_eq!(jobs[1].outfile, PathBuf::from("/out/nucmer_output/B_2_vs_C_3.delta"));
        assert!(jobs[1].nodes.is_some());
    }

    #[test]
    fn test_shared_stems_get_distinct_outputs() {
        let mut fasta = genome(2, "x");
        fasta.path = PathBuf::from("/data/x.fasta");
        let (fna, y) = (genome(1, "x"), genome(3, "y"));
        let pairs = vec![(fna.clone(), fasta.clone()), (fna, y.clone()), (fasta, y)];

        let jobs = build_joblist(&pairs, &params(false), None);
        assert_eq!(jobs[1].outfile, PathBuf::from("/out/nucmer_output/x_1_vs_y_3.filter"));
        assert_eq!(jobs[2].outfile, PathBuf::from("/out/nucmer_output/x_2_vs_y_3.filter"));
        let outfiles: HashSet<&PathBuf> = jobs.iter().map(|j| &j.outfile).collect();
        assert_eq!(outfiles.len(), 3);
        assert_ne!(jobs[1].nucmer_cmd, jobs[2].nucmer_cmd);
    }

    #[test]
    fn test_recovered_output_has_no_nodes() {
        let existing = HashSet::from(["A_1_vs_C_3.filter".to_string(), "B_2_vs_C_3.delta".to_string()]);
        let jobs = build_joblist(&pairs(), &params(false), Some(&existing));

        assert!(jobs[0].is_recovered());
        assert!(!jobs[1].is_recovered());
        let graph = graph_nodes(&jobs);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph[0].id, NodeId("ANIm_000001-n".to_string()));
    }
}
