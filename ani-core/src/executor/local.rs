//! Local worker-pool executor
//!
//! Runs nodes through `sh -c` on a dedicated rayon pool. The graph is
//! processed one dependency level at a time: a level starts only after the
//! previous one has fully finished, and a node whose predecessor did not
//! succeed is skipped rather than run.

use rayon::prelude::*;
use std::collections::HashSet;
use std::process::{Command, Stdio};

use super::{ExecutionReport, ExecutorError, ExecutorResult, GraphExecutor, NodeOutcome, NodeStatus};
use crate::graph::{dependency_levels, JobNode, NodeId};
use crate::progress::progress_bar;

pub struct LocalExecutor {
    workers: usize,
    show_progress: bool,
}

impl LocalExecutor {
    /// `workers == None` uses every available core
    pub fn new(workers: Option<usize>) -> Self {
        let workers = workers.filter(|&w| w > 0).unwrap_or_else(num_cpus::get);
        Self {
            workers,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn run_node(node: &JobNode) -> NodeOutcome {
        log::debug!("Running {}: {}", node.id, node.command);
        let result = Command::new("sh")
            .arg("-c")
            .arg(&node.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match result {
            Ok(output) if output.status.success() => NodeOutcome {
                id: node.id.clone(),
                status: NodeStatus::Succeeded,
                exit_code: output.status.code(),
            },
            Ok(output) => {
                log::error!(
                    "Job {} failed with exit code {:?}: {}",
                    node.id,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                NodeOutcome {
                    id: node.id.clone(),
                    status: NodeStatus::Failed,
                    exit_code: output.status.code(),
                }
            }
            Err(e) => {
                log::error!("Job {} could not be started: {}", node.id, e);
                NodeOutcome {
                    id: node.id.clone(),
                    status: NodeStatus::Failed,
                    exit_code: None,
                }
            }
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl GraphExecutor for LocalExecutor {
    fn execute(&self, nodes: Vec<JobNode>) -> ExecutorResult<ExecutionReport> {
        let total = nodes.len();
        let levels = dependency_levels(nodes)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| ExecutorError::Pool(e.to_string()))?;

        log::info!(
            "Running {} jobs in {} dependency levels on {} workers",
            total,
            levels.len(),
            self.workers
        );

        let pb = progress_bar(total, self.show_progress);
        let mut succeeded: HashSet<NodeId> = HashSet::with_capacity(total);
        let mut report = ExecutionReport::default();

        for level in levels {
            let (ready, blocked): (Vec<JobNode>, Vec<JobNode>) = level
                .into_iter()
                .partition(|node| node.dependencies.iter().all(|dep| succeeded.contains(dep)));

            for node in blocked {
                log::warn!("Skipping {}: a predecessor did not succeed", node.id);
                pb.inc(1);
                report.outcomes.push(NodeOutcome {
                    id: node.id,
                    status: NodeStatus::Skipped,
                    exit_code: None,
                });
            }

            let outcomes: Vec<NodeOutcome> = pool.install(|| {
                ready
                    .par_iter()
                    .map(|node| {
                        let outcome = Self::run_node(node);
                        pb.inc(1);
                        outcome
                    })
                    .collect()
            });

            for outcome in outcomes {
                if outcome.status == NodeStatus::Succeeded {
                    succeeded.insert(outcome.id.clone());
                }
                report.outcomes.push(outcome);
            }
        }

        pb.finish_and_clear();
        log::info!(
            "Local run finished: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
