//! Job-graph executors
//!
//! The orchestrator hands its whole node list to one `GraphExecutor` and
//! blocks until it returns. Two implementations exist: a local worker pool and
//! an SGE-compatible cluster queue.

use crate::graph::{GraphError, JobNode, NodeId};
use thiserror::Error;

pub mod cluster;
pub mod local;

pub use cluster::{SgeExecutor, SgeParams};
pub use local::LocalExecutor;

/// Errors that stop an executor from running the graph at all
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid job graph: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build worker pool: {0}")]
    Pool(String),

    #[error("Scheduler error: {tool} - {message}")]
    Scheduler { tool: String, message: String },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Succeeded,
    Failed,
    /// Not started because a predecessor did not succeed
    Skipped,
}

/// Final state of one node, in completion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub id: NodeId,
    pub status: NodeStatus,
    pub exit_code: Option<i32>,
}

/// Aggregate result of a dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl ExecutionReport {
    fn count(&self, status: NodeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(NodeStatus::Succeeded)
    }

    /// Cumulative failure signal; non-zero means the run must not be ingested
    pub fn failed(&self) -> usize {
        self.count(NodeStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(NodeStatus::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

/// Runs a dependency graph of shell commands to completion
pub trait GraphExecutor {
    /// Run every node whose predecessors succeed; returns once nothing is left to run
    fn execute(&self, nodes: Vec<JobNode>) -> ExecutorResult<ExecutionReport>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}
