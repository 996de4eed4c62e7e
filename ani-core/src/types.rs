//! Records shared by the store, the orchestrator and the matrix builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub type GenomeId = i64;
pub type RunId = i64;
pub type ComparisonId = i64;

/// Program tag recorded on every NUCmer-derived comparison
pub const NUCMER_PROGRAM: &str = "nucmer";

/// Method name recorded on ANIm runs
pub const ANIM_METHOD: &str = "ANIm";

/// A sequence file registered in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub genome_id: GenomeId,
    pub genome_hash: String,
    pub path: PathBuf,
    /// Total sequence length in bases
    pub length: u64,
    pub description: String,
}

/// A genome about to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct NewGenome {
    pub genome_hash: String,
    pub path: PathBuf,
    pub length: u64,
    pub description: String,
}

/// Per-run display label and class of a genome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeLabel {
    pub genome_id: GenomeId,
    pub run_id: RunId,
    pub label: Option<String>,
    pub class_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Started,
    Complete,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "started" => Some(RunStatus::Started),
            "complete" => Some(RunStatus::Complete),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized summary matrices attached to a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMatrixColumns {
    pub df_identity: Option<String>,
    pub df_coverage: Option<String>,
    pub df_alnlength: Option<String>,
    pub df_simerrors: Option<String>,
    pub df_hadamard: Option<String>,
}

/// One analysis execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub method: String,
    pub cmdline: String,
    pub date: DateTime<Utc>,
    pub status: RunStatus,
    pub name: String,
    pub matrices: RunMatrixColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub method: String,
    pub cmdline: String,
    pub date: DateTime<Utc>,
    pub status: RunStatus,
    pub name: String,
}

/// Composite identity of a comparison.
///
/// Two comparisons with equal keys are the same result; the store keeps at
/// most one row per key and the orchestrator reuses it instead of recomputing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparisonKey {
    pub query_id: GenomeId,
    pub subject_id: GenomeId,
    pub program: String,
    pub version: String,
    pub fragsize: Option<u32>,
    pub maxmatch: bool,
}

impl ComparisonKey {
    /// Key for a NUCmer comparison, which never uses a fragment size
    pub fn nucmer(query_id: GenomeId, subject_id: GenomeId, version: &str, maxmatch: bool) -> Self {
        Self {
            query_id,
            subject_id,
            program: NUCMER_PROGRAM.to_string(),
            version: version.to_string(),
            fragsize: None,
            maxmatch,
        }
    }
}

/// Derived values for one pairwise result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub aln_length: u64,
    pub sim_errs: u64,
    pub identity: f64,
    pub cov_query: f64,
    pub cov_subject: f64,
}

/// A persisted pairwise result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub comparison_id: ComparisonId,
    pub query_id: GenomeId,
    pub subject_id: GenomeId,
    pub program: String,
    pub version: String,
    pub fragsize: Option<u32>,
    pub maxmatch: bool,
    pub aln_length: u64,
    pub sim_errs: u64,
    pub identity: f64,
    pub cov_query: f64,
    pub cov_subject: f64,
}

impl Comparison {
    pub fn key(&self) -> ComparisonKey {
        ComparisonKey {
            query_id: self.query_id,
            subject_id: self.subject_id,
            program: self.program.clone(),
            version: self.version.clone(),
            fragsize: self.fragsize,
            maxmatch: self.maxmatch,
        }
    }
}

/// A comparison result waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewComparison {
    pub key: ComparisonKey,
    pub metrics: ComparisonMetrics,
}
