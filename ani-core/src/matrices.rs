//! Run-level summary matrices
//!
//! Five square matrices indexed by the sorted genome ids of a run. Cells for
//! pairs without a comparison stay unset and serialize as `null`, which marks an
//! incomplete run.
//!
//! Serialization is column-oriented JSON, `{"<col id>": {"<row id>": value}}`,
//! the same layout a pandas `DataFrame.to_json()` produces, so stores written by
//! other ANIm tools stay readable.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

use crate::types::{Comparison, Genome, GenomeId, RunMatrixColumns};

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid genome label: {0}")]
    InvalidLabel(String),
    #[error("Matrix {0} is not stored on this run")]
    Missing(&'static str),
}

/// Square matrix with genome-id labels on both axes
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    labels: Vec<GenomeId>,
    index: HashMap<GenomeId, usize>,
    values: Vec<Option<f64>>,
}

impl LabeledMatrix {
    /// Empty matrix over `labels`; labels are sorted and deduplicated
    pub fn new(mut labels: Vec<GenomeId>) -> Self {
        labels.sort_unstable();
        labels.dedup();
        let index = labels.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let n = labels.len();
        Self {
            labels,
            index,
            values: vec![None; n * n],
        }
    }

    pub fn labels(&self) -> &[GenomeId] {
        &self.labels
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    fn offset(&self, row: GenomeId, col: GenomeId) -> Option<usize> {
        let r = *self.index.get(&row)?;
        let c = *self.index.get(&col)?;
        Some(r * self.labels.len() + c)
    }

    pub fn get(&self, row: GenomeId, col: GenomeId) -> Option<f64> {
        self.offset(row, col).and_then(|i| self.values[i])
    }

    /// Set a cell; ids outside the matrix are ignored and reported as `false`
    pub fn set(&mut self, row: GenomeId, col: GenomeId, value: f64) -> bool {
        match self.offset(row, col) {
            Some(i) => {
                self.values[i] = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn fill_diagonal(&mut self, value: f64) {
        for id in self.labels.clone() {
            self.set(id, id, value);
        }
    }

    pub fn to_json(&self) -> Result<String, MatrixError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MatrixError> {
        let columns: HashMap<String, HashMap<String, Option<f64>>> = serde_json::from_str(json)?;
        let parse = |label: &str| {
            label
                .parse::<GenomeId>()
                .map_err(|_| MatrixError::InvalidLabel(label.to_string()))
        };

        let labels = columns.keys().map(|k| parse(k.as_str())).collect::<Result<Vec<_>, _>>()?;
        let mut matrix = Self::new(labels);
        for (col, rows) in &columns {
            let col = parse(col.as_str())?;
            for (row, value) in rows {
                let row = parse(row.as_str())?;
                if let Some(value) = value {
                    matrix.set(row, col, *value);
                }
            }
        }
        Ok(matrix)
    }

    /// Tab-separated table with a header row of ids; unset cells are empty
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for id in &self.labels {
            let _ = write!(out, "\t{}", id);
        }
        out.push('\n');
        for &row in &self.labels {
            let _ = write!(out, "{}", row);
            for &col in &self.labels {
                match self.get(row, col) {
                    Some(v) => {
                        let _ = write!(out, "\t{}", v);
                    }
                    None => out.push('\t'),
                }
            }
            out.push('\n');
        }
        out
    }
}

struct Column<'a> {
    matrix: &'a LabeledMatrix,
    col: GenomeId,
}

impl Serialize for Column<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.matrix.size()))?;
        for &row in &self.matrix.labels {
            map.serialize_entry(&row.to_string(), &self.matrix.get(row, self.col))?;
        }
        map.end()
    }
}

impl Serialize for LabeledMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.size()))?;
        for &col in &self.labels {
            map.serialize_entry(&col.to_string(), &Column { matrix: self, col })?;
        }
        map.end()
    }
}

/// The five summary matrices of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunMatrices {
    pub identity: LabeledMatrix,
    pub coverage: LabeledMatrix,
    pub aln_lengths: LabeledMatrix,
    pub sim_errors: LabeledMatrix,
    pub hadamard: LabeledMatrix,
}

impl RunMatrices {
    /// Reduce a run's comparisons to its summary matrices.
    ///
    /// Diagonals: identity, coverage, Hadamard and similarity errors are 1.0
    /// (the last is a placeholder, not a self-comparison); alignment length is
    /// the genome's own length. Comparisons naming genomes outside the run are
    /// skipped.
    pub fn synthesize(genomes: &[Genome], comparisons: &[Comparison]) -> Self {
        let labels: Vec<GenomeId> = genomes.iter().map(|g| g.genome_id).collect();
        let mut matrices = Self {
            identity: LabeledMatrix::new(labels.clone()),
            coverage: LabeledMatrix::new(labels.clone()),
            aln_lengths: LabeledMatrix::new(labels.clone()),
            sim_errors: LabeledMatrix::new(labels.clone()),
            hadamard: LabeledMatrix::new(labels),
        };

        matrices.identity.fill_diagonal(1.0);
        matrices.coverage.fill_diagonal(1.0);
        matrices.sim_errors.fill_diagonal(1.0);
        matrices.hadamard.fill_diagonal(1.0);
        for genome in genomes {
            matrices
                .aln_lengths
                .set(genome.genome_id, genome.genome_id, genome.length as f64);
        }

        for cmp in comparisons {
            let (q, s) = (cmp.query_id, cmp.subject_id);
            if !matrices.identity.set(q, s, cmp.identity) {
                log::warn!(
                    "Comparison {} ({} vs {}) is not part of this run's genome set",
                    cmp.comparison_id,
                    q,
                    s
                );
                continue;
            }
            matrices.identity.set(s, q, cmp.identity);
            matrices.coverage.set(q, s, cmp.cov_query);
            matrices.coverage.set(s, q, cmp.cov_subject);
            matrices.aln_lengths.set(q, s, cmp.aln_length as f64);
            matrices.aln_lengths.set(s, q, cmp.aln_length as f64);
            matrices.sim_errors.set(q, s, cmp.sim_errs as f64);
            matrices.sim_errors.set(s, q, cmp.sim_errs as f64);
            matrices.hadamard.set(q, s, cmp.identity * cmp.cov_query);
            matrices.hadamard.set(s, q, cmp.identity * cmp.cov_subject);
            log::debug!("Added matrix entries for comparison {}", cmp.comparison_id);
        }

        matrices
    }

    /// Named matrices in store-column order
    pub fn named(&self) -> [(&'static str, &LabeledMatrix); 5] {
        [
            ("identity", &self.identity),
            ("coverage", &self.coverage),
            ("aln_lengths", &self.aln_lengths),
            ("sim_errors", &self.sim_errors),
            ("hadamard", &self.hadamard),
        ]
    }

    pub fn to_columns(&self) -> Result<RunMatrixColumns, MatrixError> {
        Ok(RunMatrixColumns {
            df_identity: Some(self.identity.to_json()?),
            df_coverage: Some(self.coverage.to_json()?),
            df_alnlength: Some(self.aln_lengths.to_json()?),
            df_simerrors: Some(self.sim_errors.to_json()?),
            df_hadamard: Some(self.hadamard.to_json()?),
        })
    }

    pub fn from_columns(columns: &RunMatrixColumns) -> Result<Self, MatrixError> {
        let load = |value: &Option<String>, name: &'static str| match value {
            Some(json) => LabeledMatrix::from_json(json),
            None => Err(MatrixError::Missing(name)),
        };
        Ok(Self {
            identity: load(&columns.df_identity, "identity")?,
            coverage: load(&columns.df_coverage, "coverage")?,
            aln_lengths: load(&columns.df_alnlength, "aln_lengths")?,
            sim_errors: load(&columns.df_simerrors, "sim_errors")?,
            hadamard: load(&columns.df_hadamard, "hadamard")?,
        })
    }
}
