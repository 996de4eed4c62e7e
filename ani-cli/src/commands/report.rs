//! Report command implementation - list runs or export run matrices

use ani_core::matrices::RunMatrices;
use ani_core::store::ComparisonStore;
use ani_core::types::{Run, RunId};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::open_store;
use crate::error::CliError;

pub fn execute(dbpath: &Path, run_id: Option<RunId>, outdir: &Path) -> Result<()> {
    let store = open_store(dbpath)?;

    match run_id {
        None => {
            let runs = store.list_runs().context("Could not list runs")?;
            print!("{}", format_run_table(&runs));
        }
        Some(run_id) => {
            let run = store
                .get_run(run_id)
                .with_context(|| format!("Could not load run {}", run_id))?;
            let written = write_run_matrices(&run, outdir)?;
            for path in written {
                log::info!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

/// Tab-separated run listing with a header line
pub fn format_run_table(runs: &[Run]) -> String {
    let mut out = String::from("run_id\tname\tmethod\tdate\tstatus\n");
    for run in runs {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            run.run_id,
            run.name,
            run.method,
            run.date.format("%Y-%m-%d %H:%M:%S"),
            run.status
        );
    }
    out
}

/// Write each summary matrix of `run` as `matrix_<name>_<run id>.tab`
pub fn write_run_matrices(run: &Run, outdir: &Path) -> Result<Vec<PathBuf>> {
    let matrices = RunMatrices::from_columns(&run.matrices).map_err(|e| {
        CliError::validation(format!(
            "run {} has no usable matrices (status {}): {}",
            run.run_id, run.status, e
        ))
    })?;

    fs::create_dir_all(outdir).map_err(CliError::from)?;
    let mut written = Vec::new();
    for (name, matrix) in matrices.named() {
        let path = outdir.join(format!("matrix_{}_{}.tab", name, run.run_id));
        fs::write(&path, matrix.to_tsv())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
