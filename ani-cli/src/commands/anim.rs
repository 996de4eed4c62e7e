//! ANIm command implementation - compare every genome pair in a directory

use ani_core::anim::{start_run, AnimError, AnimParams, AnimRunner, RunOutcome};
use ani_core::executor::{GraphExecutor, LocalExecutor, SgeExecutor, SgeParams};
use ani_core::genomes::{register_genomes, LabelFiles};
use ani_core::nucmer::{get_version, resolve_executable};
use ani_core::store::ComparisonStore;
use ani_core::types::RunStatus;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use super::open_store;
use crate::config::{Config, SchedulerKind};
use crate::error::CliError;

#[derive(Args, Debug, Clone)]
pub struct AnimArgs {
    /// Directory of genome FASTA files (.fna, .fa, .fasta, .fas)
    pub indir: PathBuf,

    /// Output directory for alignment output and job scripts
    pub outdir: PathBuf,

    /// Result store path
    #[arg(long)]
    pub dbpath: Option<PathBuf>,

    /// NUCmer executable
    #[arg(long)]
    pub nucmer_exe: Option<PathBuf>,

    /// delta-filter executable
    #[arg(long)]
    pub filter_exe: Option<PathBuf>,

    /// Use all anchor matches (--maxmatch) instead of unique ones
    #[arg(long)]
    pub maxmatch: bool,

    /// Do not run delta-filter; ingest raw .delta output
    #[arg(long)]
    pub nofilter: bool,

    /// Reuse output already present in the output directory
    #[arg(long)]
    pub recovery: bool,

    /// Job scheduler
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerKind>,

    /// Local worker count (0 = all cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum tasks per SGE array job
    #[arg(long)]
    pub sge_group_size: Option<usize>,

    /// Extra arguments for qsub, e.g. "-q all.q"
    #[arg(long, allow_hyphen_values = true)]
    pub sge_args: Option<String>,

    /// Prefix for job names
    #[arg(long)]
    pub jobprefix: Option<String>,

    /// Name for this run (default: ANIm_<start time>)
    #[arg(long)]
    pub name: Option<String>,

    /// Genome labels, one `<hash>\t<stem>\t<label>` line per genome
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Genome classes, in the same format as --labels
    #[arg(long)]
    pub classes: Option<PathBuf>,
}

/// Configuration file values with command-line overrides applied
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub params: AnimParams,
    pub dbpath: PathBuf,
    pub scheduler: SchedulerKind,
    pub workers: usize,
    pub sge_group_size: usize,
    pub sge_args: Option<String>,
}

pub fn resolve_settings(config: &Config, args: &AnimArgs, show_progress: bool) -> Settings {
    let params = AnimParams {
        outdir: args.outdir.clone(),
        nucmer_exe: args
            .nucmer_exe
            .clone()
            .unwrap_or_else(|| config.anim.nucmer_exe.clone()),
        filter_exe: args
            .filter_exe
            .clone()
            .unwrap_or_else(|| config.anim.filter_exe.clone()),
        maxmatch: args.maxmatch || config.anim.maxmatch,
        nofilter: args.nofilter || config.anim.nofilter,
        recovery: args.recovery,
        job_prefix: args
            .jobprefix
            .clone()
            .unwrap_or_else(|| config.scheduler.job_prefix.clone()),
        show_progress,
    };

    Settings {
        params,
        dbpath: args.dbpath.clone().unwrap_or_else(|| config.database.path.clone()),
        scheduler: args.scheduler.unwrap_or(config.scheduler.kind),
        workers: args.workers.unwrap_or_else(|| config.local_workers()),
        sge_group_size: args.sge_group_size.unwrap_or(config.scheduler.sge_group_size),
        sge_args: args.sge_args.clone().or_else(|| config.scheduler.sge_args.clone()),
    }
}

pub fn build_executor(settings: &Settings) -> Box<dyn GraphExecutor> {
    match settings.scheduler {
        SchedulerKind::Local => Box::new(
            LocalExecutor::new(Some(settings.workers)).with_progress(settings.params.show_progress),
        ),
        SchedulerKind::Sge => Box::new(SgeExecutor::new(SgeParams {
            job_prefix: settings.params.job_prefix.clone(),
            group_size: settings.sge_group_size,
            extra_args: settings.sge_args.clone(),
            script_dir: settings.params.outdir.join("jobs"),
            qsub: PathBuf::from("qsub"),
        })),
    }
}

fn resolve_tool(exe: &Path, tool: &str) -> Result<PathBuf> {
    let path = resolve_executable(exe).map_err(|e| CliError::external_tool(tool, e.to_string()))?;
    log::debug!("Using {} at {}", tool, path.display());
    Ok(path)
}

pub fn execute(config: &Config, args: AnimArgs, show_progress: bool, cmdline: &str) -> Result<()> {
    log::info!("Running ANIm analysis");
    let mut settings = resolve_settings(config, &args, show_progress);

    if !args.indir.is_dir() {
        return Err(CliError::file_not_found(args.indir.clone()).into());
    }
    for path in [&args.labels, &args.classes].into_iter().flatten() {
        if !path.is_file() {
            return Err(CliError::file_not_found(path.clone()).into());
        }
    }

    settings.params.nucmer_exe = resolve_tool(&settings.params.nucmer_exe, "nucmer")?;
    settings.params.filter_exe = resolve_tool(&settings.params.filter_exe, "delta-filter")?;
    let version = get_version(&settings.params.nucmer_exe)
        .map_err(|e| CliError::external_tool("nucmer", e.to_string()))?;
    log::info!("Current nucmer version: {}", version);

    let mut store = open_store(&settings.dbpath)?;
    let params = &settings.params;
    let run = start_run(&mut store, params, args.name.as_deref(), cmdline)
        .context("Could not add run to the database")?;

    let label_files = LabelFiles {
        labels: args.labels.as_deref(),
        classes: args.classes.as_deref(),
    };
    if let Err(e) = register_genomes(&mut store, run.run_id, &args.indir, label_files) {
        store.set_run_status(run.run_id, RunStatus::Failed)?;
        return Err(e).with_context(|| format!("Could not add genomes for run {}", run.run_id));
    }

    let executor = build_executor(&settings);
    let result = AnimRunner::new(params, &mut store, executor.as_ref(), version).run(run.run_id);
    let summary = match result {
        Ok(summary) => summary,
        Err(e @ AnimError::JobsFailed { .. }) | Err(e @ AnimError::Executor(_)) => {
            return Err(CliError::scheduler(e.to_string()).into());
        }
        Err(e) => return Err(e).context("ANIm run failed"),
    };

    match summary.outcome {
        RunOutcome::NothingToRun => log::info!(
            "Run {}: all {} comparisons reused from the store",
            summary.run_id,
            summary.reused
        ),
        RunOutcome::Completed => log::info!(
            "Run {}: {} reused, {} computed, {} recovered",
            summary.run_id,
            summary.reused,
            summary.jobs - summary.recovered,
            summary.recovered
        ),
    }
    if !summary.ingest.failed.is_empty() {
        log::warn!(
            "{} comparison outputs could not be read and were left out",
            summary.ingest.failed.len()
        );
    }
    Ok(())
}
