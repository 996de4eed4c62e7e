use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use commands::anim::AnimArgs;
use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "ani")]
#[command(about = "ANI - incremental pairwise genome comparison with NUCmer")]
#[command(version)]
#[command(long_about = "
ANI computes average nucleotide identity (ANIm) for every pair of genomes in a
directory, storing results in an SQLite database so that later runs only align
the pairs that have not been compared before.

Examples:
  ani createdb --dbpath .ani/anidb
  ani anim genomes/ output/ --dbpath .ani/anidb --workers 8
  ani anim genomes/ output/ --scheduler sge --sge-args '-q all.q' --recovery
  ani report --dbpath .ani/anidb
  ani report --dbpath .ani/anidb --run 3 -o matrices/
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub disable_progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty result store
    Createdb {
        /// Result store path
        #[arg(long)]
        dbpath: Option<PathBuf>,

        /// Replace an existing store
        #[arg(short, long)]
        force: bool,
    },

    /// Run ANIm over all genomes in a directory
    Anim(AnimArgs),

    /// List runs, or export the matrices of one run
    Report {
        /// Result store path
        #[arg(long)]
        dbpath: Option<PathBuf>,

        /// Run whose matrices are written
        #[arg(long = "run")]
        run_id: Option<i64>,

        /// Output directory for matrix files
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,
    },

    /// Print or write a configuration file
    Config {
        /// Print an example configuration with every default
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| CliError::config(format!("{:#}", e)))?;
    let show_progress = config.general.progress && !cli.disable_progress && !cli.quiet;

    match cli.command {
        Commands::Createdb { dbpath, force } => {
            let dbpath = dbpath.unwrap_or_else(|| config.database.path.clone());
            commands::createdb::execute(&dbpath, force)?;
        }

        Commands::Anim(args) => {
            let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
            commands::anim::execute(&config, args, show_progress, &cmdline)?;
        }

        Commands::Report { dbpath, run_id, outdir } => {
            let dbpath = dbpath.unwrap_or_else(|| config.database.path.clone());
            commands::report::execute(&dbpath, run_id, &outdir)?;
        }

        Commands::Config { example, output } => {
            let config = if example { Config::default() } else { config };
            match output {
                Some(path) => {
                    config.save_to_file(&path)?;
                    log::info!("Configuration written to {}", path.display());
                }
                None if example => print!("{}", Config::example_toml()?),
                None => print!("{}", config.to_toml()?),
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<CliError>() {
            Some(cli_error) => print_error_and_exit(cli_error),
            None => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
