//! Configuration handling for the ANI CLI
//!
//! Supports loading configuration from ani.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub anim: AnimConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of local workers
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimConfig {
    /// NUCmer binary, as a path or a name on PATH
    #[serde(default = "default_nucmer_exe")]
    pub nucmer_exe: PathBuf,

    /// delta-filter binary, as a path or a name on PATH
    #[serde(default = "default_filter_exe")]
    pub filter_exe: PathBuf,

    /// Run NUCmer with --maxmatch instead of --mum
    #[serde(default)]
    pub maxmatch: bool,

    /// Skip delta-filter and ingest raw .delta output
    #[serde(default)]
    pub nofilter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Local worker pool
    Local,
    /// SGE/OGE cluster queue via qsub
    Sge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler")]
    pub kind: SchedulerKind,

    /// Local workers; 0 uses `general.threads`
    #[serde(default)]
    pub workers: usize,

    /// Maximum tasks per SGE array job
    #[serde(default = "default_sge_group_size")]
    pub sge_group_size: usize,

    /// Extra arguments passed to every qsub call
    #[serde(default)]
    pub sge_args: Option<String>,

    /// Prefix for job and array names
    #[serde(default = "default_job_prefix")]
    pub job_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite result store
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_true() -> bool { true }
fn default_nucmer_exe() -> PathBuf { PathBuf::from("nucmer") }
fn default_filter_exe() -> PathBuf { PathBuf::from("delta-filter") }
fn default_scheduler() -> SchedulerKind { SchedulerKind::Local }
fn default_sge_group_size() -> usize { 10_000 }
fn default_job_prefix() -> String { "ANI".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from(".ani/anidb") }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            progress: true,
        }
    }
}

impl Default for AnimConfig {
    fn default() -> Self {
        Self {
            nucmer_exe: default_nucmer_exe(),
            filter_exe: default_filter_exe(),
            maxmatch: false,
            nofilter: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: default_scheduler(),
            workers: 0,
            sge_group_size: default_sge_group_size(),
            sge_args: None,
            job_prefix: default_job_prefix(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                // Try to find ani.toml in current directory
                let default_path = PathBuf::from("ani.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: ani.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        Self::default().to_toml()
    }

    /// Local worker count after applying the `general.threads` fallback
    pub fn local_workers(&self) -> usize {
        if self.scheduler.workers > 0 {
            self.scheduler.workers
        } else {
            self.general.threads
        }
    }
}
