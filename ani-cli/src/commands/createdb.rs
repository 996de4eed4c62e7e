//! Createdb command implementation - initialise an empty result store

use ani_core::store::SqliteStore;
use anyhow::{Context, Result};
use std::path::Path;

use crate::error::CliError;

pub fn execute(dbpath: &Path, force: bool) -> Result<()> {
    if dbpath.exists() {
        if !force {
            return Err(CliError::validation(format!(
                "{} already exists (use --force to replace it)",
                dbpath.display()
            ))
            .into());
        }
        log::warn!("Removing existing database {}", dbpath.display());
        std::fs::remove_file(dbpath)
            .with_context(|| format!("Failed to remove {}", dbpath.display()))?;
    }

    SqliteStore::open(dbpath)
        .map_err(|e| CliError::database(format!("could not create {}: {}", dbpath.display(), e)))?;
    log::info!("Created empty result store at {}", dbpath.display());
    Ok(())
}
