//! Command implementations for the ANI CLI

pub mod anim;
pub mod createdb;
pub mod report;

use ani_core::store::SqliteStore;
use anyhow::Result;
use std::path::Path;

use crate::error::CliError;

/// Open an existing result store
pub(crate) fn open_store(dbpath: &Path) -> Result<SqliteStore> {
    if !dbpath.is_file() {
        return Err(CliError::database(format!(
            "no result store at {}",
            dbpath.display()
        ))
        .into());
    }
    log::info!("Connecting to database {}", dbpath.display());
    let store = SqliteStore::open(dbpath)
        .map_err(|e| CliError::database(format!("could not open {}: {}", dbpath.display(), e)))?;
    Ok(store)
}
