//! Output left behind by an interrupted run

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::nucmer::{DELTA_SUFFIX, FILTER_SUFFIX};

/// File names in `dir` that look like final comparison output.
///
/// Final output is `.filter`, or `.delta` when filtering is skipped. A missing
/// directory simply has nothing to recover.
pub fn collect_existing_output(dir: &Path, nofilter: bool) -> io::Result<HashSet<String>> {
    let suffix = if nofilter { DELTA_SUFFIX } else { FILTER_SUFFIX };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };

    let mut found = HashSet::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(suffix) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            found.insert(name.to_string());
        }
    }

    log::info!(
        "Recovery: {} existing .{} files in {}",
        found.len(),
        suffix,
        dir.display()
    );
    Ok(found)
}
