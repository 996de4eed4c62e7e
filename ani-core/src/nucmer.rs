//! NUCmer and delta-filter wrapper
//!
//! Resolves the tool binaries, reports the installed NUCmer version and builds
//! the shell command lines for one pairwise comparison. The commands are not
//! run here; they become nodes of the job graph.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NucmerError {
    #[error("Executable not found: {0}")]
    NotFound(String),
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not determine version of {0}")]
    UnknownVersion(String),
}

/// Suffix of raw nucmer output
pub const DELTA_SUFFIX: &str = "delta";
/// Suffix of delta-filter output
pub const FILTER_SUFFIX: &str = "filter";

/// Resolve a tool given either as a path or as a bare name on `PATH`
pub fn resolve_executable(exe: &Path) -> Result<PathBuf, NucmerError> {
    if exe.components().count() > 1 {
        return if exe.exists() {
            Ok(exe.to_path_buf())
        } else {
            Err(NucmerError::NotFound(exe.display().to_string()))
        };
    }
    which::which(exe).map_err(|_| NucmerError::NotFound(exe.display().to_string()))
}

/// Report the version of the NUCmer binary at `nucmer_exe`
///
/// MUMmer 3 prints `NUCmer (NUCleotide MUMmer) version 3.1` on stderr, MUMmer 4
/// prints a bare `4.0.0rc1` on stdout; both are handled.
pub fn get_version(nucmer_exe: &Path) -> Result<String, NucmerError> {
    let output = Command::new(nucmer_exe)
        .arg("-V")
        .output()
        .map_err(|source| NucmerError::Spawn {
            tool: nucmer_exe.display().to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    [stdout.as_ref(), stderr.as_ref()]
        .iter()
        .find_map(|text| parse_version(text))
        .ok_or_else(|| NucmerError::UnknownVersion(nucmer_exe.display().to_string()))
}

fn parse_version(text: &str) -> Option<String> {
    let labelled = Regex::new(r"version\s+([0-9][0-9A-Za-z.\-]*)").ok()?;
    if let Some(caps) = labelled.captures(text) {
        return Some(caps[1].to_string());
    }
    let bare = Regex::new(r"^\s*([0-9]+\.[0-9][0-9A-Za-z.\-]*)\s*$").ok()?;
    bare.captures(text).map(|caps| caps[1].to_string())
}

/// The pair of commands for one comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NucmerCommands {
    pub nucmer: String,
    pub filter: String,
    /// Output prefix passed to nucmer with `-p`
    pub outprefix: PathBuf,
}

impl NucmerCommands {
    /// Final output file: filtered delta, or raw delta when filtering is skipped
    pub fn output_path(&self, nofilter: bool) -> PathBuf {
        let suffix = if nofilter { DELTA_SUFFIX } else { FILTER_SUFFIX };
        with_suffix(&self.outprefix, suffix)
    }
}

/// Build the nucmer and delta-filter command lines for `query` vs `subject`.
///
/// `outprefix` must be unique per pair; every output file is derived from it.
pub fn construct_nucmer_cmdline(
    query: &Path,
    subject: &Path,
    outprefix: &Path,
    nucmer_exe: &Path,
    filter_exe: &Path,
    maxmatch: bool,
) -> NucmerCommands {
    let outprefix = outprefix.to_path_buf();
    let mode = if maxmatch { "--maxmatch" } else { "--mum" };

    let nucmer = format!(
        "{} {} -p {} {} {}",
        shell_quote(nucmer_exe),
        mode,
        shell_quote(&outprefix),
        shell_quote(query),
        shell_quote(subject),
    );
    let filter = format!(
        "{} -1 {} > {}",
        shell_quote(filter_exe),
        shell_quote(&with_suffix(&outprefix, DELTA_SUFFIX)),
        shell_quote(&with_suffix(&outprefix, FILTER_SUFFIX)),
    );

    NucmerCommands {
        nucmer,
        filter,
        outprefix,
    }
}

// Path::with_extension would clobber dots in genome names like GCF_000011365.1
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn shell_quote(path: &Path) -> String {
    let text = path.display().to_string();
    let safe = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+:,=@".contains(c));
    if safe && !text.is_empty() {
        text
    } else {
        format!("'{}'", text.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_mummer3() {
        let text = "nucmer \nNUCmer (NUCleotide MUMmer) version 3.1\n";
        assert_eq!(parse_version(text), Some("3.1".to_string()));
    }

    #[test]
    fn test_parse_version_mummer4() {
        assert_eq!(parse_version("4.0.0rc1\n"), Some("4.0.0rc1".to_string()));
        assert_eq!(parse_version("usage: nucmer [options]"), None);
    }

    #[test]
    fn test_construct_cmdline_mum() {
        let cmds = construct_nucmer_cmdline(
            Path::new("/in/GCF_000011365.1.fna"),
            Path::new("/in/genome_b.fasta"),
            Path::new("/out/nucmer_output/GCF_000011365.1_vs_genome_b"),
            Path::new("nucmer"),
            Path::new("delta-filter"),
            false,
        );
        assert_eq!(
            cmds.nucmer,
            "nucmer --mum -p /out/nucmer_output/GCF_000011365.1_vs_genome_b \
             /in/GCF_000011365.1.fna /in/genome_b.fasta"
        );
        assert_eq!(
            cmds.filter,
            "delta-filter -1 /out/nucmer_output/GCF_000011365.1_vs_genome_b.delta \
             > /out/nucmer_output/GCF_000011365.1_vs_genome_b.filter"
        );
        assert_eq!(
            cmds.output_path(false),
            PathBuf::from("/out/nucmer_output/GCF_000011365.1_vs_genome_b.filter")
        );
        assert_eq!(
            cmds.output_path(true),
            PathBuf::from("/out/nucmer_output/GCF_000011365.1_vs_genome_b.delta")
        );
    }

    #[test]
    fn test_construct_cmdline_maxmatch_and_quoting() {
        let cmds = construct_nucmer_cmdline(
            Path::new("/in dir/a.fna"),
            Path::new("/in dir/b.fna"),
            Path::new("/out/a_vs_b"),
            Path::new("/opt/mummer/nucmer"),
            Path::new("/opt/mummer/delta-filter"),
            true,
        );
        assert!(cmds.nucmer.starts_with("/opt/mummer/nucmer --maxmatch -p /out/a_vs_b "));
        assert!(cmds.nucmer.ends_with("'/in dir/a.fna' '/in dir/b.fna'"));
    }

    #[test]
    fn test_resolve_missing_path() {
        let result = resolve_executable(Path::new("/definitely/not/here/nucmer"));
        assert!(matches!(result, Err(NucmerError::NotFound(_))));
    }
}
