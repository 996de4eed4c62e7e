//! MUMmer delta file parser
//!
//! Reads `.delta` output from nucmer (and the `.filter` output of
//! delta-filter, which uses the same format) and reduces it to the two
//! numbers an ANIm comparison needs: the aligned length and the error count.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use flate2::read::GzDecoder;

#[derive(Debug, Error)]
pub enum MummerError {
    #[error("Invalid delta file format: {0}")]
    InvalidDeltaFormat(String),
    #[error("Invalid position value: {0}")]
    InvalidPosition(String),
    #[error("Missing header information")]
    MissingHeader,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MummerResult<T> = Result<T, MummerError>;

/// One alignment block from a delta file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaAlignment {
    pub reference_name: String,
    pub query_name: String,
    pub reference_start: u64,
    pub reference_end: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub errors: u64,
}

impl DeltaAlignment {
    /// Aligned bases on the reference, inclusive of both ends
    pub fn reference_span(&self) -> u64 {
        self.reference_start.abs_diff(self.reference_end) + 1
    }
}

/// Totals over every alignment block in a delta file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    pub aln_length: u64,
    pub sim_errors: u64,
    pub alignments: usize,
}

impl DeltaSummary {
    pub fn from_alignments(alignments: &[DeltaAlignment]) -> Self {
        alignments.iter().fold(Self::default(), |mut acc, aln| {
            acc.aln_length += aln.reference_span();
            acc.sim_errors += aln.errors;
            acc.alignments += 1;
            acc
        })
    }
}

/// MUMmer parser for delta-format output
pub struct MummerParser;

impl MummerParser {
    /// Parse a delta file and return its alignment length and error totals
    pub fn parse_delta<P: AsRef<Path>>(path: P) -> MummerResult<DeltaSummary> {
        let alignments = Self::parse_delta_file(path)?;
        Ok(DeltaSummary::from_alignments(&alignments))
    }

    /// Parse a delta file (optionally gzipped) into alignment blocks
    pub fn parse_delta_file<P: AsRef<Path>>(path: P) -> MummerResult<Vec<DeltaAlignment>> {
        let file = File::open(&path)?;
        let path_str = path.as_ref().to_string_lossy();

        if path_str.ends_with(".gz") {
            let decoder = GzDecoder::new(file);
            Self::parse_delta_reader(BufReader::new(decoder))
        } else {
            Self::parse_delta_reader(BufReader::new(file))
        }
    }

    /// Parse delta format from a reader
    pub fn parse_delta_reader<R: BufRead>(reader: R) -> MummerResult<Vec<DeltaAlignment>> {
        let mut lines = reader.lines();

        // Line 1 names the two input files, line 2 the alignment program
        let header = lines.next().ok_or(MummerError::MissingHeader)??;
        if header.split_whitespace().count() < 2 {
            return Err(MummerError::InvalidDeltaFormat("Invalid header".to_string()));
        }
        let program = lines.next().ok_or(MummerError::MissingHeader)??;
        let program = program.trim();
        if program != "NUCMER" && program != "PROMER" {
            return Err(MummerError::InvalidDeltaFormat(format!(
                "Unknown alignment program line: {}",
                program
            )));
        }

        let mut alignments = Vec::new();
        let mut current: Option<(String, String)> = None;

        for line in lines {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('>') {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                if parts.len() < 4 {
                    return Err(MummerError::InvalidDeltaFormat(format!(
                        "Sequence header needs 4 fields: {}",
                        trimmed
                    )));
                }
                current = Some((parts[0].to_string(), parts[1].to_string()));
                continue;
            }

            // Only the 7-column block headers carry totals; single integers are indel offsets
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() != 7 {
                continue;
            }

            let (reference_name, query_name) = current.clone().ok_or_else(|| {
                MummerError::InvalidDeltaFormat("Alignment block before sequence header".to_string())
            })?;

            alignments.push(DeltaAlignment {
                reference_name,
                query_name,
                reference_start: parse_field(parts[0])?,
                reference_end: parse_field(parts[1])?,
                query_start: parse_field(parts[2])?,
                query_end: parse_field(parts[3])?,
                errors: parse_field(parts[4])?,
            });
        }

        Ok(alignments)
    }
}

fn parse_field(value: &str) -> MummerResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| MummerError::InvalidPosition(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const DELTA: &str = "/data/genome_a.fna /data/genome_b.fna\n\
                         NUCMER\n\
                         >contig_a1 contig_b1 5000 4800\n\
                         1 1000 1 1000 12 12 0\n\
                         -15\n\
                         0\n\
                         2000 1501 3000 3499 3 3 0\n\
                         0\n\
                         >contig_a2 contig_b1 2000 4800\n\
                         10 109 200 299 0 0 0\n\
                         0\n";

    #[test]
    fn test_parse_delta_reader() {
        let alignments = MummerParser::parse_delta_reader(Cursor::new(DELTA)).unwrap();
        assert_eq!(alignments.len(), 3);
        assert_eq!(alignments[0].reference_name, "contig_a1");
        assert_eq!(alignments[0].query_name, "contig_b1");
        assert_eq!(alignments[1].reference_span(), 500);
        assert_eq!(alignments[2].reference_name, "contig_a2");
    }

    #[test]
    fn test_summary_totals() {
        let alignments = MummerParser::parse_delta_reader(Cursor::new(DELTA)).unwrap();
        let summary = DeltaSummary::from_alignments(&alignments);
        assert_eq!(summary.aln_length, 1000 + 500 + 100);
        assert_eq!(summary.sim_errors, 15);
        assert_eq!(summary.alignments, 3);
    }

    #[test]
    fn test_empty_alignment_set() {
        let data = "/a.fna /b.fna\nNUCMER\n";
        let summary = DeltaSummary::from_alignments(
            &MummerParser::parse_delta_reader(Cursor::new(data)).unwrap(),
        );
        assert_eq!(summary, DeltaSummary::default());
    }

    #[test]
    fn test_missing_program_line() {
        let result = MummerParser::parse_delta_reader(Cursor::new("/a.fna /b.fna\n"));
        assert!(matches!(result, Err(MummerError::MissingHeader)));
    }

    #[test]
    fn test_block_without_sequence_header() {
        let data = "/a.fna /b.fna\nNUCMER\n1 100 1 100 0 0 0\n0\n";
        let result = MummerParser::parse_delta_reader(Cursor::new(data));
        assert!(matches!(result, Err(MummerError::InvalidDeltaFormat(_))));
    }

    #[test]
    fn test_invalid_position() {
        let data = "/a.fna /b.fna\nNUCMER\n>a b 10 10\n1 x 1 10 0 0 0\n";
        let result = MummerParser::parse_delta_reader(Cursor::new(data));
        assert!(matches!(result, Err(MummerError::InvalidPosition(_))));
    }

    #[test]
    fn test_parse_delta_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", DELTA).unwrap();
        let summary = MummerParser::parse_delta(file.path()).unwrap();
        assert_eq!(summary.aln_length, 1600);
    }
}
