//! FASTA summary statistics for genome registration
//!
//! Uses needletail for streaming parsing, so whole genomes are never held in
//! memory; only the total length and the first header are kept.

use std::path::Path;
use thiserror::Error;

use needletail::parse_fastx_file;

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty file or no sequences found")]
    EmptyFile,
}

/// Whole-file statistics for one genome assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeStatistics {
    /// Sum of bases over all records
    pub total_length: u64,
    pub num_records: usize,
    /// Header of the first record, without the leading `>`
    pub description: String,
}

/// Stream a FASTA/FASTQ file (gzip handled transparently) and collect statistics
pub fn genome_statistics<P: AsRef<Path>>(path: P) -> Result<GenomeStatistics, FastaError> {
    let mut reader = parse_fastx_file(&path).map_err(|e| FastaError::Parse(e.to_string()))?;

    let mut total_length = 0u64;
    let mut num_records = 0usize;
    let mut description = None;

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| FastaError::Parse(e.to_string()))?;
        if description.is_none() {
            description = Some(String::from_utf8_lossy(record.id()).trim().to_string());
        }
        total_length += record.num_bases() as u64;
        num_records += 1;
    }

    match description {
        Some(description) => Ok(GenomeStatistics {
            total_length,
            num_records,
            description,
        }),
        None => Err(FastaError::EmptyFile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_multi_record_statistics() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">NC_002696 Caulobacter crescentus CB15").unwrap();
        writeln!(file, "ACGTACGTAC").unwrap();
        writeln!(file, "GTACG").unwrap();
        writeln!(file, ">plasmid_1").unwrap();
        writeln!(file, "ACGT").unwrap();
        file.flush().unwrap();

        let stats = genome_statistics(file.path()).unwrap();
        assert_eq!(stats.total_length, 19);
        assert_eq!(stats.num_records, 2);
        assert_eq!(stats.description, "NC_002696 Caulobacter crescentus CB15");
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(genome_statistics(file.path()).is_err());
    }
}
