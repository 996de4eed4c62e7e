//! File format readers: MUMmer delta output and FASTA genome summaries.

pub mod fasta;
pub mod mummer;

pub use fasta::{genome_statistics, FastaError, GenomeStatistics};
pub use mummer::{DeltaAlignment, DeltaSummary, MummerError, MummerParser};
