//! Genome registration from an input directory

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh64::Xxh64;

use crate::io::fasta::{genome_statistics, FastaError};
use crate::store::{ComparisonStore, StoreError};
use crate::types::{Genome, GenomeLabel, NewGenome, RunId};

/// Extensions recognised as genome assemblies
pub const GENOME_EXTENSIONS: &[&str] = &["fna", "fa", "fasta", "fas"];

#[derive(Debug, Error)]
pub enum GenomeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not read genome {path}: {source}")]
    Fasta {
        path: PathBuf,
        #[source]
        source: FastaError,
    },
    #[error("{path}:{line}: expected three tab-separated fields (hash, stem, value), got {text:?}")]
    LabelFormat {
        path: PathBuf,
        line: usize,
        text: String,
    },
    #[error("Found {found} genome file(s) in {dir}; at least two are needed")]
    TooFewGenomes { dir: PathBuf, found: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GenomeResult<T> = Result<T, GenomeError>;

/// Genome files directly under `dir`, sorted by file name
pub fn find_genome_files(dir: &Path) -> GenomeResult<Vec<PathBuf>> {
    let io_err = |source| GenomeError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| GENOME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// xxh64 of the file contents, as 16 hex digits
pub fn hash_file(path: &Path) -> GenomeResult<String> {
    let io_err = |source| GenomeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut hasher = Xxh64::new(0);
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buffer).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:016x}", hasher.digest()))
}

/// Label or class assignments read from a tab-separated file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    by_hash: HashMap<String, String>,
    by_stem: HashMap<String, String>,
}

impl LabelMap {
    /// Value for a genome, matched on content hash first and file stem second
    pub fn lookup(&self, genome_hash: &str, path: &Path) -> Option<&str> {
        self.by_hash
            .get(genome_hash)
            .or_else(|| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| self.by_stem.get(stem))
            })
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// Read a labels or classes file: one `<hash>\t<file stem>\t<value>` line per
/// genome. Blank lines and `#` comments are skipped.
pub fn load_classes_labels(path: &Path) -> GenomeResult<LabelMap> {
    let io_err = |source| GenomeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut map = LabelMap::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').map(str::trim).collect();
        match fields.as_slice() {
            [hash, stem, value] if !value.is_empty() => {
                map.by_hash.insert(hash.to_string(), value.to_string());
                map.by_stem.insert(stem.to_string(), value.to_string());
            }
            _ => {
                return Err(GenomeError::LabelFormat {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    text: line.clone(),
                })
            }
        }
    }
    Ok(map)
}

/// Optional label and class files applied while registering genomes
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelFiles<'a> {
    pub labels: Option<&'a Path>,
    pub classes: Option<&'a Path>,
}

/// Register every genome in `indir` and link it to `run_id`.
///
/// Files already known to the store (same content hash) reuse their existing
/// row, so genome ids stay stable across runs over the same inputs. Labels and
/// classes are recorded per run.
pub fn register_genomes(
    store: &mut dyn ComparisonStore,
    run_id: RunId,
    indir: &Path,
    label_files: LabelFiles<'_>,
) -> GenomeResult<Vec<Genome>> {
    let load = |file: Option<&Path>| -> GenomeResult<LabelMap> {
        match file {
            Some(path) => {
                let map = load_classes_labels(path)?;
                log::info!("Read {} entries from {}", map.len(), path.display());
                Ok(map)
            }
            None => Ok(LabelMap::default()),
        }
    };
    let labels = load(label_files.labels)?;
    let classes = load(label_files.classes)?;

    let files = find_genome_files(indir)?;
    if files.len() < 2 {
        return Err(GenomeError::TooFewGenomes {
            dir: indir.to_path_buf(),
            found: files.len(),
        });
    }
    log::info!("Found {} genome files in {}", files.len(), indir.display());

    let mut genomes = Vec::with_capacity(files.len());
    for path in files {
        let stats = genome_statistics(&path).map_err(|source| GenomeError::Fasta {
            path: path.clone(),
            source,
        })?;
        let genome_hash = hash_file(&path)?;
        let label = labels.lookup(&genome_hash, &path).map(str::to_string);
        let class_label = classes.lookup(&genome_hash, &path).map(str::to_string);

        let genome = store.add_genome(NewGenome {
            genome_hash,
            path: path.clone(),
            length: stats.total_length,
            description: stats.description,
        })?;
        store.add_run_genome(run_id, genome.genome_id)?;
        if label.is_some() || class_label.is_some() {
            store.add_label(GenomeLabel {
                genome_id: genome.genome_id,
                run_id,
                label,
                class_label,
            })?;
        }
        log::debug!(
            "Registered {} as genome {} ({} bp)",
            path.display(),
            genome.genome_id,
            genome.length
        );
        genomes.push(genome);
    }

    genomes.sort_by_key(|g| g.genome_id);
    Ok(genomes)
}
