//! SQLite-backed `ComparisonStore`

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{ComparisonStore, StoreError, StoreResult};
use crate::matrices::RunMatrices;
use crate::types::{
    Comparison, ComparisonId, Genome, GenomeId, GenomeLabel, NewComparison, NewGenome, NewRun,
    Run, RunMatrixColumns, RunId, RunStatus,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS runs (
    run_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    method       TEXT NOT NULL,
    cmdline      TEXT NOT NULL,
    date         TEXT NOT NULL,
    status       TEXT NOT NULL,
    name         TEXT NOT NULL,
    df_identity  TEXT,
    df_coverage  TEXT,
    df_alnlength TEXT,
    df_simerrors TEXT,
    df_hadamard  TEXT
);

CREATE TABLE IF NOT EXISTS genomes (
    genome_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    genome_hash TEXT NOT NULL UNIQUE,
    path        TEXT NOT NULL,
    length      INTEGER NOT NULL,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comparisons (
    comparison_id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id      INTEGER NOT NULL REFERENCES genomes(genome_id),
    subject_id    INTEGER NOT NULL REFERENCES genomes(genome_id),
    program       TEXT NOT NULL,
    version       TEXT NOT NULL,
    fragsize      INTEGER,
    maxmatch      INTEGER NOT NULL,
    aln_length    INTEGER NOT NULL,
    sim_errs      INTEGER NOT NULL,
    identity      REAL NOT NULL,
    cov_query     REAL NOT NULL,
    cov_subject   REAL NOT NULL
);

-- NULL fragsize values must collide, so index on IFNULL
CREATE UNIQUE INDEX IF NOT EXISTS comparisons_key ON comparisons (
    query_id, subject_id, program, version, IFNULL(fragsize, -1), maxmatch
);

CREATE TABLE IF NOT EXISTS runs_genomes (
    run_id    INTEGER NOT NULL REFERENCES runs(run_id),
    genome_id INTEGER NOT NULL REFERENCES genomes(genome_id),
    PRIMARY KEY (run_id, genome_id)
);

CREATE TABLE IF NOT EXISTS labels (
    genome_id   INTEGER NOT NULL REFERENCES genomes(genome_id),
    run_id      INTEGER NOT NULL REFERENCES runs(run_id),
    label       TEXT,
    class_label TEXT,
    PRIMARY KEY (genome_id, run_id)
);

CREATE TABLE IF NOT EXISTS runs_comparisons (
    run_id        INTEGER NOT NULL REFERENCES runs(run_id),
    comparison_id INTEGER NOT NULL REFERENCES comparisons(comparison_id),
    PRIMARY KEY (run_id, comparison_id)
);
";

const RUN_COLUMNS: &str = "run_id, method, cmdline, date, status, name, \
     df_identity, df_coverage, df_alnlength, df_simerrors, df_hadamard";

const GENOME_COLUMNS: &str = "genome_id, genome_hash, path, length, description";

const COMPARISON_COLUMNS: &str = "comparison_id, query_id, subject_id, program, version, \
     fragsize, maxmatch, aln_length, sim_errs, identity, cov_query, cov_subject";

/// SQLite implementation of `ComparisonStore`
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn row_to_run(row: &Row<'_>) -> rusqlite::Result<Run> {
        let date: String = row.get(3)?;
        let date = DateTime::parse_from_rfc3339(&date)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        let status: String = row.get(4)?;
        let status = RunStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown run status {:?}", status).into(),
            )
        })?;
        Ok(Run {
            run_id: row.get(0)?,
            method: row.get(1)?,
            cmdline: row.get(2)?,
            date,
            status,
            name: row.get(5)?,
            matrices: RunMatrixColumns {
                df_identity: row.get(6)?,
                df_coverage: row.get(7)?,
                df_alnlength: row.get(8)?,
                df_simerrors: row.get(9)?,
                df_hadamard: row.get(10)?,
            },
        })
    }

    fn row_to_genome(row: &Row<'_>) -> rusqlite::Result<Genome> {
        let path: String = row.get(2)?;
        let length: i64 = row.get(3)?;
        Ok(Genome {
            genome_id: row.get(0)?,
            genome_hash: row.get(1)?,
            path: PathBuf::from(path),
            length: length.max(0) as u64,
            description: row.get(4)?,
        })
    }

    fn row_to_comparison(row: &Row<'_>) -> rusqlite::Result<Comparison> {
        let fragsize: Option<i64> = row.get(5)?;
        let aln_length: i64 = row.get(7)?;
        let sim_errs: i64 = row.get(8)?;
        Ok(Comparison {
            comparison_id: row.get(0)?,
            query_id: row.get(1)?,
            subject_id: row.get(2)?,
            program: row.get(3)?,
            version: row.get(4)?,
            fragsize: fragsize.map(|f| f.max(0) as u32),
            maxmatch: row.get(6)?,
            aln_length: aln_length.max(0) as u64,
            sim_errs: sim_errs.max(0) as u64,
            identity: row.get(9)?,
            cov_query: row.get(10)?,
            cov_subject: row.get(11)?,
        })
    }

    fn find_comparison(&self, comparison: &NewComparison) -> StoreResult<Option<Comparison>> {
        let key = &comparison.key;
        let sql = format!(
            "SELECT {} FROM comparisons WHERE query_id = ?1 AND subject_id = ?2 \
             AND program = ?3 AND version = ?4 AND fragsize IS ?5 AND maxmatch = ?6",
            COMPARISON_COLUMNS
        );
        let found = self
            .conn
            .query_row(
                &sql,
                params![
                    key.query_id,
                    key.subject_id,
                    key.program,
                    key.version,
                    key.fragsize.map(i64::from),
                    key.maxmatch
                ],
                Self::row_to_comparison,
            )
            .optional()?;
        Ok(found)
    }
}

impl ComparisonStore for SqliteStore {
    fn add_run(&mut self, run: NewRun) -> StoreResult<Run> {
        self.conn.execute(
            "INSERT INTO runs (method, cmdline, date, status, name) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.method,
                run.cmdline,
                run.date.to_rfc3339(),
                run.status.as_str(),
                run.name
            ],
        )?;
        let run_id = self.conn.last_insert_rowid();
        self.get_run(run_id)
    }

    fn get_run(&self, run_id: RunId) -> StoreResult<Run> {
        let sql = format!("SELECT {} FROM runs WHERE run_id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], Self::row_to_run)
            .optional()?
            .ok_or(StoreError::RunNotFound(run_id))
    }

    fn list_runs(&self) -> StoreResult<Vec<Run>> {
        let sql = format!("SELECT {} FROM runs ORDER BY run_id", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], Self::row_to_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    fn set_run_status(&mut self, run_id: RunId, status: RunStatus) -> StoreResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE run_id = ?2",
            params![status.as_str(), run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn set_run_matrices(&mut self, run_id: RunId, matrices: &RunMatrices) -> StoreResult<()> {
        let columns = matrices.to_columns()?;
        let updated = self.conn.execute(
            "UPDATE runs SET df_identity = ?1, df_coverage = ?2, df_alnlength = ?3, \
             df_simerrors = ?4, df_hadamard = ?5 WHERE run_id = ?6",
            params![
                columns.df_identity,
                columns.df_coverage,
                columns.df_alnlength,
                columns.df_simerrors,
                columns.df_hadamard,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn add_genome(&mut self, genome: NewGenome) -> StoreResult<Genome> {
        self.conn.execute(
            "INSERT OR IGNORE INTO genomes (genome_hash, path, length, description) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                genome.genome_hash,
                genome.path.display().to_string(),
                genome.length as i64,
                genome.description
            ],
        )?;
        let sql = format!("SELECT {} FROM genomes WHERE genome_hash = ?1", GENOME_COLUMNS);
        let stored = self
            .conn
            .query_row(&sql, params![genome.genome_hash], Self::row_to_genome)?;
        Ok(stored)
    }

    fn add_run_genome(&mut self, run_id: RunId, genome_id: GenomeId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO runs_genomes (run_id, genome_id) VALUES (?1, ?2)",
            params![run_id, genome_id],
        )?;
        Ok(())
    }

    fn run_genomes(&self, run_id: RunId) -> StoreResult<Vec<Genome>> {
        let sql = format!(
            "SELECT {} FROM genomes WHERE genome_id IN \
             (SELECT genome_id FROM runs_genomes WHERE run_id = ?1) ORDER BY genome_id",
            GENOME_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let genomes = stmt
            .query_map(params![run_id], Self::row_to_genome)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(genomes)
    }

    fn add_label(&mut self, label: GenomeLabel) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO labels (genome_id, run_id, label, class_label) \
             VALUES (?1, ?2, ?3, ?4)",
            params![label.genome_id, label.run_id, label.label, label.class_label],
        )?;
        Ok(())
    }

    fn run_labels(&self, run_id: RunId) -> StoreResult<Vec<GenomeLabel>> {
        let mut stmt = self.conn.prepare(
            "SELECT genome_id, run_id, label, class_label FROM labels \
             WHERE run_id = ?1 ORDER BY genome_id",
        )?;
        let labels = stmt
            .query_map(params![run_id], |row| {
                Ok(GenomeLabel {
                    genome_id: row.get(0)?,
                    run_id: row.get(1)?,
                    label: row.get(2)?,
                    class_label: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    fn comparisons(&self) -> StoreResult<Vec<Comparison>> {
        let sql = format!("SELECT {} FROM comparisons ORDER BY comparison_id", COMPARISON_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let comparisons = stmt
            .query_map([], Self::row_to_comparison)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comparisons)
    }

    fn add_comparison(&mut self, comparison: NewComparison) -> StoreResult<Comparison> {
        let key = &comparison.key;
        let m = &comparison.metrics;
        self.conn.execute(
            "INSERT OR IGNORE INTO comparisons (query_id, subject_id, program, version, fragsize, \
             maxmatch, aln_length, sim_errs, identity, cov_query, cov_subject) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                key.query_id,
                key.subject_id,
                key.program,
                key.version,
                key.fragsize.map(i64::from),
                key.maxmatch,
                m.aln_length as i64,
                m.sim_errs as i64,
                m.identity,
                m.cov_query,
                m.cov_subject
            ],
        )?;
        self.find_comparison(&comparison)?.ok_or_else(|| {
            StoreError::Corruption(format!("comparison {:?} missing after insert", comparison.key))
        })
    }

    fn add_run_comparison(&mut self, run_id: RunId, comparison_id: ComparisonId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO runs_comparisons (run_id, comparison_id) VALUES (?1, ?2)",
            params![run_id, comparison_id],
        )?;
        Ok(())
    }

    fn run_comparisons(&self, run_id: RunId) -> StoreResult<Vec<Comparison>> {
        let sql = format!(
            "SELECT {} FROM comparisons WHERE comparison_id IN \
             (SELECT comparison_id FROM runs_comparisons WHERE run_id = ?1) \
             ORDER BY comparison_id",
            COMPARISON_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let comparisons = stmt
            .query_map(params![run_id], Self::row_to_comparison)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comparisons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComparisonKey, ComparisonMetrics, ANIM_METHOD};
    use tempfile::TempDir;

    fn new_run(name: &str) -> NewRun {
        NewRun {
            method: ANIM_METHOD.to_string(),
            cmdline: "ani anim in out".to_string(),
            date: Utc::now(),
            status: RunStatus::Started,
            name: name.to_string(),
        }
    }

    fn new_genome(hash: &str, length: u64) -> NewGenome {
        NewGenome {
            genome_hash: hash.to_string(),
            path: PathBuf::from(format!("/genomes/{}.fna", hash)),
            length,
            description: format!("genome {}", hash),
        }
    }

    fn metrics(aln_length: u64) -> ComparisonMetrics {
        ComparisonMetrics {
            aln_length,
            sim_errs: 10,
            identity: 0.99,
            cov_query: 0.5,
            cov_subject: 0.6,
        }
    }

    #[test]
    fn test_run_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let run = store.add_run(new_run("first")).unwrap();
        assert_eq!(run.status, RunStatus::Started);
        assert!(run.matrices.df_identity.is_none());

        store.set_run_status(run.run_id, RunStatus::Complete).unwrap();
        let loaded = store.get_run(run.run_id).unwrap();
        assert_eq!(loaded.status, RunStatus::Complete);
        assert_eq!(loaded.name, "first");
        assert_eq!(loaded.date.timestamp(), run.date.timestamp());
        assert_eq!(store.list_runs().unwrap().len(), 1);
        assert!(matches!(store.get_run(99), Err(StoreError::RunNotFound(99))));
    }

    #[test]
    fn test_genome_hash_is_unique() {
        let mut store = SqliteStore::in_memory().unwrap();
        let first = store.add_genome(new_genome("abc", 100)).unwrap();
        let again = store.add_genome(new_genome("abc", 100)).unwrap();
        let other = store.add_genome(new_genome("def", 200)).unwrap();
        assert_eq!(first.genome_id, again.genome_id);
        assert_ne!(first.genome_id, other.genome_id);

        let run = store.add_run(new_run("r")).unwrap();
        store.add_run_genome(run.run_id, other.genome_id).unwrap();
        store.add_run_genome(run.run_id, first.genome_id).unwrap();
        store.add_run_genome(run.run_id, first.genome_id).unwrap();
        let genomes = store.run_genomes(run.run_id).unwrap();
        assert_eq!(genomes.iter().map(|g| g.genome_id).collect::<Vec<_>>(), vec![first.genome_id, other.genome_id]);
    }

    #[test]
    fn test_comparison_key_collision_keeps_first() {
        let mut store = SqliteStore::in_memory().unwrap();
        let a = store.add_genome(new_genome("a", 100)).unwrap();
        let b = store.add_genome(new_genome("b", 100)).unwrap();
        let key = ComparisonKey::nucmer(a.genome_id, b.genome_id, "3.1", false);

        let first = store
            .add_comparison(NewComparison { key: key.clone(), metrics: metrics(50) })
            .unwrap();
        let second = store
            .add_comparison(NewComparison { key: key.clone(), metrics: metrics(75) })
            .unwrap();
        assert_eq!(first.comparison_id, second.comparison_id);
        assert_eq!(second.aln_length, 50);
        assert_eq!(second.fragsize, None);
        assert_eq!(store.comparisons().unwrap().len(), 1);

        let maxmatch = ComparisonKey::nucmer(a.genome_id, b.genome_id, "3.1", true);
        store.add_comparison(NewComparison { key: maxmatch, metrics: metrics(80) }).unwrap();
        assert_eq!(store.comparisons().unwrap().len(), 2);
    }

    #[test]
    fn test_run_comparisons_are_shared() {
        let mut store = SqliteStore::in_memory().unwrap();
        let a = store.add_genome(new_genome("a", 100)).unwrap();
        let b = store.add_genome(new_genome("b", 100)).unwrap();
        let cmp = store
            .add_comparison(NewComparison {
                key: ComparisonKey::nucmer(a.genome_id, b.genome_id, "3.1", false),
                metrics: metrics(50),
            })
            .unwrap();

        let r1 = store.add_run(new_run("r1")).unwrap();
        let r2 = store.add_run(new_run("r2")).unwrap();
        store.add_run_comparison(r1.run_id, cmp.comparison_id).unwrap();
        store.add_run_comparison(r2.run_id, cmp.comparison_id).unwrap();
        store.add_run_comparison(r2.run_id, cmp.comparison_id).unwrap();

        assert_eq!(store.run_comparisons(r1.run_id).unwrap(), vec![cmp.clone()]);
        assert_eq!(store.run_comparisons(r2.run_id).unwrap(), vec![cmp]);
    }

    #[test]
    fn test_labels_are_per_run() {
        let mut store = SqliteStore::in_memory().unwrap();
        let a = store.add_genome(new_genome("a", 100)).unwrap();
        let b = store.add_genome(new_genome("b", 100)).unwrap();
        let r1 = store.add_run(new_run("r1")).unwrap();
        let r2 = store.add_run(new_run("r2")).unwrap();

        let label = |genome_id, run_id, text: &str| GenomeLabel {
            genome_id,
            run_id,
            label: Some(text.to_string()),
            class_label: None,
        };
        store.add_label(label(b.genome_id, r1.run_id, "old")).unwrap();
        store.add_label(label(b.genome_id, r1.run_id, "B")).unwrap();
        store.add_label(label(a.genome_id, r1.run_id, "A")).unwrap();
        store.add_label(label(a.genome_id, r2.run_id, "other")).unwrap();

        let labels = store.run_labels(r1.run_id).unwrap();
        assert_eq!(labels, vec![label(a.genome_id, r1.run_id, "A"), label(b.genome_id, r1.run_id, "B")]);
        assert_eq!(store.run_labels(r2.run_id).unwrap().len(), 1);
    }

    #[test]
    fn test_run_matrices_are_written() {
        use crate::matrices::RunMatrices;

        let mut store = SqliteStore::in_memory().unwrap();
        let a = store.add_genome(new_genome("a", 100)).unwrap();
        let b = store.add_genome(new_genome("b", 80)).unwrap();
        let run = store.add_run(new_run("r")).unwrap();
        let matrices = RunMatrices::synthesize(&[a, b], &[]);

        store.set_run_matrices(run.run_id, &matrices).unwrap();
        let columns = store.get_run(run.run_id).unwrap().matrices;
        assert!(columns.df_identity.is_some());
        assert!(columns.df_hadamard.is_some());
        assert_eq!(RunMatrices::from_columns(&columns).unwrap(), matrices);
        assert!(matches!(
            store.set_run_matrices(99, &matrices),
            Err(StoreError::RunNotFound(99))
        ));
    }

    #[test]
    fn test_open_creates_file_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".ani").join("anidb");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.add_run(new_run("persisted")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.list_runs().unwrap()[0].name, "persisted");
    }
}
