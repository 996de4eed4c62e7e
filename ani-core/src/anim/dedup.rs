//! Reduce the candidate pairs of a run to the ones that still need work

use std::collections::HashMap;

use crate::types::{Comparison, ComparisonKey, Genome};

/// Every unordered pair of `genomes`, query first.
///
/// Genomes are ordered by id so the query is always the lower id and the
/// result does not depend on the order genomes were registered in.
pub fn candidate_pairs(genomes: &[Genome]) -> Vec<(Genome, Genome)> {
    let mut sorted: Vec<&Genome> = genomes.iter().collect();
    sorted.sort_by_key(|g| g.genome_id);

    let n = sorted.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for (i, query) in sorted.iter().enumerate() {
        for subject in &sorted[i + 1..] {
            pairs.push(((*query).clone(), (*subject).clone()));
        }
    }
    pairs
}

#[derive(Debug, Default)]
pub struct Deduplication {
    /// Stored comparisons whose key matched a candidate pair
    pub reused: Vec<Comparison>,
    /// Pairs without a stored result
    pub to_run: Vec<(Genome, Genome)>,
}

impl Deduplication {
    pub fn nothing_to_run(&self) -> bool {
        self.to_run.is_empty()
    }
}

/// Split `pairs` into reusable stored results and pairs still to compute
pub fn deduplicate(
    pairs: Vec<(Genome, Genome)>,
    existing: Vec<Comparison>,
    version: &str,
    maxmatch: bool,
) -> Deduplication {
    let known: HashMap<ComparisonKey, Comparison> =
        existing.into_iter().map(|c| (c.key(), c)).collect();
    log::info!("{} existing comparisons in the store", known.len());

    let mut result = Deduplication::default();
    for (query, subject) in pairs {
        let key = ComparisonKey::nucmer(query.genome_id, subject.genome_id, version, maxmatch);
        match known.get(&key) {
            Some(comparison) => {
                log::debug!(
                    "Reusing comparison {} for {} vs {}",
                    comparison.comparison_id,
                    query.genome_id,
                    subject.genome_id
                );
                result.reused.push(comparison.clone());
            }
            None => result.to_run.push((query, subject)),
        }
    }

    log::info!(
        "{} comparisons reused, {} still to run",
        result.reused.len(),
        result.to_run.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenomeId, NUCMER_PROGRAM};
    use std::path::PathBuf;

    fn genome(id: GenomeId) -> Genome {
        Genome {
            genome_id: id,
            genome_hash: format!("{:016x}", id),
            path: PathBuf::from(format!("/data/{}.fna", id)),
            length: 1000,
            description: String::new(),
        }
    }

    fn stored(id: i64, q: GenomeId, s: GenomeId, version: &str, maxmatch: bool) -> Comparison {
        Comparison {
            comparison_id: id,
            query_id: q,
            subject_id: s,
            program: NUCMER_PROGRAM.to_string(),
            version: version.to_string(),
            fragsize: None,
            maxmatch,
            aln_length: 900,
            sim_errs: 9,
            identity: 0.99,
            cov_query: 0.9,
            cov_subject: 0.9,
        }
    }

    fn ids(pairs: &[(Genome, Genome)]) -> Vec<(GenomeId, GenomeId)> {
        pairs.iter().map(|(q, s)| (q.genome_id, s.genome_id)).collect()
    }

    #[test]
    fn test_candidate_pairs_are_ordered_combinations() {
        let pairs = candidate_pairs(&[genome(3), genome(1), genome(2)]);
        assert_eq!(ids(&pairs), vec![(1, 2), (1, 3), (2, 3)]);
        assert!(candidate_pairs(&[genome(1)]).is_empty());
    }

    #[test]
    fn test_matching_key_is_reused() {
        let pairs = candidate_pairs(&[genome(1), genome(2), genome(3)]);
        let result = deduplicate(pairs, vec![stored(10, 1, 2, "3.1", false)], "3.1", false);

        assert_eq!(result.reused.len(), 1);
        assert_eq!(result.reused[0].comparison_id, 10);
        assert_eq!(ids(&result.to_run), vec![(1, 3), (2, 3)]);
        assert!(!result.nothing_to_run());
    }

    #[test]
    fn test_key_mismatch_is_not_reused() {
        let existing = vec![
            stored(1, 1, 2, "4.0.0", false),
            stored(2, 1, 2, "3.1", true),
            stored(3, 2, 1, "3.1", false),
        ];
        let result = deduplicate(candidate_pairs(&[genome(1), genome(2)]), existing, "3.1", false);
        assert!(result.reused.is_empty());
        assert_eq!(ids(&result.to_run), vec![(1, 2)]);
    }

    #[test]
    fn test_everything_stored() {
        let existing = vec![stored(1, 1, 2, "3.1", true)];
        let result = deduplicate(candidate_pairs(&[genome(1), genome(2)]), existing, "3.1", true);
        assert!(result.nothing_to_run());
        assert_eq!(result.reused.len(), 1);
    }
}
