//! Token id set and multiset helpers for candidate filtering.
//!
//! Candidate selection works on cheap set and multiset intersections before
//! any positional alignment runs. Sets and multisets are always kept split
//! into a junk ("low") part and a discriminating ("high") part at the
//! dictionary's `len_junk` boundary.

use std::collections::{HashMap, HashSet};

/// A token id set and multiset split at the junk boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSets {
    pub low_set: HashSet<u16>,
    pub high_set: HashSet<u16>,
    pub low_mset: HashMap<u16, usize>,
    pub high_mset: HashMap<u16, usize>,
}

impl TokenSets {
    /// Build split sets and multisets from a token id sequence.
    pub fn build(token_ids: impl IntoIterator<Item = u16>, len_junk: usize) -> Self {
        let mut sets = TokenSets::default();
        for tid in token_ids {
            if (tid as usize) < len_junk {
                sets.low_set.insert(tid);
                *sets.low_mset.entry(tid).or_insert(0) += 1;
            } else {
                sets.high_set.insert(tid);
                *sets.high_mset.entry(tid).or_insert(0) += 1;
            }
        }
        sets
    }

    pub fn is_empty(&self) -> bool {
        self.low_set.is_empty() && self.high_set.is_empty()
    }
}

/// Intersection of two token id sets.
pub fn sets_intersection(a: &HashSet<u16>, b: &HashSet<u16>) -> HashSet<u16> {
    a.intersection(b).copied().collect()
}

/// Intersection of two multisets: for each shared token the minimum of the
/// two occurrence counts.
pub fn msets_intersection(a: &HashMap<u16, usize>, b: &HashMap<u16, usize>) -> HashMap<u16, usize> {
    // iterate the smaller side
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut result = HashMap::new();
    for (&tid, &count) in small {
        if let Some(&other) = large.get(&tid) {
            let min = count.min(other);
            if min > 0 {
                result.insert(tid, min);
            }
        }
    }
    result
}

/// Sum of occurrence counts in a multiset, its cardinality.
pub fn mset_counter(mset: &HashMap<u16, usize>) -> usize {
    mset.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_splits_at_len_junk() {
        let sets = TokenSets::build(vec![0, 1, 1, 5, 6, 6, 6], 3);
        assert_eq!(sets.low_set.len(), 2);
        assert_eq!(sets.high_set.len(), 2);
        assert_eq!(sets.low_mset[&1], 2);
        assert_eq!(sets.high_mset[&6], 3);
    }

    #[test]
    fn test_build_empty() {
        let sets = TokenSets::build(vec![], 3);
        assert!(sets.is_empty());
    }

    #[test]
    fn test_sets_intersection() {
        let a: HashSet<u16> = [1, 2, 3].into_iter().collect();
        let b: HashSet<u16> = [2, 3, 4].into_iter().collect();
        let inter = sets_intersection(&a, &b);
        assert_eq!(inter.len(), 2);
        assert!(inter.contains(&2));
        assert!(inter.contains(&3));
    }

    #[test]
    fn test_msets_intersection_takes_minimum_counts() {
        let a: HashMap<u16, usize> = [(1, 3), (2, 1), (5, 2)].into_iter().collect();
        let b: HashMap<u16, usize> = [(1, 2), (2, 4), (9, 1)].into_iter().collect();
        let inter = msets_intersection(&a, &b);
        assert_eq!(inter.get(&1), Some(&2));
        assert_eq!(inter.get(&2), Some(&1));
        assert_eq!(inter.get(&5), None);
        assert_eq!(inter.get(&9), None);
    }

    #[test]
    fn test_mset_counter() {
        let mset: HashMap<u16, usize> = [(1, 3), (2, 2), (3, 1)].into_iter().collect();
        assert_eq!(mset_counter(&mset), 6);
        assert_eq!(mset_counter(&HashMap::new()), 0);
    }
}
