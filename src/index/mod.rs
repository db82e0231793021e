//! License rule index: the read-only retrieval layer.
//!
//! The index owns the token dictionary, every indexed rule, the inverted
//! postings and the per-rule token sets used for candidate filtering. It is
//! built once from the corpus records and never mutated afterwards, so it can
//! be shared read-only across concurrent per-file matching tasks.

pub mod builder;
pub mod dictionary;
pub mod token_sets;

use std::collections::{HashMap, HashSet};

use crate::index::dictionary::TokenDictionary;
use crate::index::token_sets::TokenSets;
use crate::models::Rule;

pub use builder::build_index;

/// All index structures needed by the matching strategies.
///
/// - `rid_by_hash` backs the whole-run exact matcher.
/// - `postings_by_rid` backs the inverted matcher: token id -> sorted
///   positions within the rule.
/// - `sets_by_rid` backs candidate selection with per-rule token multisets.
/// - `small_rids` lists the rules handled by the sliding-window matcher.
#[derive(Debug, Clone)]
pub struct LicenseIndex {
    pub dictionary: TokenDictionary,

    /// Number of junk token ids; `tid < len_junk` is the junk test.
    pub len_junk: usize,

    /// Token ids whose text is digits only. Long runs of these are never
    /// matchable on their own.
    pub digit_only_tids: HashSet<u16>,

    /// All rules, indexed by rule id.
    pub rules_by_rid: Vec<Rule>,

    /// Inverted postings per rule: token id -> sorted positions in the rule.
    pub postings_by_rid: Vec<HashMap<u16, Vec<usize>>>,

    /// Per-rule token sets and multisets, split at the junk boundary.
    pub sets_by_rid: Vec<TokenSets>,

    /// Hash of a rule's whole token sequence -> rule id, for regular rules.
    pub rid_by_hash: HashMap<[u8; 20], usize>,

    /// Rule ids that produce reportable matches.
    pub regular_rids: HashSet<usize>,

    /// Rule ids whose matches are false positives to be subtracted.
    pub false_positive_rids: HashSet<usize>,

    /// Regular rule ids under the small-rule threshold, for the
    /// sliding-window matcher.
    pub small_rids: Vec<usize>,
}

impl LicenseIndex {
    pub fn rule(&self, rid: usize) -> &Rule {
        &self.rules_by_rid[rid]
    }

    /// The token id sequence of a rule.
    pub fn tokens(&self, rid: usize) -> &[u16] {
        &self.rules_by_rid[rid].tokens
    }

    #[inline]
    pub fn is_junk(&self, tid: u16) -> bool {
        (tid as usize) < self.len_junk
    }

    pub fn rule_count(&self) -> usize {
        self.rules_by_rid.len()
    }
}
