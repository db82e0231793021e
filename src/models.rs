//! Core data structures for the rule corpus.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Rules shorter than this many tokens are considered "small": they are only
/// matched with exact strategies and stricter thresholds.
pub const SMALL_RULE: usize = 15;

/// Minimum matched token count for an approximate match.
pub const MIN_MATCH_LENGTH: usize = 4;

/// Minimum matched high-token count for an approximate match.
pub const MIN_MATCH_HIGH_LENGTH: usize = 3;

/// Default number of consecutive mismatching high tokens the chunk matcher
/// may skip while extending a match.
pub const MAX_GAP_SKIP: usize = 15;

/// What a rule asserts when it matches. Exactly one kind per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// A full license text. The strongest detection.
    Text,
    /// An explicit notice such as "Licensed under the MIT license".
    Notice,
    /// A reference to a license: a bare name or URL.
    Reference,
    /// A structured licensing tag, e.g. an SPDX identifier line.
    Tag,
    /// An introductory statement preceding actual license text.
    Intro,
    /// A weak clue, not conclusive on its own.
    Clue,
    /// Text that looks like a license but is not one; matches are subtracted.
    FalsePositive,
}

impl RuleKind {
    pub fn is_false_positive(self) -> bool {
        matches!(self, RuleKind::FalsePositive)
    }
}

/// A rule as supplied by the corpus loader, before indexing.
///
/// The text may contain `{{...}}` template wildcard markup. Relevance is a
/// 0-100 weight of how conclusive a match against this rule is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub identifier: String,
    pub license_expression: String,
    pub kind: RuleKind,
    pub text: String,
    pub relevance: u8,
    pub minimum_coverage: Option<u8>,
    pub notes: Option<String>,
}

impl RuleRecord {
    pub fn new(identifier: &str, license_expression: &str, kind: RuleKind, text: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            license_expression: license_expression.to_string(),
            kind,
            text: text.to_string(),
            relevance: 100,
            minimum_coverage: None,
            notes: None,
        }
    }

    pub fn with_relevance(mut self, relevance: u8) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_minimum_coverage(mut self, minimum_coverage: u8) -> Self {
        self.minimum_coverage = Some(minimum_coverage);
        self
    }
}

/// Per-rule match thresholds, derived from the rule statistics at index
/// build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub high_len: usize,
    pub low_len: usize,
    pub length: usize,
    pub small: bool,
    /// Minimum matched high-token count for a match to stand.
    pub min_high: usize,
    /// Minimum matched token count for a match to stand.
    pub min_len: usize,
    /// Budget of consecutive mismatching high tokens the chunk extension may
    /// skip over.
    pub max_gap_skip: usize,
}

/// One indexed reference rule: token ids, template gaps and derived
/// statistics. Immutable once the index is built.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule id, the position of this rule in the index.
    pub rid: usize,
    pub identifier: String,
    pub license_expression: String,
    pub kind: RuleKind,
    pub relevance: u8,
    pub minimum_coverage: Option<u8>,
    pub notes: Option<String>,

    /// Rule text with template markup stripped, kept for reporting.
    pub text: String,

    /// Token id sequence.
    pub tokens: Vec<u16>,

    /// Positions after which a template wildcard permits skipping.
    pub gaps: BTreeSet<usize>,

    /// Token count.
    pub length: usize,

    /// Count of high (discriminating) token occurrences.
    pub high_length: usize,

    /// Count of junk token occurrences.
    pub low_length: usize,

    /// Count of unique token ids.
    pub length_unique: usize,

    /// Count of unique high token ids.
    pub high_unique: usize,

    /// Count of unique junk token ids.
    pub low_unique: usize,

    /// True for rules under the small-rule length threshold.
    pub is_small: bool,

    /// True for rules whose text is a bare URL; these only match exactly.
    pub is_url: bool,

    thresholds: Thresholds,
    thresholds_unique: Thresholds,
}

impl Rule {
    /// Build a rule from its record metadata and indexing results. Statistics
    /// and thresholds are computed here, once.
    pub fn new(
        rid: usize,
        record: &RuleRecord,
        text: String,
        tokens: Vec<u16>,
        gaps: BTreeSet<usize>,
        len_junk: usize,
        unique_counts: (usize, usize, usize),
    ) -> Self {
        let length = tokens.len();
        let high_length = tokens.iter().filter(|&&t| (t as usize) >= len_junk).count();
        let low_length = length - high_length;
        let (length_unique, high_unique, low_unique) = unique_counts;
        let is_small = length < SMALL_RULE;
        let is_url = {
            let trimmed = record.text.trim_start();
            (trimmed.starts_with("http://")
                || trimmed.starts_with("https://")
                || trimmed.starts_with("ftp://"))
                && !trimmed.contains('\n')
        };
        let has_gaps = !gaps.is_empty();

        let thresholds =
            compute_thresholds(length, high_length, low_length, is_small, has_gaps, is_url);
        let thresholds_unique = compute_thresholds_unique(
            length,
            length_unique,
            high_unique,
            low_unique,
            is_small,
            has_gaps,
            is_url,
        );

        Self {
            rid,
            identifier: record.identifier.clone(),
            license_expression: record.license_expression.clone(),
            kind: record.kind,
            relevance: record.relevance,
            minimum_coverage: record.minimum_coverage,
            notes: record.notes.clone(),
            text,
            tokens,
            gaps,
            length,
            high_length,
            low_length,
            length_unique,
            high_unique,
            low_unique,
            is_small,
            is_url,
            thresholds,
            thresholds_unique,
        }
    }

    /// Thresholds considering every token occurrence.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Thresholds considering only unique token ids.
    pub fn thresholds_unique(&self) -> Thresholds {
        self.thresholds_unique
    }

    /// True if this rule carries the same licensing as another.
    pub fn same_licensing(&self, other: &Rule) -> bool {
        self.license_expression == other.license_expression
    }
}

/// Threshold cascade over all token occurrences: the shorter a rule, the
/// larger the fraction of it that must be matched and the smaller the gap
/// budget.
fn compute_thresholds(
    length: usize,
    high_length: usize,
    low_length: usize,
    small: bool,
    has_gaps: bool,
    is_url: bool,
) -> Thresholds {
    let mut min_high = MIN_MATCH_HIGH_LENGTH.min(high_length);
    let mut min_len = MIN_MATCH_LENGTH.min(length);
    let mut max_gap_skip = MAX_GAP_SKIP;

    if length < 30 {
        min_high = high_length;
        min_len = length / 2;
        max_gap_skip = 1;
    }
    if length < 10 {
        min_high = high_length;
        min_len = length;
        max_gap_skip = if has_gaps { 1 } else { 0 };
    }
    if is_url {
        min_high = high_length;
        min_len = length;
        max_gap_skip = 0;
    }

    Thresholds {
        high_len: high_length,
        low_len: low_length,
        length,
        small,
        min_high,
        min_len,
        max_gap_skip,
    }
}

/// Threshold cascade over unique token ids, used by candidate selection.
fn compute_thresholds_unique(
    length: usize,
    length_unique: usize,
    high_unique: usize,
    low_unique: usize,
    small: bool,
    has_gaps: bool,
    is_url: bool,
) -> Thresholds {
    let mut min_high = (high_unique / 2).min(MIN_MATCH_HIGH_LENGTH);
    let mut min_len = MIN_MATCH_LENGTH.min(length_unique);
    let mut max_gap_skip = MAX_GAP_SKIP;

    if length < 20 {
        min_high = high_unique;
        min_len = min_high;
        max_gap_skip = 1;
    }
    if length < 10 {
        min_high = high_unique;
        min_len = if length_unique < 2 {
            length_unique
        } else {
            length_unique - 1
        };
        max_gap_skip = if has_gaps { 1 } else { 0 };
    }
    if length < 5 {
        min_high = high_unique;
        min_len = length_unique;
        max_gap_skip = if has_gaps { 1 } else { 0 };
    }
    if is_url {
        min_high = high_unique;
        min_len = length_unique;
        max_gap_skip = 0;
    }

    Thresholds {
        high_len: high_unique,
        low_len: low_unique,
        length: length_unique,
        small,
        min_high,
        min_len,
        max_gap_skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rule(tokens: Vec<u16>, len_junk: usize) -> Rule {
        let record = RuleRecord::new("test.RULE", "mit", RuleKind::Notice, "test text");
        let unique: std::collections::HashSet<u16> = tokens.iter().copied().collect();
        let high_unique = unique.iter().filter(|&&t| (t as usize) >= len_junk).count();
        let low_unique = unique.len() - high_unique;
        Rule::new(
            0,
            &record,
            "test text".to_string(),
            tokens,
            BTreeSet::new(),
            len_junk,
            (unique.len(), high_unique, low_unique),
        )
    }

    #[test]
    fn test_rule_kind_false_positive() {
        assert!(RuleKind::FalsePositive.is_false_positive());
        assert!(!RuleKind::Text.is_false_positive());
        assert!(!RuleKind::Clue.is_false_positive());
    }

    #[test]
    fn test_rule_kind_serde_kebab_case() {
        let kind: RuleKind = serde_yaml::from_str("false-positive").unwrap();
        assert_eq!(kind, RuleKind::FalsePositive);
        let kind: RuleKind = serde_yaml::from_str("notice").unwrap();
        assert_eq!(kind, RuleKind::Notice);
    }

    #[test]
    fn test_rule_record_builder() {
        let record = RuleRecord::new("r1.RULE", "gpl-2.0", RuleKind::Text, "text")
            .with_relevance(80)
            .with_minimum_coverage(50);
        assert_eq!(record.relevance, 80);
        assert_eq!(record.minimum_coverage, Some(50));
    }

    #[test]
    fn test_rule_lengths() {
        // len_junk 5: ids below 5 are junk
        let rule = make_rule(vec![1, 2, 7, 8, 8, 9], 5);
        assert_eq!(rule.length, 6);
        assert_eq!(rule.high_length, 4);
        assert_eq!(rule.low_length, 2);
        assert_eq!(rule.length_unique, 5);
        assert_eq!(rule.high_unique, 3);
        assert_eq!(rule.low_unique, 2);
        assert!(rule.is_small);
    }

    #[test]
    fn test_thresholds_tiny_rule_requires_everything() {
        let rule = make_rule(vec![7, 8, 9], 5);
        let thresholds = rule.thresholds();
        assert_eq!(thresholds.min_len, 3);
        assert_eq!(thresholds.min_high, 3);
        assert_eq!(thresholds.max_gap_skip, 0);
    }

    #[test]
    fn test_thresholds_medium_rule() {
        let tokens: Vec<u16> = (5..25).collect();
        let rule = make_rule(tokens, 5);
        let thresholds = rule.thresholds();
        assert_eq!(thresholds.min_len, 10);
        assert_eq!(thresholds.min_high, 20);
        assert_eq!(thresholds.max_gap_skip, 1);
    }

    #[test]
    fn test_thresholds_large_rule() {
        let tokens: Vec<u16> = (0..50).collect();
        let rule = make_rule(tokens, 5);
        let thresholds = rule.thresholds();
        assert_eq!(thresholds.min_len, MIN_MATCH_LENGTH);
        assert_eq!(thresholds.min_high, MIN_MATCH_HIGH_LENGTH);
        assert_eq!(thresholds.max_gap_skip, MAX_GAP_SKIP);
        assert!(!rule.is_small);
    }

    #[test]
    fn test_thresholds_url_rule_is_exact_only() {
        let record = RuleRecord::new("url.RULE", "mit", RuleKind::Reference, "https://example.com/mit");
        let tokens = vec![7u16, 8, 9, 10];
        let rule = Rule::new(
            0,
            &record,
            "https example com mit".to_string(),
            tokens,
            BTreeSet::new(),
            5,
            (4, 4, 0),
        );
        assert!(rule.is_url);
        assert_eq!(rule.thresholds().max_gap_skip, 0);
        assert_eq!(rule.thresholds().min_len, 4);
    }

    #[test]
    fn test_thresholds_gapped_short_rule_keeps_gap_budget() {
        let record = RuleRecord::new("g.RULE", "mit", RuleKind::Notice, "a {{b}} c");
        let mut gaps = BTreeSet::new();
        gaps.insert(1);
        let rule = Rule::new(
            0,
            &record,
            "licensed under gpl".to_string(),
            vec![7, 8, 9],
            gaps,
            5,
            (3, 3, 0),
        );
        assert_eq!(rule.thresholds().max_gap_skip, 1);
    }
}
