//! Index construction.
//!
//! Builds every index structure from the corpus rule records in one pass
//! ordering: tokenize and count, partition the dictionary into junk and
//! discriminating ids by corpus frequency, then assemble rules, postings,
//! token sets and the exact-hash table. Construction fails loudly on an empty
//! rule, on a rule made entirely of junk and on duplicated rules; a partial
//! index is never returned.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use crate::index::LicenseIndex;
use crate::index::dictionary::TokenDictionary;
use crate::index::token_sets::TokenSets;
use crate::match_hash::compute_hash;
use crate::models::{Rule, RuleKind, RuleRecord};
use crate::tokenize::tokenize_template;

/// One out of this many vocabulary tokens is classified junk by frequency
/// rank, on top of the always-junk digit and single-character tokens.
const JUNK_PROPORTION: usize = 3;

/// A token must appear in at least this many rules to be junk by frequency
/// rank.
const MIN_JUNK_RULES: usize = 2;

/// Build a read-only index from corpus rule records.
pub fn build_index(records: Vec<RuleRecord>) -> Result<LicenseIndex> {
    // First pass: tokenize every rule and count corpus frequencies.
    let mut tokenized = Vec::with_capacity(records.len());
    let mut rule_doc_freq: HashMap<String, usize> = HashMap::new();
    let mut total_freq: HashMap<String, usize> = HashMap::new();

    for record in &records {
        let parsed = tokenize_template(&record.text);
        if parsed.tokens.is_empty() {
            bail!(
                "invalid rule {}: text tokenizes to zero tokens",
                record.identifier
            );
        }
        let seen: HashSet<&String> = parsed.tokens.iter().collect();
        for token in seen {
            *rule_doc_freq.entry(token.clone()).or_insert(0) += 1;
        }
        for token in &parsed.tokens {
            *total_freq.entry(token.clone()).or_insert(0) += 1;
        }
        tokenized.push(parsed);
    }

    let dictionary = partition_dictionary(&tokenized, &rule_doc_freq, &total_freq)?;
    let len_junk = dictionary.len_junk();

    // Second pass: assemble rules and index structures.
    let mut rules_by_rid: Vec<Rule> = Vec::with_capacity(records.len());
    let mut postings_by_rid: Vec<HashMap<u16, Vec<usize>>> = Vec::with_capacity(records.len());
    let mut sets_by_rid: Vec<TokenSets> = Vec::with_capacity(records.len());
    let mut rid_by_hash: HashMap<[u8; 20], usize> = HashMap::new();
    let mut regular_rids: HashSet<usize> = HashSet::new();
    let mut false_positive_rids: HashSet<usize> = HashSet::new();
    let mut small_rids: Vec<usize> = Vec::new();
    let mut seen_rules: HashMap<RuleKey, String> = HashMap::new();

    for (rid, (record, parsed)) in records.iter().zip(tokenized.into_iter()).enumerate() {
        let token_ids: Vec<u16> = parsed
            .tokens
            .iter()
            .map(|token| {
                dictionary
                    .get(token)
                    .expect("dictionary covers every corpus token")
            })
            .collect();

        if token_ids.iter().all(|&tid| (tid as usize) < len_junk) {
            bail!(
                "invalid rule {}: text is made only of junk tokens",
                record.identifier
            );
        }

        let key = RuleKey {
            tokens: token_ids.clone(),
            license_expression: record.license_expression.clone(),
            kind: record.kind,
            relevance: record.relevance,
            minimum_coverage: record.minimum_coverage,
        };
        if let Some(previous) = seen_rules.get(&key) {
            bail!(
                "duplicate rules: {} and {} have identical token sequences and metadata",
                previous,
                record.identifier
            );
        }
        seen_rules.insert(key, record.identifier.clone());

        let mut postings: HashMap<u16, Vec<usize>> = HashMap::new();
        for (pos, &tid) in token_ids.iter().enumerate() {
            postings.entry(tid).or_default().push(pos);
        }

        let sets = TokenSets::build(token_ids.iter().copied(), len_junk);
        let unique_counts = (
            sets.low_set.len() + sets.high_set.len(),
            sets.high_set.len(),
            sets.low_set.len(),
        );

        let rule = Rule::new(
            rid,
            record,
            parsed.tokens.join(" "),
            token_ids,
            parsed.gaps,
            len_junk,
            unique_counts,
        );

        if record.kind.is_false_positive() {
            false_positive_rids.insert(rid);
        } else {
            rid_by_hash.insert(compute_hash(&rule.tokens), rid);
            regular_rids.insert(rid);
            if rule.is_small {
                small_rids.push(rid);
            }
        }

        rules_by_rid.push(rule);
        postings_by_rid.push(postings);
        sets_by_rid.push(sets);
    }

    let mut digit_only_tids = HashSet::new();
    for tid in 0..dictionary.len() as u16 {
        if let Some(token) = dictionary.token(tid) {
            if token.chars().all(|c| c.is_ascii_digit()) {
                digit_only_tids.insert(tid);
            }
        }
    }

    Ok(LicenseIndex {
        dictionary,
        len_junk,
        digit_only_tids,
        rules_by_rid,
        postings_by_rid,
        sets_by_rid,
        rid_by_hash,
        regular_rids,
        false_positive_rids,
        small_rids,
    })
}

#[derive(PartialEq, Eq, Hash)]
struct RuleKey {
    tokens: Vec<u16>,
    license_expression: String,
    kind: RuleKind,
    relevance: u8,
    minimum_coverage: Option<u8>,
}

/// Assign token ids so the most common tokens occupy `[0, len_junk)`.
///
/// Junk candidates are digit-only tokens, single-character tokens and the
/// most corpus-frequent tokens by (rule document frequency, total
/// occurrences) rank, capped at a third of the vocabulary. Frequency-rank
/// junk requires presence in at least `MIN_JUNK_RULES` rules: a token seen in
/// a single rule is discriminating no matter its local count. A token that is
/// the entire text of a one-token rule is never junk. Ordering within each
/// partition is by decreasing frequency with a lexicographic tie-break so id
/// assignment is deterministic.
fn partition_dictionary(
    tokenized: &[crate::tokenize::TemplateTokens],
    rule_doc_freq: &HashMap<String, usize>,
    total_freq: &HashMap<String, usize>,
) -> Result<TokenDictionary> {
    let vocabulary_len = total_freq.len();
    if vocabulary_len > u16::MAX as usize {
        bail!(
            "corpus vocabulary of {} tokens exceeds the dictionary id range",
            vocabulary_len
        );
    }

    let mut protected: HashSet<&str> = HashSet::new();
    for parsed in tokenized {
        if parsed.tokens.len() == 1 {
            protected.insert(parsed.tokens[0].as_str());
        }
    }

    let mut very_common: HashSet<&str> = HashSet::new();
    for token in total_freq.keys() {
        let is_digits = token.chars().all(|c| c.is_ascii_digit());
        let is_single = token.chars().count() == 1;
        if (is_digits || is_single) && !protected.contains(token.as_str()) {
            very_common.insert(token.as_str());
        }
    }

    let frequency_junk_target =
        (vocabulary_len / JUNK_PROPORTION).saturating_sub(very_common.len());

    let mut ranked: Vec<&String> = total_freq.keys().collect();
    ranked.sort_by(|a, b| {
        let freq_a = (rule_doc_freq.get(*a).copied().unwrap_or(0), total_freq[*a]);
        let freq_b = (rule_doc_freq.get(*b).copied().unwrap_or(0), total_freq[*b]);
        freq_b.cmp(&freq_a).then_with(|| a.cmp(b))
    });

    let mut junk: HashSet<&str> = very_common.clone();
    let mut frequency_junk = 0usize;
    for token in &ranked {
        if frequency_junk >= frequency_junk_target {
            break;
        }
        if rule_doc_freq.get(*token).copied().unwrap_or(0) < MIN_JUNK_RULES {
            break;
        }
        if very_common.contains(token.as_str()) || protected.contains(token.as_str()) {
            continue;
        }
        junk.insert(token.as_str());
        frequency_junk += 1;
    }

    // junk ids first, then discriminating ids, both by decreasing frequency
    let sort_key = |token: &&String| {
        (
            std::cmp::Reverse(total_freq[*token]),
            (*token).clone(),
        )
    };
    let mut junk_tokens: Vec<&String> = total_freq
        .keys()
        .filter(|token| junk.contains(token.as_str()))
        .collect();
    junk_tokens.sort_by_key(sort_key);
    let mut high_tokens: Vec<&String> = total_freq
        .keys()
        .filter(|token| !junk.contains(token.as_str()))
        .collect();
    high_tokens.sort_by_key(sort_key);

    let len_junk = junk_tokens.len();
    let ordered: Vec<String> = junk_tokens
        .into_iter()
        .chain(high_tokens)
        .cloned()
        .collect();

    Ok(TokenDictionary::from_ordered_tokens(ordered, len_junk))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str, expression: &str, kind: RuleKind, text: &str) -> RuleRecord {
        RuleRecord::new(identifier, expression, kind, text)
    }

    #[test]
    fn test_build_index_empty_corpus() {
        let index = build_index(vec![]).unwrap();
        assert_eq!(index.rule_count(), 0);
        assert!(index.rid_by_hash.is_empty());
    }

    #[test]
    fn test_build_index_single_rule() {
        let records = vec![record(
            "mit_notice.RULE",
            "mit",
            RuleKind::Notice,
            "Permission is hereby granted free of charge to any person",
        )];
        let index = build_index(records).unwrap();

        assert_eq!(index.rule_count(), 1);
        assert!(index.regular_rids.contains(&0));
        assert!(index.false_positive_rids.is_empty());
        assert_eq!(
            index.rid_by_hash.get(&compute_hash(index.tokens(0))),
            Some(&0)
        );
        assert!(!index.postings_by_rid[0].is_empty());
    }

    #[test]
    fn test_build_index_rejects_empty_rule() {
        let records = vec![record("empty.RULE", "mit", RuleKind::Notice, "!!! ...")];
        let err = build_index(records).unwrap_err().to_string();
        assert!(err.contains("empty.RULE"), "error names the rule: {err}");
        assert!(err.contains("zero tokens"));
    }

    #[test]
    fn test_build_index_rejects_duplicates_naming_both() {
        let text = "Redistribution and use in source and binary forms is permitted";
        let records = vec![
            record("first.RULE", "bsd-new", RuleKind::Text, text),
            record("second.RULE", "bsd-new", RuleKind::Text, text),
        ];
        let err = build_index(records).unwrap_err().to_string();
        assert!(err.contains("first.RULE"), "error names first rule: {err}");
        assert!(err.contains("second.RULE"), "error names second rule: {err}");
    }

    #[test]
    fn test_build_index_same_text_different_licensing_is_not_duplicate() {
        let text = "Redistribution and use in source and binary forms is permitted";
        let records = vec![
            record("first.RULE", "bsd-new", RuleKind::Text, text),
            record("second.RULE", "bsd-simplified", RuleKind::Text, text),
        ];
        assert!(build_index(records).is_ok());
    }

    #[test]
    fn test_build_index_rejects_all_junk_rule() {
        let records = vec![
            record(
                "good.RULE",
                "mit",
                RuleKind::Notice,
                "permission granted to redistribute and use this software freely",
            ),
            record("digits.RULE", "mit", RuleKind::Reference, "1 2 3"),
        ];
        let err = build_index(records).unwrap_err().to_string();
        assert!(err.contains("digits.RULE"));
        assert!(err.contains("junk"));
    }

    #[test]
    fn test_dictionary_ordering_invariant() {
        let records = vec![
            record(
                "r1.RULE",
                "mit",
                RuleKind::Notice,
                "licensed under the mit license the full text of the license follows",
            ),
            record(
                "r2.RULE",
                "gpl-2.0",
                RuleKind::Notice,
                "licensed under the gpl license the full text of the gpl follows",
            ),
            record(
                "r3.RULE",
                "apache-2.0",
                RuleKind::Notice,
                "licensed under the apache license version 2 0 see the notice file",
            ),
        ];
        let index = build_index(records).unwrap();

        // every id below len_junk is junk, every id above is high
        for tid in 0..index.dictionary.len() as u16 {
            assert_eq!(index.is_junk(tid), (tid as usize) < index.len_junk);
        }
        assert!(index.len_junk > 0, "frequent corpus tokens become junk");

        // "the" is the most frequent token in this corpus: it must be junk
        let the = index.dictionary.get("the").unwrap();
        assert!(index.is_junk(the));
    }

    #[test]
    fn test_single_token_rule_token_is_never_junk() {
        // "7" would be digit junk were it not the whole text of one rule
        let records = vec![
            record("seven.RULE", "seven-license", RuleKind::Reference, "7"),
            record(
                "other.RULE",
                "mit",
                RuleKind::Notice,
                "this text mentions 7 licensed material and some 7 more words",
            ),
        ];
        let index = build_index(records).unwrap();
        let seven = index.dictionary.get("7").unwrap();
        assert!(!index.is_junk(seven));
    }

    #[test]
    fn test_false_positive_rules_are_not_hash_matchable() {
        let records = vec![
            record(
                "real.RULE",
                "mit",
                RuleKind::Notice,
                "licensed under the mit license",
            ),
            record(
                "fp.RULE",
                "mit",
                RuleKind::FalsePositive,
                "the license plate number",
            ),
        ];
        let index = build_index(records).unwrap();
        assert!(index.false_positive_rids.contains(&1));
        assert!(!index.regular_rids.contains(&1));
        assert!(
            index
                .rid_by_hash
                .values()
                .all(|&rid| rid != 1)
        );
    }

    #[test]
    fn test_small_rids_collects_small_regular_rules() {
        let long_text = (0..40)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let records = vec![
            record("small.RULE", "mit", RuleKind::Notice, "mit license applies here"),
            record("large.RULE", "gpl-2.0", RuleKind::Text, &long_text),
        ];
        let index = build_index(records).unwrap();
        assert_eq!(index.small_rids, vec![0]);
    }

    #[test]
    fn test_digit_only_tids() {
        let records = vec![record(
            "v.RULE",
            "apache-2.0",
            RuleKind::Notice,
            "apache license version 2 0 applies",
        )];
        let index = build_index(records).unwrap();
        let two = index.dictionary.get("2").unwrap();
        assert!(index.digit_only_tids.contains(&two));
        let apache = index.dictionary.get("apache").unwrap();
        assert!(!index.digit_only_tids.contains(&apache));
    }

    #[test]
    fn test_postings_positions_are_sorted_and_complete() {
        let records = vec![record(
            "rep.RULE",
            "gpl-2.0",
            RuleKind::Notice,
            "licensed under the gpl licensed under the gpl",
        )];
        let index = build_index(records).unwrap();
        let licensed = index.dictionary.get("licensed").unwrap();
        let postings = &index.postings_by_rid[0];
        assert_eq!(postings[&licensed], vec![0, 4]);
        let total: usize = postings.values().map(Vec::len).sum();
        assert_eq!(total, index.tokens(0).len());
    }

    #[test]
    fn test_template_gaps_reach_the_rule() {
        let records = vec![record(
            "tpl.RULE",
            "mit",
            RuleKind::Notice,
            "copyright {{holder}} all rights reserved",
        )];
        let index = build_index(records).unwrap();
        let rule = index.rule(0);
        assert_eq!(rule.length, 4);
        assert!(rule.gaps.contains(&0));
    }
}
