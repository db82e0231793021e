//! Match refinement: filter, merge and rank raw matches.
//!
//! All matchers' raw matches meet here. Matches below their rule's minimum
//! thresholds or too sparse to be believable are dropped, same-rule matches
//! within bridging distance merge, and overlapping or contained matches
//! between competing rules are resolved deterministically: better-scoring
//! superset wins, ties break on relevance, then rule length, then
//! identifier. The survivors come back sorted by query position.

use crate::index::LicenseIndex;
use crate::matches::{LicenseMatch, MAX_DIST};

/// Matches shorter than this with few high tokens are checked for sparsity.
const SPURIOUS_MAX_ILEN: usize = 20;
const SPURIOUS_MAX_HILEN: usize = 5;
const SPURIOUS_MIN_DENSITY: f64 = 0.3;

/// Refine raw matches into the final ranked list.
pub fn refine_matches(
    index: &LicenseIndex,
    matches: Vec<LicenseMatch>,
    min_score: f64,
) -> Vec<LicenseMatch> {
    if matches.is_empty() {
        return matches;
    }

    let matches = filter_short_matches(index, matches);
    let matches = filter_sparse_matches(matches);
    let matches = LicenseMatch::merge(matches, MAX_DIST);
    let matches = filter_contained_matches(index, matches);
    let matches = filter_below_minimum_coverage(index, matches);
    let matches = filter_low_score(index, matches, min_score);
    let mut matches = LicenseMatch::merge(matches, MAX_DIST);

    matches.sort_by(|a, b| {
        a.qstart()
            .cmp(&b.qstart())
            .then_with(|| a.qend().cmp(&b.qend()))
            .then_with(|| a.rid.cmp(&b.rid))
    });
    matches
}

fn filter_short_matches(index: &LicenseIndex, matches: Vec<LicenseMatch>) -> Vec<LicenseMatch> {
    matches
        .into_iter()
        .filter(|m| !m.is_small(index))
        .collect()
}

/// Drop short, high-poor matches whose positions are scattered rather than
/// contiguous: these are almost always coincidental token soup.
fn filter_sparse_matches(matches: Vec<LicenseMatch>) -> Vec<LicenseMatch> {
    matches
        .into_iter()
        .filter(|m| {
            if m.ilen() < SPURIOUS_MAX_ILEN && m.hilen() < SPURIOUS_MAX_HILEN {
                m.qspan.density() >= SPURIOUS_MIN_DENSITY
                    && m.ispan.density() >= SPURIOUS_MIN_DENSITY
            } else {
                true
            }
        })
        .collect()
}

/// Resolve containment and heavy overlap between matches of different rules.
fn filter_contained_matches(
    index: &LicenseIndex,
    matches: Vec<LicenseMatch>,
) -> Vec<LicenseMatch> {
    if matches.len() < 2 {
        return matches;
    }

    let mut sorted = matches;
    sorted.sort_by(|a, b| {
        a.qstart()
            .cmp(&b.qstart())
            .then_with(|| b.qlen().cmp(&a.qlen()))
            .then_with(|| b.ilen().cmp(&a.ilen()))
    });

    let mut kept: Vec<LicenseMatch> = Vec::with_capacity(sorted.len());
    'next_match: for next in sorted {
        let mut replaces: Option<usize> = None;
        for (idx, current) in kept.iter().enumerate() {
            // identical query regions: the deterministic tie-break decides
            if current.qspan == next.qspan {
                if ranks_at_least(index, current, &next) {
                    continue 'next_match;
                }
                replaces = Some(idx);
                break;
            }
            // a superset that scores at least as well absorbs the subset
            if current.contains_qspan(&next) && current.score(index) >= next.score(index) {
                continue 'next_match;
            }
            // surrounded with same licensing, or dwarfed: drop
            if current.qsurround(&next)
                && (current.same_licensing(&next) || current.qlen() > next.qlen() * 2)
            {
                continue 'next_match;
            }
            // more than half of next overlaps current: drop
            let overlap = current.qspan.overlap(&next.qspan);
            if overlap * 2 > next.qlen() {
                continue 'next_match;
            }
        }
        if let Some(idx) = replaces {
            kept[idx] = next;
        } else {
            kept.push(next);
        }
    }
    kept
}

/// True when `a` beats or ties `b` under the deterministic order: score,
/// then relevance, then rule length, then lexically smallest identifier.
fn ranks_at_least(index: &LicenseIndex, a: &LicenseMatch, b: &LicenseMatch) -> bool {
    let rule_a = index.rule(a.rid);
    let rule_b = index.rule(b.rid);
    let key_a = (a.score(index), rule_a.relevance, rule_a.length);
    let key_b = (b.score(index), rule_b.relevance, rule_b.length);
    match key_a.partial_cmp(&key_b) {
        Some(std::cmp::Ordering::Greater) => true,
        Some(std::cmp::Ordering::Less) => false,
        _ => rule_a.identifier <= rule_b.identifier,
    }
}

fn filter_below_minimum_coverage(
    index: &LicenseIndex,
    matches: Vec<LicenseMatch>,
) -> Vec<LicenseMatch> {
    matches
        .into_iter()
        .filter(|m| {
            let Some(minimum) = index.rule(m.rid).minimum_coverage else {
                return true;
            };
            m.coverage(index) >= minimum as f64
        })
        .collect()
}

fn filter_low_score(
    index: &LicenseIndex,
    matches: Vec<LicenseMatch>,
    min_score: f64,
) -> Vec<LicenseMatch> {
    if min_score <= 0.0 {
        return matches;
    }
    matches
        .into_iter()
        .filter(|m| m.score(index) >= min_score)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::models::{RuleKind, RuleRecord};
    use crate::spans::Span;

    fn refine_index() -> LicenseIndex {
        build_index(vec![
            RuleRecord::new(
                "long_bsd.RULE",
                "bsd-new",
                RuleKind::Text,
                "redistribution and use in source and binary forms with or without \
                 modification are permitted provided that the following conditions \
                 are met redistributions of source code must retain the above \
                 copyright notice this list of conditions and the following disclaimer",
            ),
            RuleRecord::new(
                "short_bsd.RULE",
                "bsd-simplified",
                RuleKind::Notice,
                "redistribution and use in source and binary forms with or without \
                 modification are permitted",
            ),
        ])
        .unwrap()
    }

    fn full_match(index: &LicenseIndex, rid: usize, qoffset: usize) -> LicenseMatch {
        let rule = index.rule(rid);
        LicenseMatch {
            rid,
            license_expression: rule.license_expression.clone(),
            qspan: Span::from_range(qoffset, qoffset + rule.length - 1),
            ispan: Span::from_range(0, rule.length - 1),
            hispan: Span::from_positions(
                (0..rule.length).filter(|&p| !index.is_junk(rule.tokens[p])),
            ),
            matcher: "test",
            start_line: 1,
            end_line: 1,
        }
    }

    #[test]
    fn test_refine_empty() {
        let index = refine_index();
        assert!(refine_matches(&index, vec![], 0.0).is_empty());
    }

    #[test]
    fn test_refine_keeps_full_match() {
        let index = refine_index();
        let m = full_match(&index, 0, 0);
        let refined = refine_matches(&index, vec![m.clone()], 0.0);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].qspan, m.qspan);
    }

    #[test]
    fn test_refine_drops_tiny_match() {
        let index = refine_index();
        let rule = index.rule(0);
        let high_pos = (0..rule.length)
            .find(|&p| !index.is_junk(rule.tokens[p]))
            .unwrap();
        let tiny = LicenseMatch {
            rid: 0,
            license_expression: rule.license_expression.clone(),
            qspan: Span::from_pos(3),
            ispan: Span::from_pos(high_pos),
            hispan: Span::from_pos(high_pos),
            matcher: "test",
            start_line: 1,
            end_line: 1,
        };
        assert!(refine_matches(&index, vec![tiny], 0.0).is_empty());
    }

    #[test]
    fn test_refine_drops_sparse_match() {
        let index = refine_index();
        let rule = index.rule(1);
        // a scattered smattering of positions over a huge range
        let positions: Vec<usize> = (0..4).map(|i| i * 30).collect();
        let ipositions: Vec<usize> = (0..4).collect();
        let sparse = LicenseMatch {
            rid: 1,
            license_expression: rule.license_expression.clone(),
            qspan: Span::from_positions(positions),
            ispan: Span::from_positions(ipositions.clone()),
            hispan: Span::from_positions(
                ipositions
                    .into_iter()
                    .filter(|&p| !index.is_junk(rule.tokens[p])),
            ),
            matcher: "test",
            start_line: 1,
            end_line: 1,
        };
        assert!(refine_matches(&index, vec![sparse], 0.0).is_empty());
    }

    #[test]
    fn test_refine_contained_weaker_match_is_dropped() {
        let index = refine_index();
        // the long rule fully matched, the short rule matched within it
        let long = full_match(&index, 0, 0);
        let short = full_match(&index, 1, 0);
        let refined = refine_matches(&index, vec![long.clone(), short], 0.0);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].rid, 0);
    }

    #[test]
    fn test_refine_tie_break_is_deterministic() {
        // two rules of the same shape, length and relevance, differing only
        // in spelling so they are not duplicates
        let index = build_index(vec![
            RuleRecord::new(
                "aaa.RULE",
                "license-a",
                RuleKind::Notice,
                "this software is released under a permissive open source license \
                 with no warranty of any kind either expressed or implied",
            ),
            RuleRecord::new(
                "bbb.RULE",
                "license-b",
                RuleKind::Notice,
                "this software is released under a permissive open source licence \
                 with no warranty of any kind either expressed or implied",
            ),
        ])
        .unwrap();

        let a = full_match(&index, 0, 0);
        let mut b = full_match(&index, 1, 0);
        // same query span for both
        b.qspan = a.qspan.clone();

        let refined = refine_matches(&index, vec![a, b], 0.0);
        assert_eq!(refined.len(), 1);
        // equal score, relevance and length: the lexically smallest rule
        // identifier wins
        assert_eq!(index.rule(refined[0].rid).identifier, "aaa.RULE");
    }

    #[test]
    fn test_refine_sorts_by_query_position() {
        let index = refine_index();
        let first = full_match(&index, 1, 100);
        let second = full_match(&index, 0, 0);
        let refined = refine_matches(&index, vec![first, second], 0.0);
        assert_eq!(refined.len(), 2);
        assert!(refined[0].qstart() < refined[1].qstart());
    }

    #[test]
    fn test_refine_min_score_filter() {
        let index = refine_index();
        let rule = index.rule(0);
        // half the rule matched: coverage well below 100
        let half_len = rule.length / 2;
        let half = LicenseMatch {
            rid: 0,
            license_expression: rule.license_expression.clone(),
            qspan: Span::from_range(0, half_len - 1),
            ispan: Span::from_range(0, half_len - 1),
            hispan: Span::from_positions(
                (0..half_len).filter(|&p| !index.is_junk(rule.tokens[p])),
            ),
            matcher: "test",
            start_line: 1,
            end_line: 1,
        };
        let kept = refine_matches(&index, vec![half.clone()], 0.0);
        assert_eq!(kept.len(), 1);
        let dropped = refine_matches(&index, vec![half], 99.0);
        assert!(dropped.is_empty());
    }
}
