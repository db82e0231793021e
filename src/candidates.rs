//! Candidate rule selection.
//!
//! Before any positional alignment runs, every rule is scored against the
//! query run with cheap set and multiset intersections and ranked by
//! decreasing promise. Rules that cannot possibly reach their own minimum
//! match thresholds are pruned here so the expensive matchers never see
//! them. Selection runs in two steps: unique token sets first, then
//! occurrence multisets to refine the surviving candidates.

use std::collections::HashMap;

use crate::index::LicenseIndex;
use crate::index::token_sets::{TokenSets, mset_counter, msets_intersection, sets_intersection};
use crate::models::Thresholds;
use crate::query::QueryRun;

/// Number of top-ranked candidates handed to the matchers.
pub const TOP_CANDIDATES: usize = 30;

/// Weight of junk-token containment relative to high-token containment.
const LOW_IMPORTANCE: f64 = 0.9;

/// One rule worth aligning against the query run, with the multiset
/// intersection that earned it its rank.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub rid: usize,
    /// Token id -> minimum of query and rule occurrence counts, over both
    /// junk and high tokens.
    pub intersection: HashMap<u16, usize>,
}

/// Ranking vector. Candidates sort by decreasing containment, then
/// resemblance, then intersection sizes; rule id breaks remaining ties so
/// the ranking is deterministic.
#[derive(Debug, Clone, PartialEq)]
struct ScoreVector {
    containment: f64,
    high_containment: f64,
    resemblance: f64,
    high_resemblance: f64,
    high_inter_len: usize,
    matched_length: usize,
}

impl ScoreVector {
    fn ranks_above(&self, other: &Self) -> std::cmp::Ordering {
        self.containment
            .partial_cmp(&other.containment)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                self.high_containment
                    .partial_cmp(&other.high_containment)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                self.resemblance
                    .partial_cmp(&other.resemblance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                self.high_resemblance
                    .partial_cmp(&other.high_resemblance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| self.high_inter_len.cmp(&other.high_inter_len))
            .then_with(|| self.matched_length.cmp(&other.matched_length))
    }
}

/// Rank every regular rule against the run and return the top candidates,
/// highest promise first.
pub fn compute_candidates(
    index: &LicenseIndex,
    query_run: &QueryRun<'_>,
    top: usize,
) -> Vec<Candidate> {
    let query_tids: Vec<u16> = query_run
        .matchable_tokens()
        .into_iter()
        .map(|(_pos, tid)| tid)
        .collect();
    if query_tids.is_empty() {
        return Vec::new();
    }
    let query_sets = TokenSets::build(query_tids, index.len_junk);

    // step one: unique token sets against unique-token thresholds
    let mut survivors: Vec<(ScoreVector, usize)> = Vec::new();
    for &rid in &index.regular_rids {
        let rule_sets = &index.sets_by_rid[rid];
        let thresholds = index.rule(rid).thresholds_unique();
        if let Some(score) = compare_token_sets(&query_sets, rule_sets, &thresholds) {
            survivors.push((score, rid));
        }
    }
    rank(&mut survivors);
    survivors.truncate(top);

    // step two: occurrence multisets against occurrence thresholds
    let mut refined: Vec<(ScoreVector, Candidate)> = Vec::new();
    for (_score, rid) in survivors {
        let rule_sets = &index.sets_by_rid[rid];
        let thresholds = index.rule(rid).thresholds();
        if let Some((score, intersection)) =
            compare_token_msets(&query_sets, rule_sets, &thresholds)
        {
            refined.push((score, Candidate { rid, intersection }));
        }
    }
    refined.sort_by(|a, b| {
        b.0.ranks_above(&a.0)
            .then_with(|| a.1.rid.cmp(&b.1.rid))
    });
    refined.truncate(top);
    refined.into_iter().map(|(_score, cand)| cand).collect()
}

fn rank(survivors: &mut [(ScoreVector, usize)]) {
    survivors.sort_by(|a, b| b.0.ranks_above(&a.0).then_with(|| a.1.cmp(&b.1)));
}

fn compare_token_sets(
    query: &TokenSets,
    rule: &TokenSets,
    thresholds: &Thresholds,
) -> Option<ScoreVector> {
    let high_inter = sets_intersection(&query.high_set, &rule.high_set);
    let high_inter_len = high_inter.len();
    let low_inter = sets_intersection(&query.low_set, &rule.low_set);
    let low_inter_len = low_inter.len();

    score_intersections(
        high_inter_len,
        low_inter_len,
        query.high_set.len(),
        query.low_set.len(),
        rule.high_set.len(),
        rule.low_set.len(),
        thresholds,
    )
}

fn compare_token_msets(
    query: &TokenSets,
    rule: &TokenSets,
    thresholds: &Thresholds,
) -> Option<(ScoreVector, HashMap<u16, usize>)> {
    let high_inter = msets_intersection(&query.high_mset, &rule.high_mset);
    let low_inter = msets_intersection(&query.low_mset, &rule.low_mset);
    let high_inter_len = mset_counter(&high_inter);
    let low_inter_len = mset_counter(&low_inter);

    let score = score_intersections(
        high_inter_len,
        low_inter_len,
        mset_counter(&query.high_mset),
        mset_counter(&query.low_mset),
        mset_counter(&rule.high_mset),
        mset_counter(&rule.low_mset),
        thresholds,
    )?;

    let mut intersection = low_inter;
    intersection.extend(high_inter);
    Some((score, intersection))
}

/// The shared threshold and scoring logic for both steps. Returns None when
/// the rule cannot possibly reach its minimums against this run.
#[allow(clippy::too_many_arguments)]
fn score_intersections(
    high_inter_len: usize,
    low_inter_len: usize,
    query_high_len: usize,
    query_low_len: usize,
    rule_high_len: usize,
    rule_low_len: usize,
    thresholds: &Thresholds,
) -> Option<ScoreVector> {
    if high_inter_len == 0 {
        return None;
    }
    // small rules must have all their tokens present
    if thresholds.small && high_inter_len < thresholds.high_len {
        return None;
    }
    if high_inter_len < thresholds.min_high {
        return None;
    }
    if thresholds.small && low_inter_len < thresholds.low_len {
        return None;
    }
    if high_inter_len + low_inter_len < thresholds.min_len {
        return None;
    }

    let high_union_len = query_high_len + rule_high_len - high_inter_len;
    let union_len = high_union_len + query_low_len + rule_low_len - low_inter_len;
    let high_resemblance = high_inter_len as f64 / high_union_len as f64;
    let resemblance = (high_inter_len + low_inter_len) as f64 / union_len as f64;

    let high_containment = if rule_high_len > 0 {
        high_inter_len as f64 / rule_high_len as f64
    } else {
        0.0
    };
    let containment = if rule_low_len > 0 && low_inter_len > 0 {
        let low_containment = low_inter_len as f64 / rule_low_len as f64;
        (high_containment + low_containment * LOW_IMPORTANCE) / (1.0 + LOW_IMPORTANCE)
    } else {
        high_containment
    };

    Some(ScoreVector {
        containment,
        high_containment,
        resemblance,
        high_resemblance,
        high_inter_len,
        matched_length: high_inter_len + low_inter_len,
    })
}
