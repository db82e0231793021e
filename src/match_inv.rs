//! Inverted-index matching.
//!
//! Two-pass posting-list strategy. Pass one collects (query position, rule
//! position) hit pairs for discriminating tokens only - junk posting lists
//! can be enormous and carry no signal - and groups them into monotonically
//! increasing runs bounded by a maximum distance. Hit groups whose query
//! positions are covered by other groups are pruned, the rest become draft
//! matches. Pass two re-scans only the junk postings, restricted to each
//! draft match's region dilated by a small tolerance, recovering the junk
//! tokens inside and adjacent to an already-plausible match.

use std::collections::HashSet;

use crate::candidates::Candidate;
use crate::index::LicenseIndex;
use crate::matches::LicenseMatch;
use crate::query::QueryRun;
use crate::spans::Span;

pub const MATCH_INVERTED: &str = "inverted";

/// Rules at or under this length use their own length to scale dilation.
const MIN_LENGTH: usize = 4;

/// Draft matches sparser than this are dropped before junk re-injection.
const MIN_DENSITY: f64 = 0.3;

/// A matched (query position, rule position) pair.
type Hit = (usize, usize);

/// Match the candidates against the run using the inverted postings.
pub fn match_inverted(
    index: &LicenseIndex,
    candidates: &[Candidate],
    query_run: &mut QueryRun<'_>,
    max_dist: usize,
    dilate: usize,
) -> Vec<LicenseMatch> {
    let mut matches = Vec::new();

    for candidate in candidates {
        let rid = candidate.rid;
        if !query_run.is_matchable(false) {
            break;
        }

        let qvector = query_run.vector();
        let rule_postings = &index.postings_by_rid[rid];

        let mut good_hits: Vec<Hit> = Vec::new();
        for (&tid, qpostings) in &qvector {
            if index.is_junk(tid) {
                continue;
            }
            let Some(ipostings) = rule_postings.get(&tid) else {
                continue;
            };
            for &qpos in qpostings {
                for &ipos in ipostings {
                    good_hits.push((qpos, ipos));
                }
            }
        }
        if good_hits.is_empty() {
            continue;
        }

        let groups = group_hits(good_hits, max_dist);

        let rule = index.rule(rid);
        let thresholds = rule.thresholds();
        let mut rule_matches: Vec<LicenseMatch> = Vec::new();
        for group in groups {
            let qspan = Span::from_positions(group.iter().map(|&(q, _)| q));
            let ispan = Span::from_positions(group.iter().map(|&(_, i)| i));
            // pass one hits are all high tokens
            let hispan = ispan.clone();

            if hispan.len() < thresholds.min_high || qspan.density() < MIN_DENSITY {
                continue;
            }

            let start_line = query_run.query.line_for_pos(qspan.start()).unwrap_or(1);
            let end_line = query_run
                .query
                .line_for_pos(qspan.end())
                .unwrap_or(start_line);
            rule_matches.push(LicenseMatch {
                rid,
                license_expression: rule.license_expression.clone(),
                qspan,
                ispan,
                hispan,
                matcher: MATCH_INVERTED,
                start_line,
                end_line,
            });
        }
        if rule_matches.is_empty() {
            continue;
        }

        // pass two: junk re-injection within dilated match regions
        let mut junk_hits: Vec<Hit> = Vec::new();
        for (&tid, qpostings) in &qvector {
            if !index.is_junk(tid) {
                continue;
            }
            let Some(ipostings) = rule_postings.get(&tid) else {
                continue;
            };
            for &qpos in qpostings {
                for &ipos in ipostings {
                    junk_hits.push((qpos, ipos));
                }
            }
        }

        let coeff = if rule.length <= MIN_LENGTH {
            rule.length
        } else {
            10
        };
        let actual_dilate = dilate.min(rule.length / coeff.max(1));

        for license_match in rule_matches.iter_mut() {
            let relevant = collect_reinjectable_hits(&junk_hits, license_match, actual_dilate);
            if !relevant.is_empty() {
                let junk_qspan = Span::from_positions(relevant.iter().map(|&(q, _)| q));
                let junk_ispan = Span::from_positions(relevant.iter().map(|&(_, i)| i));
                license_match.qspan = license_match.qspan.union(&junk_qspan);
                license_match.ispan = license_match.ispan.union(&junk_ispan);
            }
            query_run.subtract(&license_match.qspan);
        }

        matches.append(&mut rule_matches);
    }

    matches
}

/// Junk hits inside the match region dilated by `dilate` on both sides.
fn collect_reinjectable_hits(
    junk_hits: &[Hit],
    license_match: &LicenseMatch,
    dilate: usize,
) -> Vec<Hit> {
    let qlow = license_match.qspan.start().saturating_sub(dilate);
    let qhigh = license_match.qspan.end() + dilate;
    let ilow = license_match.ispan.start().saturating_sub(dilate);
    let ihigh = license_match.ispan.end() + dilate;

    junk_hits
        .iter()
        .copied()
        .filter(|&(qpos, ipos)| {
            qlow <= qpos && qpos <= qhigh && ilow <= ipos && ipos <= ihigh
        })
        .collect()
}

/// Group hits into monotonic runs and prune covered groups.
///
/// A hit extends the current group when it strictly increases both the query
/// and rule positions and each increase is under `max_dist`. Remaining hits
/// seed further groups until none are left.
fn group_hits(hits: Vec<Hit>, max_dist: usize) -> Vec<Vec<Hit>> {
    let mut not_grouped = hits;
    not_grouped.sort_by_key(|&(qpos, ipos)| (ipos, qpos));

    let mut groups: Vec<Vec<Hit>> = Vec::new();
    while !not_grouped.is_empty() {
        let (group, rest) = progressive_group(not_grouped, max_dist);
        groups.push(group);
        not_grouped = rest;
    }

    filter_contained_groups(groups)
}

fn progressive_group(hits: Vec<Hit>, max_dist: usize) -> (Vec<Hit>, Vec<Hit>) {
    let mut grouped: Vec<Hit> = Vec::new();
    let mut rest: Vec<Hit> = Vec::new();

    let mut iter = hits.into_iter();
    let first = iter.next().expect("progressive grouping needs hits");
    let (mut tail_qpos, mut tail_ipos) = first;
    grouped.push(first);

    for (qpos, ipos) in iter {
        if tail_qpos < qpos
            && tail_ipos < ipos
            && qpos - tail_qpos < max_dist
            && ipos - tail_ipos < max_dist
        {
            grouped.push((qpos, ipos));
            tail_qpos = qpos;
            tail_ipos = ipos;
        } else {
            rest.push((qpos, ipos));
        }
    }
    (grouped, rest)
}

/// Drop and truncate hit groups so no two surviving groups share query
/// positions, with longer and earlier groups winning.
///
/// Three passes: pairwise whole-containment of query positions, containment
/// in the union of all other groups, then truncation of leading overlaps
/// between surviving pairs.
fn filter_contained_groups(groups: Vec<Vec<Hit>>) -> Vec<Vec<Hit>> {
    let qsets: Vec<HashSet<usize>> = groups
        .iter()
        .map(|group| group.iter().map(|&(q, _)| q).collect())
        .collect();

    // pass one: groups entirely contained in a single other group
    let mut contained: HashSet<usize> = HashSet::new();
    for gid1 in 0..groups.len() {
        for gid2 in gid1 + 1..groups.len() {
            if contained.contains(&gid1) || contained.contains(&gid2) {
                continue;
            }
            if qsets[gid2].is_subset(&qsets[gid1]) {
                contained.insert(gid2);
            } else if qsets[gid1].is_subset(&qsets[gid2]) {
                contained.insert(gid1);
            }
        }
    }

    // pass two: groups contained in the union of all other survivors
    let remainder: Vec<usize> = (0..groups.len())
        .filter(|gid| !contained.contains(gid))
        .collect();
    for &gid1 in &remainder {
        if contained.contains(&gid1) {
            continue;
        }
        let mut all_other: HashSet<usize> = HashSet::new();
        for &gid2 in &remainder {
            if gid2 != gid1 && !contained.contains(&gid2) {
                all_other.extend(&qsets[gid2]);
            }
        }
        if qsets[gid1].is_subset(&all_other) {
            contained.insert(gid1);
        }
    }

    // pass three: truncate leading overlaps between surviving pairs
    let mut survivors: Vec<Vec<Hit>> = groups
        .into_iter()
        .enumerate()
        .filter(|(gid, _)| !contained.contains(gid))
        .map(|(_, group)| group)
        .collect();

    let mut dropped: HashSet<usize> = HashSet::new();
    for gid1 in 0..survivors.len() {
        for gid2 in gid1 + 1..survivors.len() {
            if dropped.contains(&gid1) || dropped.contains(&gid2) {
                continue;
            }
            let (long_gid, short_gid) = if survivors[gid1].len() >= survivors[gid2].len() {
                (gid1, gid2)
            } else {
                (gid2, gid1)
            };
            let long_qset: HashSet<usize> =
                survivors[long_gid].iter().map(|&(q, _)| q).collect();

            let mut leading_overlap = 0;
            for &(qpos, _ipos) in &survivors[short_gid] {
                if long_qset.contains(&qpos) {
                    leading_overlap += 1;
                } else {
                    break;
                }
            }
            if leading_overlap == survivors[short_gid].len() {
                dropped.insert(short_gid);
            } else if leading_overlap > 0 {
                survivors[short_gid].drain(..leading_overlap);
            }
        }
    }

    survivors
        .into_iter()
        .enumerate()
        .filter(|(gid, group)| !dropped.contains(gid) && !group.is_empty())
        .map(|(_, group)| group)
        .collect()
}
