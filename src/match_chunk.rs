//! Chunk matching: seed on a shared token and extend.
//!
//! For one candidate rule, scan the query run left to right. Every shared
//! discriminating token is a seed; from a seed the match is extended left
//! then right while tokens keep agreeing. Extension tolerates interruptions
//! three ways: junk or unknown query tokens are skipped freely, rule
//! template gaps permit skipping through wildcard filler, and up to the
//! rule's `max_gap_skip` consecutive mismatching high tokens may be crossed.
//! Each seed yields at most one match; the scan resumes past the matched
//! region. Overlaps between matches of different seeds are left to the
//! refinement stage.

use crate::candidates::Candidate;
use crate::index::LicenseIndex;
use crate::matches::LicenseMatch;
use crate::query::QueryRun;
use crate::spans::Span;

pub const MATCH_CHUNK: &str = "chunk";

/// Upper bound on consecutive junk or unknown query tokens skipped during
/// extension. These skips do not consume the high-token gap budget but must
/// still be bounded or extension could crawl across unrelated prose.
const JUNK_SKIP_LIMIT: usize = 15;

/// Match one candidate rule against the query run by seed-and-extend.
pub fn match_chunks(
    index: &LicenseIndex,
    candidate: &Candidate,
    query_run: &mut QueryRun<'_>,
) -> Vec<LicenseMatch> {
    let rid = candidate.rid;
    let rule = index.rule(rid);
    let itokens = &rule.tokens;
    let ifinish = rule.length - 1;

    let mut matches = Vec::new();
    let mut qpos = query_run.start;

    'scan: while qpos <= query_run.end {
        if !query_run.is_matchable(false) {
            break;
        }

        let seed_tid = match query_run.query.tokens[qpos] {
            Some(tid) => tid,
            None => {
                qpos += 1;
                continue;
            }
        };
        // seeds are discriminating, unconsumed and shared with the rule
        if index.is_junk(seed_tid)
            || !query_run.is_pos_high_matchable(qpos)
            || !candidate.intersection.contains_key(&seed_tid)
        {
            qpos += 1;
            continue;
        }

        for ipos in 0..=ifinish {
            let itoken = itokens[ipos];
            if itoken != seed_tid {
                continue;
            }

            let (qspan, ispan) = extend(index, query_run, rule, qpos, ipos);
            let hispan =
                Span::from_positions(ispan.iter().filter(|&p| !index.is_junk(itokens[p])));

            let start_line = query_run.query.line_for_pos(qspan.start()).unwrap_or(1);
            let end_line = query_run
                .query
                .line_for_pos(qspan.end())
                .unwrap_or(start_line);
            let license_match = LicenseMatch {
                rid,
                license_expression: rule.license_expression.clone(),
                qspan,
                ispan,
                hispan,
                matcher: MATCH_CHUNK,
                start_line,
                end_line,
            };

            query_run.subtract(&license_match.qspan);
            let qspan_end = license_match.qend();
            matches.push(license_match);

            // resume past the matched query region
            if qspan_end >= query_run.end {
                break 'scan;
            }
            qpos = qspan_end + 1;
            continue 'scan;
        }

        qpos += 1;
    }

    matches
}

/// Extend a seed at (qstart_pos, istart_pos) left then right.
///
/// Matching positions are recorded only while still claimable. On a
/// mismatch, in order: a junk or unknown query token is skipped without
/// touching the gap budget; a rule gap position lets the wildcard swallow
/// the query token and resets the budget; otherwise the mismatch consumes
/// one unit of `max_gap_skip` budget, and extension stops when the budget
/// runs out. Small rules only ever skip at gaps and junk.
fn extend(
    index: &LicenseIndex,
    query_run: &QueryRun<'_>,
    rule: &crate::models::Rule,
    qstart_pos: usize,
    istart_pos: usize,
) -> (Span, Span) {
    let thresholds = rule.thresholds();
    let max_gap_skip = thresholds.max_gap_skip;
    let with_gaps = max_gap_skip > 0;
    let itokens = &rule.tokens;
    let gaps = &rule.gaps;
    let qtokens = &query_run.query.tokens;

    let qbegin = query_run.start as isize;
    let qfinish = query_run.end as isize;
    let ifinish = (rule.length - 1) as isize;

    let mut qpositions: Vec<usize> = vec![qstart_pos];
    let mut ipositions: Vec<usize> = vec![istart_pos];

    // extend left
    let mut qpos = qstart_pos as isize - 1;
    let mut ipos = istart_pos as isize - 1;
    let mut skipped = 0usize;
    let mut junk_skipped = 0usize;
    while qpos >= qbegin && ipos >= 0 {
        let qtoken = qtokens[qpos as usize];
        let itoken = itokens[ipos as usize];

        if qtoken == Some(itoken) {
            skipped = 0;
            junk_skipped = 0;
            if query_run.is_pos_matchable(qpos as usize) {
                qpositions.push(qpos as usize);
                ipositions.push(ipos as usize);
            }
            qpos -= 1;
            ipos -= 1;
            continue;
        }

        // mismatch: junk and unknown query tokens skip without consuming
        // the gap budget, up to their own bound
        if qtoken.is_none() || qtoken.is_some_and(|tid| index.is_junk(tid)) {
            if junk_skipped >= JUNK_SKIP_LIMIT {
                break;
            }
            qpos -= 1;
            junk_skipped += 1;
            continue;
        }
        // a wildcard after rule position ipos swallows query tokens
        if gaps.contains(&(ipos as usize)) {
            qpos -= 1;
            skipped = 0;
            continue;
        }
        if thresholds.small || !with_gaps || skipped >= max_gap_skip {
            break;
        }
        qpos -= 1;
        skipped += 1;
    }

    // extend right
    let mut qpos = qstart_pos as isize + 1;
    let mut ipos = istart_pos as isize + 1;
    let mut skipped = 0usize;
    let mut junk_skipped = 0usize;
    while qpos <= qfinish && ipos <= ifinish {
        let qtoken = qtokens[qpos as usize];
        let itoken = itokens[ipos as usize];

        if qtoken == Some(itoken) {
            skipped = 0;
            junk_skipped = 0;
            if query_run.is_pos_matchable(qpos as usize) {
                qpositions.push(qpos as usize);
                ipositions.push(ipos as usize);
            }
            qpos += 1;
            ipos += 1;
            continue;
        }

        if qtoken.is_none() || qtoken.is_some_and(|tid| index.is_junk(tid)) {
            if junk_skipped >= JUNK_SKIP_LIMIT {
                break;
            }
            qpos += 1;
            junk_skipped += 1;
            continue;
        }
        // the wildcard between rule positions ipos-1 and ipos
        if ipos > 0 && gaps.contains(&((ipos - 1) as usize)) {
            qpos += 1;
            skipped = 0;
            continue;
        }
        if thresholds.small || !with_gaps || skipped >= max_gap_skip {
            break;
        }
        qpos += 1;
        skipped += 1;
    }

    (
        Span::from_positions(qpositions),
        Span::from_positions(ipositions),
    )
}
