//! Sequence-diff matching, the fallback for template-heavy rules.
//!
//! When seed-and-extend is unreliable - heavily templated or fuzzily edited
//! texts - a full diff between the query run and the rule recovers whatever
//! aligned blocks exist. The diff core is time-boxed: on expiry it degrades
//! to a coarse alignment instead of failing, so this matcher never aborts a
//! scan.

use std::time::Duration;

use crate::candidates::Candidate;
use crate::index::LicenseIndex;
use crate::matches::{LicenseMatch, MAX_DIST};
use crate::query::QueryRun;
use crate::seqdiff::match_blocks;
use crate::spans::Span;

pub const MATCH_SEQ: &str = "seq-diff";

/// Wall-clock budget for one diff computation.
pub const SEQ_TIMEOUT: Duration = Duration::from_millis(100);

/// Token id that matches nothing: stands in for unknown words and consumed
/// positions on the query side of the diff.
const NO_TOKEN: u16 = u16::MAX;

/// Diff the query run against one candidate rule and convert the equal
/// blocks into matches. Blocks in increasing sequence merge into one match;
/// matched positions are consumed.
pub fn match_sequence(
    index: &LicenseIndex,
    candidate: &Candidate,
    query_run: &mut QueryRun<'_>,
    timeout: Duration,
) -> Vec<LicenseMatch> {
    let rid = candidate.rid;
    let rule = index.rule(rid);

    // the query side, with unmatchable positions masked out
    let qtokens: Vec<u16> = query_run
        .query
        .tokens
        .iter()
        .enumerate()
        .map(|(pos, token)| match token {
            Some(tid) if query_run.is_pos_matchable(pos) => *tid,
            _ => NO_TOKEN,
        })
        .collect();

    let blocks = match_blocks(
        &qtokens,
        &rule.tokens,
        query_run.start,
        query_run.end + 1,
        timeout,
    );

    let mut matches: Vec<LicenseMatch> = Vec::new();
    for block in blocks {
        let has_high = (block.b..block.b + block.size)
            .any(|ipos| !index.is_junk(rule.tokens[ipos]));
        if block.size < 2 && !has_high {
            continue;
        }

        let qspan = Span::from_range(block.a, block.a + block.size - 1);
        let ispan = Span::from_range(block.b, block.b + block.size - 1);
        let hispan = Span::from_positions(
            (block.b..block.b + block.size).filter(|&ipos| !index.is_junk(rule.tokens[ipos])),
        );
        let start_line = query_run.query.line_for_pos(qspan.start()).unwrap_or(1);
        let end_line = query_run
            .query
            .line_for_pos(qspan.end())
            .unwrap_or(start_line);

        matches.push(LicenseMatch {
            rid,
            license_expression: rule.license_expression.clone(),
            qspan,
            ispan,
            hispan,
            matcher: MATCH_SEQ,
            start_line,
            end_line,
        });
    }

    let matches = LicenseMatch::merge(matches, MAX_DIST);
    for license_match in &matches {
        query_run.subtract(&license_match.qspan);
    }
    matches
}
