//! Sliding-window exact matching for small rules.
//!
//! Rules under the small-rule length threshold are cheap to match by sliding
//! a window of exactly the rule's length across the run and comparing token
//! slices. This sidesteps the approximate matchers, which are both costlier
//! and too permissive for texts of a few tokens.

use crate::index::LicenseIndex;
use crate::matches::LicenseMatch;
use crate::query::QueryRun;
use crate::spans::Span;

pub const MATCH_SMALL: &str = "small";

/// Match every small regular rule against the run with an exact sliding
/// window. Matched positions are consumed; occurrences never overlap within
/// one pass because the scan resumes past each hit.
pub fn match_small(index: &LicenseIndex, query_run: &mut QueryRun<'_>) -> Vec<LicenseMatch> {
    match_windowed(index, query_run, &index.small_rids)
}

/// Exact window matching for an explicit set of rules, whatever their size.
/// Also used to locate false-positive rule occurrences before real matching.
pub fn match_windowed(
    index: &LicenseIndex,
    query_run: &mut QueryRun<'_>,
    rids: &[usize],
) -> Vec<LicenseMatch> {
    let mut matches = Vec::new();

    for &rid in rids {
        let rule = index.rule(rid);
        let width = rule.length;
        if width == 0 || width > query_run.len() {
            continue;
        }

        let mut pos = query_run.start;
        let last_window_start = query_run.end + 1 - width;
        while pos <= last_window_start {
            if !window_matches(index, query_run, pos, rid) {
                pos += 1;
                continue;
            }

            let qspan = Span::from_range(pos, pos + width - 1);
            let ispan = Span::from_range(0, width - 1);
            let hispan = Span::from_positions(
                (0..width).filter(|&ipos| !index.is_junk(rule.tokens[ipos])),
            );
            let license_match = LicenseMatch {
                rid,
                license_expression: rule.license_expression.clone(),
                qspan,
                ispan,
                hispan,
                matcher: MATCH_SMALL,
                start_line: query_run.query.line_for_pos(pos).unwrap_or(1),
                end_line: query_run
                    .query
                    .line_for_pos(pos + width - 1)
                    .unwrap_or(1),
            };
            query_run.subtract(&license_match.qspan);
            matches.push(license_match);

            // resume past the matched window
            pos += width;
        }
    }

    matches
}

fn window_matches(
    index: &LicenseIndex,
    query_run: &QueryRun<'_>,
    window_start: usize,
    rid: usize,
) -> bool {
    let rule_tokens = index.tokens(rid);
    rule_tokens.iter().enumerate().all(|(offset, &rule_tid)| {
        let pos = window_start + offset;
        query_run.is_pos_matchable(pos) && query_run.query.tokens[pos] == Some(rule_tid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::models::{RuleKind, RuleRecord};
    use crate::query::Query;

    fn window_index() -> LicenseIndex {
        build_index(vec![
            RuleRecord::new(
                "mit_ref.RULE",
                "mit",
                RuleKind::Reference,
                "licensed under the mit license",
            ),
            RuleRecord::new(
                "filler.RULE",
                "gpl-2.0",
                RuleKind::Notice,
                "completely different gpl words the mit here",
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_window_match_bounded_to_window() {
        let index = window_index();
        let text = "licensed under the mit license followed by unrelated trailing words";
        let query = Query::new(text, &index);
        let mut runs = query.query_runs();
        let matches = match_small(&index, &mut runs[0]);

        let mit: Vec<_> = matches.iter().filter(|m| m.rid == 0).collect();
        assert_eq!(mit.len(), 1);
        assert_eq!(mit[0].qspan, Span::from_range(0, 4));
        assert_eq!(mit[0].matcher, MATCH_SMALL);
    }

    #[test]
    fn test_window_no_match_on_prefix_only() {
        let index = window_index();
        // only a partial prefix of the rule window
        let query = Query::new("licensed under the mit", &index);
        let mut runs = query.query_runs();
        let matches = match_small(&index, &mut runs[0]);
        assert!(matches.iter().all(|m| m.rid != 0));
    }

    #[test]
    fn test_window_matches_do_not_overlap() {
        let index = window_index();
        let text = "licensed under the mit license licensed under the mit license";
        let query = Query::new(text, &index);
        let mut runs = query.query_runs();
        let matches = match_small(&index, &mut runs[0]);

        let mit: Vec<_> = matches.iter().filter(|m| m.rid == 0).collect();
        assert_eq!(mit.len(), 2);
        assert_eq!(mit[0].qspan.overlap(&mit[1].qspan), 0);
    }

    #[test]
    fn test_window_skips_consumed_positions() {
        let index = window_index();
        let query = Query::new("licensed under the mit license", &index);
        let mut runs = query.query_runs();
        runs[0].subtract(&Span::from_pos(2));
        let matches = match_small(&index, &mut runs[0]);
        assert!(matches.iter().all(|m| m.rid != 0));
    }

    #[test]
    fn test_window_blocked_by_unknown_word() {
        let index = window_index();
        let query = Query::new("licensed under zorblax mit license", &index);
        let mut runs = query.query_runs();
        let matches = match_small(&index, &mut runs[0]);
        assert!(matches.iter().all(|m| m.rid != 0));
    }
}
