//! Whole-run exact matching by content hash.
//!
//! The fastest strategy: hash the entire query run token stream and look it
//! up against the hash-to-rule table. It only fires when the whole run equals
//! a whole rule, which is the common case for complete, unmodified license
//! texts.

use sha1::{Digest, Sha1};

use crate::index::LicenseIndex;
use crate::matches::LicenseMatch;
use crate::query::QueryRun;
use crate::spans::Span;

pub const MATCH_HASH: &str = "1-hash";

/// SHA1 over the token id sequence serialized as little-endian pairs.
pub fn compute_hash(tokens: &[u16]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for &token in tokens {
        hasher.update(token.to_le_bytes());
    }
    hasher.finalize().into()
}

/// Match the whole query run against whole rules by hash.
///
/// Fires only when the run is untouched and fully known: any unknown word or
/// already-consumed position means the run cannot equal a complete rule.
/// Returns zero or one match and consumes the matched positions.
pub fn match_hash(index: &LicenseIndex, query_run: &mut QueryRun<'_>) -> Vec<LicenseMatch> {
    if !query_run.is_whole_and_known() {
        return Vec::new();
    }

    let run_tokens: Vec<u16> = query_run
        .tokens()
        .iter()
        .map(|t| t.expect("whole-and-known run has no unknown tokens"))
        .collect();
    let query_hash = compute_hash(&run_tokens);

    let Some(&rid) = index.rid_by_hash.get(&query_hash) else {
        return Vec::new();
    };

    let rule = index.rule(rid);
    let qspan = Span::from_range(query_run.start, query_run.end);
    let ispan = Span::from_range(0, rule.length - 1);
    let hispan = Span::from_positions(
        (0..rule.length).filter(|&pos| !index.is_junk(rule.tokens[pos])),
    );

    let license_match = LicenseMatch {
        rid,
        license_expression: rule.license_expression.clone(),
        qspan,
        ispan,
        hispan,
        matcher: MATCH_HASH,
        start_line: query_run.start_line(),
        end_line: query_run.end_line(),
    };

    query_run.subtract(&license_match.qspan);
    vec![license_match]
}
