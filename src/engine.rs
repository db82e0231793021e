//! The matching engine: pipeline orchestration.
//!
//! The engine owns the index behind an Arc so one corpus load serves any
//! number of concurrent per-file matching tasks; matching itself is
//! synchronous and single-threaded per query. Per run the pipeline is:
//! false-positive subtraction, whole-run hash, small-rule windows, then
//! candidate selection feeding the chunk, inverted and sequence-diff
//! matchers, and finally refinement across all raw matches. A failure while
//! matching one candidate is logged and only that candidate is skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};

use crate::candidates::{Candidate, TOP_CANDIDATES, compute_candidates};
use crate::index::{LicenseIndex, build_index};
use crate::match_chunk::match_chunks;
use crate::match_hash::match_hash;
use crate::match_inv::match_inverted;
use crate::match_seq::{SEQ_TIMEOUT, match_sequence};
use crate::match_small::{match_small, match_windowed};
use crate::matches::{LicenseMatch, MatchRecord};
use crate::models::RuleRecord;
use crate::query::{Query, QueryRun};
use crate::refine::refine_matches;

/// Maximum distance between consecutive hits in one inverted-matcher group.
const INVERTED_MAX_DIST: usize = 5;

/// Dilation tolerance for junk re-injection around draft matches.
const INVERTED_DILATE: usize = 5;

/// How many top candidates get the expensive sequence-diff treatment.
const SEQ_CANDIDATES: usize = 10;

/// Rules at least this long qualify for the sequence-diff fallback even
/// without template gaps.
const SEQ_MIN_RULE_LENGTH: usize = 30;

/// A license matching engine over one immutable rule corpus.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    index: Arc<LicenseIndex>,
}

impl MatchEngine {
    /// Build the engine from corpus rule records. Fails on an invalid corpus
    /// (empty rule, all-junk rule, duplicated rules); no partial index is
    /// ever kept.
    pub fn new(records: Vec<RuleRecord>) -> Result<Self> {
        let index = build_index(records)?;
        Ok(Self {
            index: Arc::new(index),
        })
    }

    pub fn index(&self) -> &LicenseIndex {
        &self.index
    }

    /// Match `text` and return the refined matches sorted by query position.
    pub fn match_text(&self, text: &str) -> Vec<LicenseMatch> {
        self.match_text_with_min_score(text, 0.0)
    }

    /// Match `text`, keeping only matches scoring at least `min_score`.
    pub fn match_text_with_min_score(&self, text: &str, min_score: f64) -> Vec<LicenseMatch> {
        let query = Query::new(text, &self.index);
        let mut all_matches: Vec<LicenseMatch> = Vec::new();

        for mut run in query.query_runs() {
            self.match_run(&mut run, &mut all_matches);
        }

        refine_matches(&self.index, all_matches, min_score)
    }

    /// Match `text` into driver-facing records. `diagnostics` surfaces the
    /// matcher name per match.
    pub fn match_records(
        &self,
        text: &str,
        min_score: f64,
        diagnostics: bool,
    ) -> Vec<MatchRecord> {
        self.match_text_with_min_score(text, min_score)
            .iter()
            .map(|m| MatchRecord::from_match(m, &self.index, diagnostics))
            .collect()
    }

    fn match_run(&self, run: &mut QueryRun<'_>, all_matches: &mut Vec<LicenseMatch>) {
        let index = &self.index;

        // subtract false-positive texts so nothing else can claim them
        if !index.false_positive_rids.is_empty() {
            let mut fp_rids: Vec<usize> = index.false_positive_rids.iter().copied().collect();
            fp_rids.sort_unstable();
            let ignored = match_windowed(index, run, &fp_rids);
            if !ignored.is_empty() {
                debug!("subtracted {} false positive occurrences", ignored.len());
            }
        }
        if !run.is_matchable(true) {
            return;
        }

        // whole-run exact match
        all_matches.extend(match_hash(index, run));
        if run.is_fully_consumed() {
            return;
        }

        // small rules with exact windows
        all_matches.extend(match_small(index, run));
        if run.is_fully_consumed() || !run.is_matchable(false) {
            return;
        }

        // chunk matching over the top candidates
        let candidates = compute_candidates(index, run, TOP_CANDIDATES);
        for candidate in &candidates {
            if !run.is_matchable(false) {
                break;
            }
            self.dispatch(candidate, all_matches, |run| {
                match_chunks(index, candidate, run)
            }, run);
        }
        if !run.is_matchable(false) {
            return;
        }

        // inverted matching over re-ranked candidates
        let candidates = compute_candidates(index, run, TOP_CANDIDATES);
        for candidate in &candidates {
            if !run.is_matchable(false) {
                break;
            }
            self.dispatch(candidate, all_matches, |run| {
                match_inverted(
                    index,
                    std::slice::from_ref(candidate),
                    run,
                    INVERTED_MAX_DIST,
                    INVERTED_DILATE,
                )
            }, run);
        }
        if !run.is_matchable(false) {
            return;
        }

        // sequence-diff fallback for template-heavy and large rules
        let candidates = compute_candidates(index, run, SEQ_CANDIDATES);
        for candidate in &candidates {
            if !run.is_matchable(false) {
                break;
            }
            let rule = index.rule(candidate.rid);
            if rule.gaps.is_empty() && rule.length < SEQ_MIN_RULE_LENGTH {
                continue;
            }
            self.dispatch(candidate, all_matches, |run| {
                match_sequence(index, candidate, run, SEQ_TIMEOUT)
            }, run);
        }
    }

    /// The per-candidate failure boundary: a matcher failing on one
    /// candidate never aborts the sibling candidates or other runs.
    fn dispatch<'q, F>(
        &self,
        candidate: &Candidate,
        all_matches: &mut Vec<LicenseMatch>,
        matcher: F,
        run: &mut QueryRun<'q>,
    ) where
        F: FnOnce(&mut QueryRun<'q>) -> Vec<LicenseMatch>,
    {
        match catch_unwind(AssertUnwindSafe(|| matcher(run))) {
            Ok(matches) => all_matches.extend(matches),
            Err(_) => {
                warn!(
                    "matcher failed on candidate rule {}; skipping it",
                    self.index.rule(candidate.rid).identifier
                );
            }
        }
    }
}
