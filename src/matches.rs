//! License match results.
//!
//! A LicenseMatch unites one rule with the query span it matched (`qspan`),
//! the rule-side span (`ispan`) and the high-token subset of the rule side
//! (`hispan`, always a subset of ispan, used for scoring). Matches behave a
//! bit like Spans: they overlap, touch, surround and keep a distance to each
//! other, considering both the query and the rule side.

use serde::{Deserialize, Serialize};

use crate::index::LicenseIndex;
use crate::spans::Span;

/// Maximum token distance bridged when merging two matches of the same rule.
pub const MAX_DIST: usize = 15;

/// One raw or refined match of a rule against a query region.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseMatch {
    /// Matched rule id.
    pub rid: usize,
    /// License expression of the matched rule.
    pub license_expression: String,
    /// Matched query positions, absolute within the query.
    pub qspan: Span,
    /// Matched rule positions, starting at zero at the rule start.
    pub ispan: Span,
    /// High-token subset of `ispan`.
    pub hispan: Span,
    /// Name of the matching strategy that produced this match.
    pub matcher: &'static str,
    /// 1-based query line range.
    pub start_line: usize,
    pub end_line: usize,
}

impl LicenseMatch {
    pub fn qstart(&self) -> usize {
        self.qspan.start()
    }

    pub fn qend(&self) -> usize {
        self.qspan.end()
    }

    /// Count of matched query tokens.
    pub fn qlen(&self) -> usize {
        self.qspan.len()
    }

    /// Count of matched rule tokens.
    pub fn ilen(&self) -> usize {
        self.ispan.len()
    }

    /// Count of matched high rule tokens.
    pub fn hilen(&self) -> usize {
        self.hispan.len()
    }

    pub fn qdistance_to(&self, other: &LicenseMatch) -> usize {
        self.qspan.distance_to(&other.qspan)
    }

    pub fn idistance_to(&self, other: &LicenseMatch) -> usize {
        self.ispan.distance_to(&other.ispan)
    }

    /// True if both the query and rule spans overlap other's.
    pub fn overlap(&self, other: &LicenseMatch) -> bool {
        self.qspan.overlap(&other.qspan) > 0 && self.ispan.overlap(&other.ispan) > 0
    }

    pub fn qsurround(&self, other: &LicenseMatch) -> bool {
        self.qspan.surround(&other.qspan)
    }

    pub fn contains_qspan(&self, other: &LicenseMatch) -> bool {
        self.qspan.contains_span(&other.qspan)
    }

    /// True if this match is strictly after other on both sides.
    pub fn is_after(&self, other: &LicenseMatch) -> bool {
        self.qspan.is_after(&other.qspan) && self.ispan.is_after(&other.ispan)
    }

    pub fn same_licensing(&self, other: &LicenseMatch) -> bool {
        self.license_expression == other.license_expression
    }

    /// Fold another match of the same rule into this one, unioning all
    /// spans and widening the line range.
    pub fn update(&mut self, other: &LicenseMatch) {
        self.qspan = self.qspan.union(&other.qspan);
        self.ispan = self.ispan.union(&other.ispan);
        self.hispan = self.hispan.union(&other.hispan);
        self.start_line = self.start_line.min(other.start_line);
        self.end_line = self.end_line.max(other.end_line);
    }

    /// Coverage of the rule's discriminating tokens by this match, as a
    /// percentage capped at 100. Rules without high tokens fall back to
    /// whole-length coverage.
    pub fn coverage(&self, index: &LicenseIndex) -> f64 {
        let rule = index.rule(self.rid);
        let ratio = if rule.high_length > 0 {
            self.hilen() as f64 / rule.high_length as f64
        } else if rule.length > 0 {
            self.ilen() as f64 / rule.length as f64
        } else {
            0.0
        };
        (ratio * 100.0).min(100.0)
    }

    /// Coverage weighted by the rule's relevance.
    pub fn score(&self, index: &LicenseIndex) -> f64 {
        let relevance = index.rule(self.rid).relevance as f64;
        self.coverage(index) * relevance / 100.0
    }

    /// True if the match is too small to stand, per its rule's thresholds.
    pub fn is_small(&self, index: &LicenseIndex) -> bool {
        let thresholds = index.rule(self.rid).thresholds();
        let ilen = self.ilen();
        let hilen = self.hilen();
        if thresholds.small
            && self.coverage(index) < 50.0
            && (hilen < thresholds.min_high || ilen < thresholds.min_len)
        {
            return true;
        }
        hilen < thresholds.min_high && ilen < thresholds.min_len
    }

    /// Merge overlapping, touching or close-by matches of the same rule.
    ///
    /// Matches are grouped by rule; within a group, a match surrounded by an
    /// earlier one is dropped and a match in strictly increasing query and
    /// rule sequence within `max_dist` is folded into its predecessor. The
    /// maximal merge is returned; matches that cannot merge pass through.
    pub fn merge(matches: Vec<LicenseMatch>, max_dist: usize) -> Vec<LicenseMatch> {
        let mut sorted = matches;
        sorted.sort_by(|a, b| {
            a.rid
                .cmp(&b.rid)
                .then_with(|| a.qstart().cmp(&b.qstart()))
                .then_with(|| b.qlen().cmp(&a.qlen()))
                .then_with(|| b.ilen().cmp(&a.ilen()))
        });

        let mut merged: Vec<LicenseMatch> = Vec::with_capacity(sorted.len());
        for next in sorted {
            let Some(current) = merged.last_mut() else {
                merged.push(next);
                continue;
            };
            if current.rid != next.rid {
                merged.push(next);
                continue;
            }
            if current.qsurround(&next) {
                current.update(&next);
                continue;
            }
            if next.is_after(current)
                && next.qdistance_to(current) < max_dist
                && next.idistance_to(current) < max_dist
            {
                current.update(&next);
                continue;
            }
            merged.push(next);
        }
        merged
    }
}

/// The externally visible record for one match, handed to the scan driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub license_expression: String,
    pub rule_identifier: String,
    pub start_line: usize,
    pub end_line: usize,
    /// First and last matched query token positions.
    pub query_start: usize,
    pub query_end: usize,
    /// First and last matched rule token positions.
    pub rule_start: usize,
    pub rule_end: usize,
    pub score: f64,
    pub coverage: f64,
    pub rule_relevance: u8,
    /// Matcher name; only populated when diagnostics are requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
}

impl MatchRecord {
    pub fn from_match(
        license_match: &LicenseMatch,
        index: &LicenseIndex,
        diagnostics: bool,
    ) -> Self {
        let rule = index.rule(license_match.rid);
        Self {
            license_expression: license_match.license_expression.clone(),
            rule_identifier: rule.identifier.clone(),
            start_line: license_match.start_line,
            end_line: license_match.end_line,
            query_start: license_match.qstart(),
            query_end: license_match.qend(),
            rule_start: license_match.ispan.start(),
            rule_end: license_match.ispan.end(),
            score: round2(license_match.score(index)),
            coverage: round2(license_match.coverage(index)),
            rule_relevance: rule.relevance,
            matcher: diagnostics.then(|| license_match.matcher.to_string()),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
