//! Query processing - tokenized input text for matching.
//!
//! A Query wraps one input text as a flat sequence of token ids against the
//! index dictionary. Words not in the dictionary are kept as `None`
//! placeholders so position and gap arithmetic stays valid. The query is
//! segmented into QueryRuns at long stretches of non-matchable text; each run
//! is matched independently and tracks which of its positions are still
//! claimable.

use std::collections::{HashMap, HashSet};

use crate::index::LicenseIndex;
use crate::spans::Span;
use crate::tokenize::{STOPWORDS, word_tokens};

/// Number of consecutive lines without a discriminating token that breaks a
/// new query run.
const LINE_THRESHOLD: usize = 4;

/// One tokenized input text.
#[derive(Debug, Clone)]
pub struct Query {
    /// Token ids per position; `None` for words unknown to the dictionary.
    pub tokens: Vec<Option<u16>>,

    /// 1-based line number per token position.
    pub line_by_pos: Vec<usize>,

    /// Positions holding a digit-only token.
    digit_only_pos: HashSet<usize>,

    /// Junk boundary copied from the index dictionary.
    len_junk: usize,

    /// Run boundaries as inclusive position ranges, trimmed to known tokens.
    runs: Vec<(usize, usize)>,
}

impl Query {
    /// Tokenize `text` against the index dictionary and segment it into runs.
    pub fn new(text: &str, index: &LicenseIndex) -> Self {
        let len_junk = index.len_junk;

        let mut tokens: Vec<Option<u16>> = Vec::new();
        let mut line_by_pos: Vec<usize> = Vec::new();
        let mut digit_only_pos: HashSet<usize> = HashSet::new();

        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut run_start = 0usize;
        let mut run_has_tokens = false;
        let mut weak_lines = 0usize;

        for (line_idx, line) in text.lines().enumerate() {
            let line_num = line_idx + 1;

            if run_has_tokens && weak_lines >= LINE_THRESHOLD {
                runs.push((run_start, tokens.len() - 1));
                run_start = tokens.len();
                run_has_tokens = false;
                weak_lines = 0;
            }

            let mut line_has_known = false;
            let mut line_has_high = false;

            for token in word_tokens(line.trim()) {
                if STOPWORDS.contains(token.as_str()) {
                    continue;
                }
                match index.dictionary.get(&token) {
                    Some(tid) => {
                        if index.digit_only_tids.contains(&tid) {
                            digit_only_pos.insert(tokens.len());
                        }
                        if (tid as usize) >= len_junk {
                            line_has_high = true;
                        }
                        line_has_known = true;
                        tokens.push(Some(tid));
                        line_by_pos.push(line_num);
                    }
                    None => {
                        tokens.push(None);
                        line_by_pos.push(line_num);
                    }
                }
            }

            if !line_has_known {
                weak_lines += 1;
                continue;
            }
            run_has_tokens = true;
            if line_has_high {
                weak_lines = 0;
            } else {
                weak_lines += 1;
            }
        }
        if run_has_tokens {
            runs.push((run_start, tokens.len() - 1));
        }

        // trim runs to start and end on known tokens
        let runs = runs
            .into_iter()
            .filter_map(|(mut start, mut end)| {
                while start <= end && tokens[start].is_none() {
                    start += 1;
                }
                while end > start && tokens[end].is_none() {
                    end -= 1;
                }
                if start > end || tokens[start].is_none() {
                    None
                } else {
                    Some((start, end))
                }
            })
            .collect();

        Self {
            tokens,
            line_by_pos,
            digit_only_pos,
            len_junk,
            runs,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 1-based line number for a position.
    pub fn line_for_pos(&self, pos: usize) -> Option<usize> {
        self.line_by_pos.get(pos).copied()
    }

    /// One QueryRun per segment, each with fresh matchable state.
    pub fn query_runs(&self) -> Vec<QueryRun<'_>> {
        self.runs
            .iter()
            .map(|&(start, end)| QueryRun::new(self, start, end))
            .collect()
    }

    /// A single run covering the whole query, or None for an empty query.
    pub fn whole_query_run(&self) -> Option<QueryRun<'_>> {
        let start = self.tokens.iter().position(Option::is_some)?;
        let end = self.tokens.iter().rposition(Option::is_some)?;
        Some(QueryRun::new(self, start, end))
    }
}

/// A contiguous sub-range of one query's positions matched as a unit.
///
/// The run owns the mutable "matchables" state: positions are removed as
/// matches consume them, so one token occurrence is never claimed by two
/// matches within the same pass.
#[derive(Debug)]
pub struct QueryRun<'a> {
    pub query: &'a Query,
    /// First position, inclusive. Always a known token.
    pub start: usize,
    /// Last position, inclusive. Always a known token.
    pub end: usize,

    len_junk: usize,
    high_matchables: HashSet<usize>,
    low_matchables: HashSet<usize>,
}

impl<'a> QueryRun<'a> {
    pub fn new(query: &'a Query, start: usize, end: usize) -> Self {
        let len_junk = query.len_junk;
        let mut high_matchables = HashSet::new();
        let mut low_matchables = HashSet::new();
        for pos in start..=end {
            if let Some(tid) = query.tokens[pos] {
                if (tid as usize) < len_junk {
                    low_matchables.insert(pos);
                } else {
                    high_matchables.insert(pos);
                }
            }
        }
        Self {
            query,
            start,
            end,
            len_junk,
            high_matchables,
            low_matchables,
        }
    }

    /// Tokens of this run, still indexed by absolute position offset.
    pub fn tokens(&self) -> &[Option<u16>] {
        &self.query.tokens[self.start..=self.end]
    }

    /// Number of positions in the run, unknown placeholders included.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn start_line(&self) -> usize {
        self.query.line_for_pos(self.start).unwrap_or(1)
    }

    pub fn end_line(&self) -> usize {
        self.query.line_for_pos(self.end).unwrap_or(1)
    }

    #[inline]
    pub fn is_junk_token(&self, tid: u16) -> bool {
        (tid as usize) < self.len_junk
    }

    /// True when every known token in the run is digits only.
    pub fn is_digits_only(&self) -> bool {
        (self.start..=self.end).all(|pos| {
            self.query.tokens[pos].is_none() || self.query.digit_only_pos.contains(&pos)
        })
    }

    /// True if unconsumed matchable content remains. With `include_low`
    /// false, only discriminating positions count.
    pub fn is_matchable(&self, include_low: bool) -> bool {
        if self.is_digits_only() {
            return false;
        }
        if include_low {
            !self.high_matchables.is_empty() || !self.low_matchables.is_empty()
        } else {
            !self.high_matchables.is_empty()
        }
    }

    #[inline]
    pub fn is_pos_high_matchable(&self, pos: usize) -> bool {
        self.high_matchables.contains(&pos)
    }

    #[inline]
    pub fn is_pos_low_matchable(&self, pos: usize) -> bool {
        self.low_matchables.contains(&pos)
    }

    /// True if this position can still be claimed by a match.
    #[inline]
    pub fn is_pos_matchable(&self, pos: usize) -> bool {
        self.high_matchables.contains(&pos) || self.low_matchables.contains(&pos)
    }

    pub fn high_matchables(&self) -> &HashSet<usize> {
        &self.high_matchables
    }

    pub fn low_matchables(&self) -> &HashSet<usize> {
        &self.low_matchables
    }

    /// True when every known position of the run has been consumed.
    pub fn is_fully_consumed(&self) -> bool {
        self.high_matchables.is_empty() && self.low_matchables.is_empty()
    }

    /// True when no position of the run has been consumed yet and the run
    /// contains no unknown token: the whole-run exact matchers rely on this.
    pub fn is_whole_and_known(&self) -> bool {
        (self.start..=self.end).all(|pos| self.query.tokens[pos].is_some())
            && (self.start..=self.end).all(|pos| self.is_pos_matchable(pos))
    }

    /// Token ids at still-matchable positions, as (position, token id) pairs
    /// in increasing position order.
    pub fn matchable_tokens(&self) -> Vec<(usize, u16)> {
        (self.start..=self.end)
            .filter(|pos| self.is_pos_matchable(*pos))
            .filter_map(|pos| self.query.tokens[pos].map(|tid| (pos, tid)))
            .collect()
    }

    /// Query-side postings over still-matchable positions: token id ->
    /// sorted absolute positions.
    pub fn vector(&self) -> HashMap<u16, Vec<usize>> {
        let mut vector: HashMap<u16, Vec<usize>> = HashMap::new();
        for (pos, tid) in self.matchable_tokens() {
            vector.entry(tid).or_default().push(pos);
        }
        vector
    }

    /// Remove matched positions from the matchable sets. Positions already
    /// removed are ignored, so subtraction is idempotent.
    pub fn subtract(&mut self, qspan: &Span) {
        for pos in qspan.iter() {
            self.high_matchables.remove(&pos);
            self.low_matchables.remove(&pos);
        }
    }
}
