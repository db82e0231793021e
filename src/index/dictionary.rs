//! Token string to integer id mapping.
//!
//! Ids are assigned once at index build time so that the most common "junk"
//! tokens occupy the lowest contiguous range `[0, len_junk)`. Many matching
//! loops rely on `tid < len_junk` as an O(1) junk test, so the partition is
//! load-bearing and the dictionary is immutable after construction.

use std::collections::HashMap;

/// Frequency-ordered token dictionary with a junk id partition.
#[derive(Debug, Clone)]
pub struct TokenDictionary {
    ids_by_token: HashMap<String, u16>,
    tokens_by_tid: Vec<String>,
    len_junk: usize,
}

impl TokenDictionary {
    /// Build a dictionary from an ordered token list where the first
    /// `len_junk` entries are the junk tokens.
    pub fn from_ordered_tokens(tokens_by_tid: Vec<String>, len_junk: usize) -> Self {
        let ids_by_token = tokens_by_tid
            .iter()
            .enumerate()
            .map(|(tid, token)| (token.clone(), tid as u16))
            .collect();
        Self {
            ids_by_token,
            tokens_by_tid,
            len_junk,
        }
    }

    /// Look up the id for a token string.
    pub fn get(&self, token: &str) -> Option<u16> {
        self.ids_by_token.get(token).copied()
    }

    /// Look up the token string for an id.
    pub fn token(&self, tid: u16) -> Option<&str> {
        self.tokens_by_tid.get(tid as usize).map(String::as_str)
    }

    /// True for ids in the junk partition.
    #[inline]
    pub fn is_junk(&self, tid: u16) -> bool {
        (tid as usize) < self.len_junk
    }

    /// True for discriminating (non-junk) ids.
    #[inline]
    pub fn is_high(&self, tid: u16) -> bool {
        !self.is_junk(tid)
    }

    /// Number of junk token ids.
    pub fn len_junk(&self) -> usize {
        self.len_junk
    }

    /// Total number of known tokens.
    pub fn len(&self) -> usize {
        self.tokens_by_tid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens_by_tid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dictionary() -> TokenDictionary {
        TokenDictionary::from_ordered_tokens(
            vec![
                "the".to_string(),
                "and".to_string(),
                "license".to_string(),
                "copyright".to_string(),
            ],
            2,
        )
    }

    #[test]
    fn test_lookup_both_ways() {
        let dict = make_dictionary();
        assert_eq!(dict.get("the"), Some(0));
        assert_eq!(dict.get("license"), Some(2));
        assert_eq!(dict.get("missing"), None);
        assert_eq!(dict.token(3), Some("copyright"));
        assert_eq!(dict.token(9), None);
    }

    #[test]
    fn test_junk_partition() {
        let dict = make_dictionary();
        assert!(dict.is_junk(0));
        assert!(dict.is_junk(1));
        assert!(dict.is_high(2));
        assert!(dict.is_high(3));
        assert_eq!(dict.len_junk(), 2);
    }

    #[test]
    fn test_every_id_below_len_junk_is_junk() {
        let dict = make_dictionary();
        for tid in 0..dict.len() as u16 {
            assert_eq!(dict.is_junk(tid), (tid as usize) < dict.len_junk());
        }
    }

    #[test]
    fn test_len() {
        let dict = make_dictionary();
        assert_eq!(dict.len(), 4);
        assert!(!dict.is_empty());
    }
}
