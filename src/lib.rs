//! Matchcode: a license-text matching engine.
//!
//! The engine indexes a corpus of license rules and finds, for arbitrary
//! input text, which rules it matches with token-level alignment, gap
//! tolerance and scoring. Build a [`MatchEngine`] once from rule records and
//! share it read-only across any number of scans.

pub mod candidates;
pub mod engine;
pub mod index;
pub mod loader;
pub mod match_chunk;
pub mod match_hash;
pub mod match_inv;
pub mod match_seq;
pub mod match_small;
pub mod matches;
pub mod models;
pub mod query;
pub mod refine;
pub mod seqdiff;
pub mod spans;
pub mod tokenize;


pub use engine::MatchEngine;
pub use loader::load_rules_from_directory;
pub use matches::{LicenseMatch, MatchRecord};
pub use models::{RuleKind, RuleRecord};
