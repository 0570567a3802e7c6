//! Relevance ranking for catalog search results.
//!
//! The catalog only does a "contains" search, so ordering is recovered here
//! from how the display name relates to the query text. Each candidate is
//! classified into exactly one [`MatchKind`], checked top-down, and the
//! kind's score drives the ordering. Candidates missing any query word are
//! dropped.

use std::cmp::Reverse;

use crate::catalog::Candidate;
use crate::constants::constants;

/// How a display name relates to the query, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
  /// Display name equals the full query text.
  Exact,
  /// Display name starts with the full query text.
  Prefix,
  /// At least one query word is not a substring of the display name.
  MissingWord,
  /// Display name starts with one of the query words.
  WordPrefix,
  /// Query appears as `" q "` or `" q:"`.
  Phrase,
  /// Query appears anywhere.
  Substring,
  /// Every word appears, but not as a phrase or prefix.
  AllWords,
}

impl MatchKind {
  pub fn score(self) -> u32 {
    match self {
      MatchKind::Exact => 10_000,
      MatchKind::Prefix => 5_000,
      MatchKind::MissingWord => 0,
      MatchKind::WordPrefix => 3_000,
      MatchKind::Phrase => 2_000,
      MatchKind::Substring => 1_000,
      MatchKind::AllWords => 500,
    }
  }
}

/// A lower-cased query and its whitespace-separated words.
pub struct Query<'a> {
  text: &'a str,
  words: Vec<&'a str>,
}

impl<'a> Query<'a> {
  pub fn new(lowered: &'a str) -> Self {
    Self { text: lowered, words: lowered.split_whitespace().collect() }
  }

  /// Classify an already lower-cased display name.
  pub fn classify(&self, name: &str) -> MatchKind {
    let q = self.text;
    if name == q {
      return MatchKind::Exact;
    }
    if name.starts_with(q) {
      return MatchKind::Prefix;
    }
    if !self.words.iter().all(|w| name.contains(w)) {
      return MatchKind::MissingWord;
    }
    if self.words.iter().any(|w| name.starts_with(w)) {
      return MatchKind::WordPrefix;
    }
    // Only a space or colon counts as the trailing boundary.
    if name.contains(&format!(" {q} ")) || name.contains(&format!(" {q}:")) {
      return MatchKind::Phrase;
    }
    if name.contains(q) {
      return MatchKind::Substring;
    }
    MatchKind::AllWords
  }
}

struct Scored {
  score: u32,
  year: i32,
  candidate: Candidate,
}

/// Rank `candidates` against `query`, capped at the configured result limit.
pub fn rank(candidates: Vec<Candidate>, query: &str) -> Vec<Candidate> {
  rank_top(candidates, query, constants().max_results)
}

/// Rank `candidates` against `query` and keep the best `limit`.
///
/// Ordering is score descending, then production year descending (missing
/// year counts as 0). The sort is stable, so full ties keep catalog order.
pub fn rank_top(candidates: Vec<Candidate>, query: &str, limit: usize) -> Vec<Candidate> {
  let lowered = query.to_lowercase();
  let query = Query::new(&lowered);

  let mut scored: Vec<Scored> = candidates
    .into_iter()
    .filter_map(|candidate| {
      let kind = query.classify(&candidate.display_name().to_lowercase());
      if kind == MatchKind::MissingWord {
        return None;
      }
      Some(Scored { score: kind.score(), year: candidate.production_year.unwrap_or(0), candidate })
    })
    .collect();

  scored.sort_by_key(|s| (Reverse(s.score), Reverse(s.year)));
  scored.into_iter().take(limit).map(|s| s.candidate).collect()
}
