//! Matching a single response against a single criterion.
//!
//! Matching is literal: the response is lowercased once, then each term is
//! looked up with a [`TermMatcher`]. Forbidden terms are checked first and
//! short-circuit the required-term count.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::Criterion;

/// Reason recorded for a passing test.
pub const PASS_REASON: &str = "All criteria met";

/// Comparison rule deciding whether a term occurs in a response.
///
/// `text` is always the lowercased response; implementations normalize the
/// term themselves.
pub trait TermMatcher: Send + Sync {
    /// Short identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Whether `term` occurs in `text`.
    fn matches(&self, text: &str, term: &str) -> bool;
}

/// Case-insensitive substring containment. "ns" matches inside "transform".
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl TermMatcher for SubstringMatcher {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn matches(&self, text: &str, term: &str) -> bool {
        text.contains(&term.to_lowercase())
    }
}

/// Case-insensitive containment that refuses to match inside a longer word.
///
/// A boundary is only required on a side where the term itself begins or
/// ends with a word character, so terms like `:ns` or `{:op "eval"` still
/// match next to punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordBoundaryMatcher;

impl WordBoundaryMatcher {
    fn pattern(term: &str) -> Option<Regex> {
        let starts_word = term.chars().next().is_some_and(is_word_char);
        let ends_word = term.chars().last().is_some_and(is_word_char);

        let pattern = format!(
            "{}{}{}",
            if starts_word { r"\b" } else { "" },
            regex::escape(term),
            if ends_word { r"\b" } else { "" }
        );

        Regex::new(&pattern).ok()
    }
}

/// Word characters as `\b` sees them (Unicode `\w`).
fn is_word_char(c: char) -> bool {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();

    let mut buf = [0u8; 4];
    match WORD.get_or_init(|| Regex::new(r"^\w$").ok()) {
        Some(word) => word.is_match(c.encode_utf8(&mut buf)),
        None => c.is_alphanumeric() || c == '_',
    }
}

impl TermMatcher for WordBoundaryMatcher {
    fn name(&self) -> &'static str {
        "word-boundary"
    }

    fn matches(&self, text: &str, term: &str) -> bool {
        let term = term.to_lowercase();
        match Self::pattern(&term) {
            Some(re) => re.is_match(text),
            None => text.contains(&term),
        }
    }
}

/// Verdict for one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub passed: bool,
    pub reason: String,
}

impl MatchOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: PASS_REASON.to_string(),
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            passed: false,
            reason,
        }
    }
}

/// Judge `response` against `criterion`.
///
/// 1. Any forbidden term fails immediately, naming the first one found in
///    catalog order.
/// 2. Otherwise the test passes iff at least `criterion.threshold()` of the
///    required terms occur. Each term counts once however often it appears.
pub fn check_response(
    response: &str,
    criterion: &Criterion,
    matcher: &dyn TermMatcher,
) -> MatchOutcome {
    let text = response.to_lowercase();

    if let Some(term) = criterion
        .must_not_include
        .iter()
        .find(|term| matcher.matches(&text, term))
    {
        return MatchOutcome::fail(format!("Contains forbidden term: {}", term));
    }

    let found = criterion
        .must_include
        .iter()
        .filter(|term| matcher.matches(&text, term))
        .count();
    let needed = criterion.threshold();

    if found < needed {
        MatchOutcome::fail(format!("Only {}/{} required terms found", found, needed))
    } else {
        MatchOutcome::pass()
    }
}
