//! Question detection for conversation control.
//!
//! The orchestrator keeps soliciting the child only while the narrator's
//! reply reads as a question, so this classifier deliberately favors
//! recall: ambiguous imperative or suggestive phrasing ("tell me...",
//! "imagine...") counts as a question. A false negative here silently
//! truncates the conversation, which is the worse failure mode.

use once_cell::sync::Lazy;
use regex::Regex;

/// A trailing clause ending in a literal question mark.
static TRAILING_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9][^.!?]*\?\s*$").expect("trailing question pattern is valid")
});

/// Interrogative-intent phrases matched anywhere in the text.
static IMPLICIT_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:tell me|can you|would you|could you|imagine|describe|explain|share|think about|remember|recall|what if|how about|let's talk about)\b",
    )
    .expect("implicit phrase pattern is valid")
});

/// Wh-/modal openers at the start of the text or after whitespace.
static QUESTION_OPENERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)(?:how|what|why|who|when|where|can you|would you|could you|do you|tell me about|describe|explain|what do you think|what if|imagine if|remember|recall|think about)\b",
    )
    .expect("opener pattern is valid")
});

/// The question clause extracted from a piece of text, plus whatever
/// follows it (normally empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSplit {
    pub question: String,
    pub remainder: String,
}

/// Classify a text fragment, returning the question span and remainder
/// when the text reads as a question.
///
/// Policy, in priority order: a trailing `?`-terminated clause wins; then
/// interrogative-intent phrases anywhere; then sentence openers. Anything
/// else is not a question.
pub fn classify(text: &str) -> Option<QuestionSplit> {
    let clean = text.trim();
    if clean.is_empty() {
        return None;
    }

    if let Some(m) = TRAILING_QUESTION.find(clean) {
        return Some(QuestionSplit {
            question: clean[m.start()..m.end()].trim().to_string(),
            remainder: clean[m.end()..].trim().to_string(),
        });
    }

    if IMPLICIT_PHRASES.is_match(clean) || QUESTION_OPENERS.is_match(clean) {
        return Some(QuestionSplit {
            question: clean.to_string(),
            remainder: String::new(),
        });
    }

    None
}

/// Whether the text reads as a question at all.
pub fn is_question(text: &str) -> bool {
    classify(text).is_some()
}
