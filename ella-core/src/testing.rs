//! Testing utilities for the story engine.
//!
//! - `MockOracle` for deterministic tests without API calls
//! - `ScriptedChild` for scripted child input
//! - `SessionHarness` for whole-session scenarios
//! - Assertion helpers over the rendered transcript

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::dialogue::ChildIo;
use crate::ending::EndingMode;
use crate::oracle::{Oracle, OracleError};
use crate::session::{SessionConfig, SessionError, StorySession};

/// One scripted oracle reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Returned verbatim from `generate`.
    Text(String),
    /// Simulates a failed oracle call.
    Failure,
}

impl MockReply {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// A selection judgment in the wire format `judge` expects.
    pub fn judgment(score: f32, support: &str, technique: &str) -> Self {
        Self::Text(format!(
            "{{\"complexity_score\": {score}, \"support_level\": \"{support}\", \
             \"selected_technique\": \"{technique}\"}}"
        ))
    }

    /// An ending-rubric score reply.
    pub fn score(score: f32) -> Self {
        Self::Text(format!("{{\"score\": {score}}}"))
    }
}

/// An oracle that replays scripted replies in order.
///
/// Runs out of script → every further call fails, which generation paths
/// absorb as their canned fallback and judgment paths surface as errors.
pub struct MockOracle {
    replies: Mutex<VecDeque<MockReply>>,
}

impl MockOracle {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn queue(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn generate(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: usize,
        _temperature: f32,
    ) -> Result<String, OracleError> {
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure) | None => Err(OracleError::MissingJson),
        }
    }
}

/// A child whose answers are scripted, recording everything narrated.
#[derive(Default)]
pub struct ScriptedChild {
    answers: VecDeque<String>,
    /// Everything narrated, in order.
    pub heard: Vec<String>,
    /// Labels shown when input was solicited.
    pub labels: Vec<String>,
}

impl ScriptedChild {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            heard: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn queue_answer(&mut self, answer: impl Into<String>) {
        self.answers.push_back(answer.into());
    }

    /// Whether any narrated line contains the needle.
    pub fn heard_containing(&self, needle: &str) -> bool {
        self.heard.iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl ChildIo for ScriptedChild {
    async fn narrate(&mut self, text: &str) -> std::io::Result<()> {
        self.heard.push(text.to_string());
        Ok(())
    }

    async fn listen(&mut self, label: &str) -> std::io::Result<String> {
        self.labels.push(label.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

/// Harness for whole-session scenarios: a story, a scripted oracle, and
/// a scripted child. The warm-up is off by default so scripts stay
/// focused on the dialogue under test.
pub struct SessionHarness {
    story: String,
    config: SessionConfig,
    ending_mode: Option<EndingMode>,
    pub oracle: MockOracle,
    pub child: ScriptedChild,
}

impl SessionHarness {
    pub fn new(story: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            config: SessionConfig::new().with_warm_up(false),
            ending_mode: None,
            oracle: MockOracle::new(Vec::new()),
            child: ScriptedChild::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the ending mode instead of leaving it to arbitration.
    pub fn with_ending_mode(mut self, mode: EndingMode) -> Self {
        self.ending_mode = Some(mode);
        self
    }

    pub fn expect_oracle(mut self, reply: MockReply) -> Self {
        self.oracle.queue(reply);
        self
    }

    pub fn child_says(mut self, answer: impl Into<String>) -> Self {
        self.child.queue_answer(answer);
        self
    }

    /// Run the session to completion and return the rendered transcript
    /// along with the arbitrated ending mode, if any.
    pub async fn run(&mut self) -> Result<(String, Option<EndingMode>), SessionError> {
        let mut session = StorySession::new(self.story.clone(), self.config.clone())?;
        if let Some(mode) = self.ending_mode {
            session.pin_ending_mode(mode);
        }
        session.run(&self.oracle, &mut self.child).await?;
        Ok((session.transcript().render(), session.ending_mode()))
    }
}

/// Assert the rendered transcript contains the needle.
#[track_caller]
pub fn assert_transcript_contains(transcript: &str, needle: &str) {
    assert!(
        transcript.contains(needle),
        "expected transcript to contain {needle:?}, got:\n{transcript}"
    );
}

/// Assert the rendered transcript does NOT contain the needle.
#[track_caller]
pub fn assert_transcript_lacks(transcript: &str, needle: &str) {
    assert!(
        !transcript.contains(needle),
        "expected transcript to lack {needle:?}, got:\n{transcript}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_oracle_replays_in_order() {
        let oracle = MockOracle::new(vec![MockReply::text("one"), MockReply::text("two")]);
        assert_eq!(oracle.generate("s", "u", 10, 0.0).await.unwrap(), "one");
        assert_eq!(oracle.generate("s", "u", 10, 0.0).await.unwrap(), "two");
        assert!(oracle.generate("s", "u", 10, 0.0).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_oracle_scripted_failure() {
        let oracle = MockOracle::new(vec![MockReply::Failure, MockReply::text("after")]);
        assert!(oracle.generate("s", "u", 10, 0.0).await.is_err());
        assert_eq!(oracle.generate("s", "u", 10, 0.0).await.unwrap(), "after");
    }

    #[test]
    fn test_mock_reply_judgment_wire_format() {
        let MockReply::Text(text) = MockReply::judgment(6.0, "low", "reasoning") else {
            panic!("judgment is a text reply");
        };
        let judgment = crate::oracle::parse_judgment(&text).unwrap();
        assert_eq!(judgment.score, 6.0);
        assert_eq!(judgment.support_level, "low");
        assert_eq!(judgment.selected_technique.as_deref(), Some("reasoning"));
    }

    #[tokio::test]
    async fn test_scripted_child_records_what_it_hears() {
        let mut child = ScriptedChild::new(&["hello"]);
        child.narrate("Once upon a time").await.unwrap();
        assert_eq!(child.listen("Child").await.unwrap(), "hello");
        assert!(child.heard_containing("upon a time"));
        assert_eq!(child.labels, vec!["Child"]);
        // Exhausted scripts read as silence.
        assert_eq!(child.listen("Child").await.unwrap(), "");
    }
}
