//! Ending-mode arbitration for summary sections.
//!
//! The first summary section of a session picks one ending mode at
//! random; every later summary section reuses it, so a story with
//! several summary markers still runs a single coherent closing
//! sequence. Each mode has its own turn budget and its own rubric for
//! judging the child's answers.

use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::oracle::{extract_json_object, Oracle};
use crate::scaffold::{SupportLevel, Technique};

/// Score below which a retelling answer counts toward the low streak.
const LOW_RETELLING_SCORE: f32 = 4.0;

/// How the session closes once a summary section is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndingMode {
    StoryRetelling,
    AlternativeEnding,
    SummaryClosure,
}

impl EndingMode {
    pub const ALL: [EndingMode; 3] = [
        EndingMode::StoryRetelling,
        EndingMode::AlternativeEnding,
        EndingMode::SummaryClosure,
    ];

    pub fn technique(self) -> Technique {
        match self {
            EndingMode::StoryRetelling => Technique::StoryRetelling,
            EndingMode::AlternativeEnding => Technique::AlternativeEnding,
            EndingMode::SummaryClosure => Technique::ResponseSummaryClosure,
        }
    }

    /// Total turns this mode is allowed, initial question included.
    /// Retelling gets an extra turn for more detailed accounts.
    pub fn budget(self) -> u32 {
        match self {
            EndingMode::StoryRetelling => 6,
            EndingMode::AlternativeEnding => 5,
            EndingMode::SummaryClosure => 5,
        }
    }

    pub fn name(self) -> &'static str {
        self.technique().name()
    }

    fn system_prompt(self) -> &'static str {
        match self {
            EndingMode::StoryRetelling => include_str!("prompts/retelling_system.txt"),
            EndingMode::AlternativeEnding => include_str!("prompts/altending_system.txt"),
            EndingMode::SummaryClosure => include_str!("prompts/closure_system.txt"),
        }
    }

    fn user_prompt(self, context: &str, response: &str) -> String {
        let template = match self {
            EndingMode::StoryRetelling => include_str!("prompts/retelling_user.txt"),
            EndingMode::AlternativeEnding => include_str!("prompts/altending_user.txt"),
            EndingMode::SummaryClosure => include_str!("prompts/closure_user.txt"),
        };
        template
            .replace("{context}", context)
            .replace("{response}", response)
    }
}

/// Rubric outcome for one summary-section answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndingEvaluation {
    pub score: f32,
    pub support: SupportLevel,
}

impl EndingEvaluation {
    /// Neutral evaluation used when the rubric call fails. A closing
    /// sequence never aborts on a bad oracle reply.
    pub fn neutral() -> Self {
        Self {
            score: 5.0,
            support: SupportLevel::Medium,
        }
    }
}

/// Map a rubric score to a support level.
pub fn support_for_score(score: f32) -> SupportLevel {
    if score <= 3.0 {
        SupportLevel::High
    } else if score <= 6.0 {
        SupportLevel::Medium
    } else {
        SupportLevel::Low
    }
}

#[derive(Debug, Deserialize)]
struct RubricReply {
    score: f32,
}

/// Per-session ending state: the arbitrated mode and the retelling
/// low-score streak.
#[derive(Debug, Default)]
pub struct EndingArbiter {
    mode: Option<EndingMode>,
    consecutive_low: u32,
}

impl EndingArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mode already chosen for this session, if any.
    pub fn chosen(&self) -> Option<EndingMode> {
        self.mode
    }

    /// Fix the mode ahead of arbitration, for scripted sessions.
    pub fn pin_mode(&mut self, mode: EndingMode) {
        self.mode = Some(mode);
    }

    /// The session's ending mode, arbitrated uniformly at random on
    /// first use and fixed thereafter.
    pub fn mode(&mut self) -> EndingMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        let mode = *EndingMode::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&EndingMode::SummaryClosure);
        tracing::info!(mode = mode.name(), "ending mode arbitrated");
        self.mode = Some(mode);
        mode
    }

    /// Consecutive retelling answers scored below the low threshold.
    /// Tracked for logging and analysis; it does not cut the budget.
    pub fn consecutive_low(&self) -> u32 {
        self.consecutive_low
    }

    /// Judge the child's answer under the arbitrated mode's rubric.
    ///
    /// Support is derived from the score thresholds, not taken from the
    /// oracle, and scores are clamped to the rubric's 0-10 range. Any
    /// failure (network, missing JSON, malformed reply) degrades to the
    /// neutral evaluation.
    pub async fn evaluate<O: Oracle + ?Sized>(
        &mut self,
        oracle: &O,
        child_input: &str,
        context: &str,
    ) -> EndingEvaluation {
        let mode = self.mode();
        let user = mode.user_prompt(context, child_input);

        let evaluation = match oracle.generate(mode.system_prompt(), &user, 150, 0.1).await {
            Ok(text) => match parse_rubric_score(&text) {
                Some(score) => EndingEvaluation {
                    score,
                    support: support_for_score(score),
                },
                None => {
                    tracing::warn!(mode = mode.name(), "rubric reply had no usable score");
                    EndingEvaluation::neutral()
                }
            },
            Err(error) => {
                tracing::warn!(mode = mode.name(), %error, "rubric evaluation failed");
                EndingEvaluation::neutral()
            }
        };

        if mode == EndingMode::StoryRetelling {
            if evaluation.score < LOW_RETELLING_SCORE {
                self.consecutive_low += 1;
                tracing::debug!(streak = self.consecutive_low, "low retelling score");
            } else {
                self.consecutive_low = 0;
            }
        }

        evaluation
    }
}

fn parse_rubric_score(text: &str) -> Option<f32> {
    let json = extract_json_object(text)?;
    let reply: RubricReply = serde_json::from_str(json).ok()?;
    Some(reply.score.clamp(0.0, 10.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use async_trait::async_trait;

    struct CannedOracle(&'static str);

    #[async_trait]
    impl Oracle for CannedOracle {
        async fn generate(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl Oracle for FailingOracle {
        async fn generate(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String, OracleError> {
            Err(OracleError::MissingJson)
        }
    }

    #[test]
    fn test_mode_is_arbitrated_once() {
        let mut arbiter = EndingArbiter::new();
        assert!(arbiter.chosen().is_none());
        let first = arbiter.mode();
        for _ in 0..20 {
            assert_eq!(arbiter.mode(), first);
        }
        assert_eq!(arbiter.chosen(), Some(first));
    }

    #[test]
    fn test_budgets() {
        assert_eq!(EndingMode::StoryRetelling.budget(), 6);
        assert_eq!(EndingMode::AlternativeEnding.budget(), 5);
        assert_eq!(EndingMode::SummaryClosure.budget(), 5);
    }

    #[test]
    fn test_support_thresholds() {
        assert_eq!(support_for_score(0.0), SupportLevel::High);
        assert_eq!(support_for_score(3.0), SupportLevel::High);
        assert_eq!(support_for_score(3.5), SupportLevel::Medium);
        assert_eq!(support_for_score(6.0), SupportLevel::Medium);
        assert_eq!(support_for_score(6.5), SupportLevel::Low);
        assert_eq!(support_for_score(10.0), SupportLevel::Low);
    }

    #[tokio::test]
    async fn test_evaluate_derives_support_and_clamps() {
        let mut arbiter = EndingArbiter {
            mode: Some(EndingMode::SummaryClosure),
            consecutive_low: 0,
        };
        let oracle = CannedOracle("{\"score\": 14, \"rationale\": \"great\"}");
        let eval = arbiter.evaluate(&oracle, "I loved the butterfly", "story").await;
        assert_eq!(eval.score, 10.0);
        assert_eq!(eval.support, SupportLevel::Low);
    }

    #[tokio::test]
    async fn test_evaluate_recovers_to_neutral_on_failure() {
        let mut arbiter = EndingArbiter {
            mode: Some(EndingMode::AlternativeEnding),
            consecutive_low: 0,
        };
        let eval = arbiter.evaluate(&FailingOracle, "anything", "story").await;
        assert_eq!(eval, EndingEvaluation::neutral());

        let oracle = CannedOracle("no json at all");
        let eval = arbiter.evaluate(&oracle, "anything", "story").await;
        assert_eq!(eval, EndingEvaluation::neutral());
    }

    #[tokio::test]
    async fn test_retelling_low_streak_counts_and_resets() {
        let mut arbiter = EndingArbiter {
            mode: Some(EndingMode::StoryRetelling),
            consecutive_low: 0,
        };

        let low = CannedOracle("{\"score\": 2}");
        arbiter.evaluate(&low, "um", "story").await;
        arbiter.evaluate(&low, "dunno", "story").await;
        assert_eq!(arbiter.consecutive_low(), 2);

        let high = CannedOracle("{\"score\": 8}");
        arbiter.evaluate(&high, "Sparky found a box and...", "story").await;
        assert_eq!(arbiter.consecutive_low(), 0);
    }

    #[tokio::test]
    async fn test_non_retelling_mode_ignores_streak() {
        let mut arbiter = EndingArbiter {
            mode: Some(EndingMode::SummaryClosure),
            consecutive_low: 0,
        };
        let low = CannedOracle("{\"score\": 1}");
        arbiter.evaluate(&low, "um", "story").await;
        assert_eq!(arbiter.consecutive_low(), 0);
    }
}
