//! Dialogue orchestration: one bounded exchange per story section.
//!
//! An exchange is an explicit loop over turn depth rather than a
//! recursive descent; all per-exchange state (depth, running dialogue,
//! the deferred story remainder) lives in local bindings.

use async_trait::async_trait;
use thiserror::Error;

use crate::ending::{EndingArbiter, EndingMode};
use crate::generate::{EndingTurn, GenerationRequest, ResponseGenerator};
use crate::oracle::Oracle;
use crate::question;
use crate::scaffold::{ScaffoldError, Technique, TechniqueSelection, TechniqueSelector, SelectionContext};
use crate::story::{strip_interaction_tags, Section};
use crate::transcript::Transcript;

/// Stand-in for empty or whitespace-only child input.
pub const EMPTY_INPUT_SUBSTITUTE: &str = "I don't know";

/// Patched onto a non-final ending turn that failed to ask anything.
const REENGAGE_QUESTION: &str = " What else did you notice in our adventure?";

const QUICK_ANSWER_SYSTEM: &str = "You are Ella, a caring robot. Answer the child's \
question in one short, happy, encouraging sentence.";

#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("child io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("technique selection failed: {0}")]
    Scaffold(#[from] ScaffoldError),
}

/// The child-facing channel. The terminal binary speaks stdin/stdout;
/// tests script it.
#[async_trait]
pub trait ChildIo: Send {
    /// Present narrator text to the child.
    async fn narrate(&mut self, text: &str) -> std::io::Result<()>;

    /// Collect the child's next utterance. The label carries the
    /// follow-up progress indicator shown beside the input cursor.
    async fn listen(&mut self, label: &str) -> std::io::Result<String>;
}

/// Runs the scaffolding dialogue for a story, one section at a time.
pub struct Orchestrator {
    selector: TechniqueSelector,
    arbiter: EndingArbiter,
    generator: ResponseGenerator,
    max_depth: u32,
}

impl Orchestrator {
    pub fn new(
        selector: TechniqueSelector,
        arbiter: EndingArbiter,
        generator: ResponseGenerator,
        max_depth: u32,
    ) -> Self {
        Self {
            selector,
            arbiter,
            generator,
            max_depth,
        }
    }

    pub fn arbiter(&self) -> &EndingArbiter {
        &self.arbiter
    }

    pub fn arbiter_mut(&mut self) -> &mut EndingArbiter {
        &mut self.arbiter
    }

    /// Narrate one section and, if it carries a prompt, run the exchange
    /// it opens.
    pub async fn run_section<O: Oracle + ?Sized, IO: ChildIo>(
        &mut self,
        oracle: &O,
        io: &mut IO,
        transcript: &mut Transcript,
        section: &Section,
    ) -> Result<(), DialogueError> {
        let display = strip_interaction_tags(&section.text);
        io.narrate(display.trim()).await?;
        transcript.story(&section.text);

        let Some(base_prompt) = section.prompt.clone() else {
            return Ok(());
        };
        io.narrate(&base_prompt).await?;

        let first_input = io.listen("Child").await?;
        transcript.child(&first_input);

        self.run_exchange(oracle, io, transcript, section, &base_prompt, first_input)
            .await
    }

    /// One bounded exchange: child answer in, scaffolded turn out, until
    /// the depth budget runs out or a turn carries no question.
    async fn run_exchange<O: Oracle + ?Sized, IO: ChildIo>(
        &mut self,
        oracle: &O,
        io: &mut IO,
        transcript: &mut Transcript,
        section: &Section,
        base_prompt: &str,
        first_input: String,
    ) -> Result<(), DialogueError> {
        let summary = section.is_summary();
        let mut depth: u32 = 1;
        let mut prompt = base_prompt.to_string();
        let mut context_before = section.context_before.clone();
        let mut history: Vec<Utterance> = Vec::new();
        let mut child_responses: Vec<String> = Vec::new();
        let mut deferred_remainder: Option<String> = None;
        let mut child_input = first_input;

        loop {
            let input = if child_input.trim().is_empty() {
                EMPTY_INPUT_SUBSTITUTE.to_string()
            } else {
                child_input.trim().to_string()
            };

            // A question from the child gets a quick aside before the
            // scaffolding turn proceeds.
            if let Some(split) = question::classify(&input) {
                match oracle.generate(QUICK_ANSWER_SYSTEM, &split.question, 30, 0.8).await {
                    Ok(quick) => {
                        io.narrate(&quick).await?;
                        transcript.narrator(&quick);
                    }
                    Err(error) => tracing::warn!(%error, "quick answer failed"),
                }
            }

            child_responses.push(input.clone());
            history.push(Utterance::child(&input));

            let (selection, ending) = if summary {
                let mode = self.arbiter.mode();
                let context = match mode {
                    EndingMode::SummaryClosure => section.context_before.clone(),
                    _ => format!("{}{}", section.context_before, section.context_after),
                };
                let evaluation = self.arbiter.evaluate(oracle, &input, &context).await;
                let selection = TechniqueSelection {
                    technique: mode.technique(),
                    support: evaluation.support,
                    score: evaluation.score,
                    example: self.selector.catalog().random_example(mode.technique()),
                };
                let is_final = depth >= mode.budget();
                (selection, Some(EndingTurn { mode, is_final }))
            } else {
                let ctx = SelectionContext {
                    child_input: &input,
                    prompt: &prompt,
                    context_before: &context_before,
                    context_after: &section.context_after,
                    vocab: section.vocab.as_deref(),
                    vocab_role: section.vocab_role,
                    max_depth: self.max_depth,
                    depth,
                };
                (self.selector.select(oracle, &ctx).await?, None)
            };

            // Upcoming story text is shared only where the reply must not
            // contradict it.
            let context_after = (selection.technique == Technique::Transition || summary)
                .then(|| section.context_after.as_str());

            let request = GenerationRequest {
                child_input: &input,
                prompt: &prompt,
                context_before: &context_before,
                context_after,
                selection: &selection,
                vocab: section.vocab.as_deref(),
                vocab_role: section.vocab_role,
                ending,
            };
            let mut reply = self.generator.generate(oracle, &request).await;

            let mut split = question::classify(&reply);
            let should_continue = match ending {
                Some(turn) => {
                    if !turn.is_final && split.is_none() {
                        // A closing-sequence turn must keep the exchange
                        // open until the budget runs out.
                        reply.push_str(REENGAGE_QUESTION);
                        split = question::classify(&reply);
                    }
                    !turn.is_final
                }
                None => depth < self.max_depth && selection.technique != Technique::Transition,
            };

            transcript.strategy(&selection, section.vocab.as_deref(), section.vocab_role, summary);
            transcript.robot(&reply);
            io.narrate(&reply).await?;
            history.push(Utterance::robot(&reply));

            tracing::debug!(
                depth,
                technique = selection.technique.name(),
                continuing = should_continue,
                "turn complete"
            );

            if !should_continue || split.is_none() {
                break;
            }

            // Story text trailing the first turn's question is held back
            // until the whole exchange has played out.
            if depth == 1 {
                if let Some(s) = &split {
                    if !s.remainder.trim().is_empty() {
                        deferred_remainder = Some(s.remainder.trim().to_string());
                    }
                }
            }

            let label = self.followup_label(depth, summary);
            let next_input = io.listen(&label).await?;
            if depth == 1 {
                transcript.child(&next_input);
            } else {
                transcript.child_followup(depth, &next_input);
            }

            context_before = extend_context(&section.context_before, &history);
            prompt = followup_prompt(base_prompt, &history, &child_responses);
            child_input = next_input;
            depth += 1;
        }

        if let Some(remainder) = deferred_remainder {
            io.narrate(&remainder).await?;
            transcript.robot(&remainder);
        }

        Ok(())
    }

    /// Progress indicator for the input cursor once follow-ups start.
    fn followup_label(&mut self, depth: u32, summary: bool) -> String {
        if depth <= 1 {
            return "Child".to_string();
        }
        if summary {
            let mode = self.arbiter.mode();
            if mode == EndingMode::StoryRetelling {
                return format!("Child [Follow-up question {depth}]");
            }
            let budget = mode.budget();
            let mut label = format!("Child [Follow-up question {depth}/{}]", budget - 1);
            if depth == budget - 1 {
                label.push_str(" (Final follow-up)");
            }
            return label;
        }
        let mut label = format!("Child [Follow-up question {depth}/{}]", self.max_depth - 1);
        if depth == self.max_depth - 1 {
            label.push_str(" (Final follow-up)");
        }
        label
    }
}

#[derive(Debug, Clone)]
struct Utterance {
    from_child: bool,
    text: String,
}

impl Utterance {
    fn child(text: &str) -> Self {
        Self {
            from_child: true,
            text: text.to_string(),
        }
    }

    fn robot(text: &str) -> Self {
        Self {
            from_child: false,
            text: text.to_string(),
        }
    }
}

/// Story context extended with the running dialogue, latest robot turn
/// excluded (it is carried separately as the active prompt).
fn extend_context(base: &str, history: &[Utterance]) -> String {
    let mut out = String::from(base);
    out.push('\n');
    let upto = history.len().saturating_sub(1);
    for utterance in &history[..upto] {
        let speaker = if utterance.from_child { "Child" } else { "Robot" };
        out.push_str(&format!("{speaker}: {}\n", utterance.text));
    }
    out.trim_end().to_string()
}

/// The follow-up prompt: the original question plus the conversation so
/// far and the child's answers turn by turn.
fn followup_prompt(base_prompt: &str, history: &[Utterance], child_responses: &[String]) -> String {
    let mut out = format!("{base_prompt}\nPrevious conversation:\n");
    for utterance in history {
        let role = if utterance.from_child { "User" } else { "Assistant" };
        out.push_str(&format!("{role}: {}\n", utterance.text));
    }
    out.push_str("Previous responses from the child:\n");
    for (i, response) in child_responses.iter().enumerate() {
        out.push_str(&format!("- Turn {}: \"{response}\"\n", i + 1));
    }
    out
}
