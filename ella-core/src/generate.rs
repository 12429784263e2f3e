//! Turn-level response generation.
//!
//! Generation is best-effort: a failed oracle call degrades to a canned
//! re-engagement line instead of aborting the session, unlike selection
//! where a bad judgment is fatal. Post-processing enforces the shape
//! guarantees the orchestrator relies on (questions keep the exchange
//! open, the final closing turn never ends in one).

use crate::ending::EndingMode;
use crate::oracle::Oracle;
use crate::scaffold::{Technique, TechniqueSelection};
use crate::story::VocabRole;

/// Reply used when the oracle call fails mid-conversation.
pub const FALLBACK_RESPONSE: &str = "That's interesting! Can you tell me more about that?";

const GENERATION_MAX_TOKENS: usize = 150;
const GENERATION_TEMPERATURE: f32 = 0.7;

/// Phrases that mark a reply as already saying goodbye.
const FAREWELL_CUES: [&str; 4] = ["see you", "until next", "tomorrow", "goodbye"];

/// How verbose the narrator's replies should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseLength {
    #[default]
    Short,
    Standard,
}

impl ResponseLength {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "short" => Some(Self::Short),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

/// Marks a generation request as part of the closing sequence.
#[derive(Debug, Clone, Copy)]
pub struct EndingTurn {
    pub mode: EndingMode,
    pub is_final: bool,
}

/// Everything the generator needs for one turn.
#[derive(Debug)]
pub struct GenerationRequest<'a> {
    pub child_input: &'a str,
    pub prompt: &'a str,
    pub context_before: &'a str,
    /// Upcoming story text; supplied only for transition turns and
    /// summary sections, where the reply must not contradict it.
    pub context_after: Option<&'a str>,
    pub selection: &'a TechniqueSelection,
    pub vocab: Option<&'a str>,
    pub vocab_role: Option<VocabRole>,
    pub ending: Option<EndingTurn>,
}

/// Produces the narrator's reply for a turn.
#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    child_name: String,
    length: ResponseLength,
}

impl ResponseGenerator {
    pub fn new(child_name: impl Into<String>, length: ResponseLength) -> Self {
        Self {
            child_name: child_name.into(),
            length,
        }
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    /// Generate the narrator's reply. Never fails: oracle errors degrade
    /// to [`FALLBACK_RESPONSE`].
    pub async fn generate<O: Oracle + ?Sized>(
        &self,
        oracle: &O,
        request: &GenerationRequest<'_>,
    ) -> String {
        let system = self.system_prompt(request);
        let user = self.user_prompt(request);

        let reply = match oracle
            .generate(&system, &user, GENERATION_MAX_TOKENS, GENERATION_TEMPERATURE)
            .await
        {
            Ok(text) => clean_reply(&text),
            Err(error) => {
                tracing::warn!(%error, "response generation failed, using fallback");
                FALLBACK_RESPONSE.to_string()
            }
        };

        self.post_process(reply, request)
    }

    fn system_prompt(&self, request: &GenerationRequest<'_>) -> String {
        let technique = request.selection.technique;
        let mut system = if technique == Technique::Transition {
            request.selection.technique.guidance().to_string()
        } else if request.ending.is_some() {
            include_str!("prompts/response_summary_closure.txt").to_string()
        } else {
            format!(
                "{}\n\n{}",
                technique.guidance(),
                include_str!("prompts/response_common.txt")
            )
        };

        if self.length == ResponseLength::Short {
            system.push_str("\n\nKeep your reply to one or two short sentences.");
        }
        system
    }

    fn user_prompt(&self, request: &GenerationRequest<'_>) -> String {
        let mut user = String::new();

        user.push_str("Story content before the current interaction:\n");
        user.push_str(request.context_before);
        user.push('\n');

        if let Some(after) = request.context_after {
            user.push_str("\nStory content after the current interaction:\n");
            user.push_str(after);
            user.push('\n');
        }

        if let Some(vocab) = request.vocab {
            user.push_str(&format!("\nTarget vocabulary word: {vocab}\n"));
            if let Some(role) = request.vocab_role {
                user.push_str(&format!("Vocabulary role: {}\n", role.as_str()));
            }
        }

        if let Some(ending) = request.ending {
            user.push('\n');
            user.push_str(ending_instructions(ending.mode));
            if needs_extra_support(request.child_input) {
                user.push('\n');
                user.push_str(extra_support(ending.mode));
            }
        }

        if !request.selection.example.is_empty() {
            user.push_str(&format!(
                "\nExample of this technique in use: {}\n",
                request.selection.example
            ));
        }

        user.push_str(&format!(
            "\nThe child's response to the question \"{}\":\n\"{}\"\n",
            request.prompt, request.child_input
        ));

        user.push_str(
            "\nBased on the child's response, generate the narrator's next turn. \
             Build on their words, stay warm and encouraging, and connect back \
             to specific story elements.\n",
        );

        match request.ending {
            Some(EndingTurn { is_final: true, .. }) => {
                user.push('\n');
                user.push_str(
                    &include_str!("prompts/closing_rules.txt")
                        .replace("{child_name}", &self.child_name),
                );
            }
            Some(EndingTurn { is_final: false, .. }) => {
                user.push('\n');
                user.push_str(include_str!("prompts/question_rules.txt"));
            }
            None => {}
        }

        user
    }

    fn post_process(&self, mut reply: String, request: &GenerationRequest<'_>) -> String {
        let is_final = matches!(request.ending, Some(EndingTurn { is_final: true, .. }));

        if is_final {
            return self.enforce_closing(reply);
        }

        // A retelling turn that fails to ask anything would stall the
        // exchange; patch in a follow-up question.
        if request.selection.technique == Technique::StoryRetelling
            && !reply.trim_end().ends_with('?')
        {
            let lower = reply.to_lowercase();
            if lower.contains("remember") {
                reply.push_str(" What else do you remember from the story?");
            } else if lower.contains("think") {
                reply.push_str(" Can you tell me more about that?");
            } else {
                reply.push_str(" What happened next in the story?");
            }
        }

        reply
    }

    /// The final turn must be a statement that names the child and says
    /// goodbye, whatever the oracle produced.
    fn enforce_closing(&self, reply: String) -> String {
        let mut text = reply.trim_end().to_string();
        if text.ends_with('?') {
            while text.ends_with('?') {
                text.pop();
            }
            let trimmed = text.trim_end().to_string();
            text = format!("{trimmed}.");
        }

        let lower = text.to_lowercase();
        let has_cue = FAREWELL_CUES.iter().any(|cue| lower.contains(cue));
        let has_name = text.contains(&self.child_name);
        if !has_cue || !has_name {
            text.push_str(&format!(" See you tomorrow, {}!", self.child_name));
        }
        text
    }
}

fn ending_instructions(mode: EndingMode) -> &'static str {
    match mode {
        EndingMode::StoryRetelling => include_str!("prompts/ending_retelling.txt"),
        EndingMode::AlternativeEnding => include_str!("prompts/ending_alternative.txt"),
        EndingMode::SummaryClosure => include_str!("prompts/ending_closure.txt"),
    }
}

/// Brief or unsure answers in the closing sequence get extra scaffolding
/// guidance in the prompt.
fn needs_extra_support(child_input: &str) -> bool {
    let lower = child_input.to_lowercase();
    child_input.split_whitespace().count() <= 3
        || lower.contains("don't know")
        || lower.contains("not sure")
}

fn extra_support(mode: EndingMode) -> &'static str {
    match mode {
        EndingMode::StoryRetelling => {
            "IMPORTANT: The child needs help retelling. Remind them of one \
             key story moment, ask about a specific character's actions or \
             feelings, and end with a new, easier question."
        }
        EndingMode::AlternativeEnding => {
            "IMPORTANT: The child needs help imagining a different ending. \
             Offer two creative possibilities as examples, or a \"what if\" \
             suggestion, and end with a new, easier question."
        }
        EndingMode::SummaryClosure => {
            "IMPORTANT: The child's answer was brief or unsure. Reference a \
             specific story element they might remember, offer two simple \
             options to choose from, and end with a new, easier question."
        }
    }
}

/// Strip wrapping quotation marks the oracle sometimes adds.
pub fn clean_reply(text: &str) -> String {
    let mut out = text.trim();
    loop {
        let stripped = out
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| out.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        match stripped {
            Some(inner) if !inner.is_empty() => out = inner.trim(),
            _ => break,
        }
    }
    out.to_string()
}
