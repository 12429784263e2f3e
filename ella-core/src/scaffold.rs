//! Scaffolding technique taxonomy and per-turn selection.
//!
//! The taxonomy is a closed enumeration; per-technique metadata
//! (definition, support level, canned examples) comes from an embedded
//! catalog that is validated against the enumeration at load time, so a
//! stray key in the catalog is a startup error rather than a runtime
//! surprise.

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

use crate::oracle::{Oracle, OracleError};
use crate::story::VocabRole;

/// How many recently used techniques to bias selection away from.
const RECENT_MEMORY: usize = 2;

/// Score reported for the disengagement short-circuit.
const DISENGAGED_SCORE: f32 = 0.0;

/// Score reported for the forced transition turn.
const TRANSITION_SCORE: f32 = 8.0;

/// The fixed scaffolding taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    ReducingChoices,
    CoParticipating,
    Eliciting,
    Generalizing,
    Reasoning,
    Predicting,
    /// Sentinel: the orchestrator stops recursing after a transition turn.
    Transition,
    StoryRetelling,
    AlternativeEnding,
    ResponseSummaryClosure,
}

impl Technique {
    pub const ALL: [Technique; 10] = [
        Technique::ReducingChoices,
        Technique::CoParticipating,
        Technique::Eliciting,
        Technique::Generalizing,
        Technique::Reasoning,
        Technique::Predicting,
        Technique::Transition,
        Technique::StoryRetelling,
        Technique::AlternativeEnding,
        Technique::ResponseSummaryClosure,
    ];

    /// The three techniques used when the child disengages.
    pub const HIGH_SUPPORT_FALLBACKS: [Technique; 3] = [
        Technique::ReducingChoices,
        Technique::CoParticipating,
        Technique::Eliciting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Technique::ReducingChoices => "reducing_choices",
            Technique::CoParticipating => "co-participating",
            Technique::Eliciting => "eliciting",
            Technique::Generalizing => "generalizing",
            Technique::Reasoning => "reasoning",
            Technique::Predicting => "predicting",
            Technique::Transition => "transition",
            Technique::StoryRetelling => "story_retelling",
            Technique::AlternativeEnding => "alternative_ending",
            Technique::ResponseSummaryClosure => "response_summary_closure",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Whether this technique belongs to the story's closing sequence.
    pub fn is_ending(self) -> bool {
        matches!(
            self,
            Technique::StoryRetelling
                | Technique::AlternativeEnding
                | Technique::ResponseSummaryClosure
        )
    }

    /// System guidance text for response generation with this technique.
    pub fn guidance(self) -> &'static str {
        match self {
            Technique::ReducingChoices => include_str!("prompts/response_reducing_choices.txt"),
            Technique::CoParticipating => include_str!("prompts/response_co_participating.txt"),
            Technique::Eliciting => include_str!("prompts/response_eliciting.txt"),
            Technique::Generalizing => include_str!("prompts/response_generalizing.txt"),
            Technique::Reasoning => include_str!("prompts/response_reasoning.txt"),
            Technique::Predicting => include_str!("prompts/response_predicting.txt"),
            Technique::Transition => include_str!("prompts/response_transition.txt"),
            Technique::StoryRetelling => include_str!("prompts/response_story_retelling.txt"),
            Technique::AlternativeEnding => include_str!("prompts/response_alternative_ending.txt"),
            Technique::ResponseSummaryClosure => {
                include_str!("prompts/response_summary_closure.txt")
            }
        }
    }
}

/// Coarse category of how much scaffolding a technique provides.
///
/// `Medium` is produced only by the ending-mode evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportLevel {
    High,
    Medium,
    Low,
}

impl SupportLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SupportLevel::High => "high",
            SupportLevel::Medium => "medium",
            SupportLevel::Low => "low",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "high" => Some(SupportLevel::High),
            "medium" => Some(SupportLevel::Medium),
            "low" => Some(SupportLevel::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for SupportLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog metadata for one technique.
#[derive(Debug, Clone)]
pub struct TechniqueInfo {
    pub definition: String,
    pub support: SupportLevel,
    pub examples: Vec<String>,
}

/// Errors validating the embedded technique catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("technique catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog names unknown technique '{0}'")]
    UnknownTechnique(String),

    #[error("catalog is missing technique '{0}'")]
    MissingTechnique(&'static str),

    #[error("catalog entry '{0}' has invalid support level '{1}'")]
    InvalidSupportLevel(&'static str, String),

    #[error("catalog entry '{0}' has no examples")]
    NoExamples(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawTechniqueInfo {
    full_definition: String,
    support_level: String,
    examples: Vec<String>,
}

/// Validated technique metadata, indexed by enum variant.
#[derive(Debug, Clone)]
pub struct TechniqueCatalog {
    entries: Vec<TechniqueInfo>,
}

impl TechniqueCatalog {
    /// Load and validate the embedded catalog. Every enum variant must be
    /// present, carry a known support level, and have at least one example.
    pub fn load() -> Result<Self, CatalogError> {
        let raw: HashMap<String, RawTechniqueInfo> =
            serde_json::from_str(include_str!("prompts/techniques.json"))?;

        for key in raw.keys() {
            if Technique::from_name(key).is_none() {
                return Err(CatalogError::UnknownTechnique(key.clone()));
            }
        }

        let mut entries = Vec::with_capacity(Technique::ALL.len());
        for technique in Technique::ALL {
            let raw_entry = raw
                .get(technique.name())
                .ok_or(CatalogError::MissingTechnique(technique.name()))?;

            let support = SupportLevel::from_str(&raw_entry.support_level).ok_or_else(|| {
                CatalogError::InvalidSupportLevel(
                    technique.name(),
                    raw_entry.support_level.clone(),
                )
            })?;

            if raw_entry.examples.is_empty() {
                return Err(CatalogError::NoExamples(technique.name()));
            }

            entries.push(TechniqueInfo {
                definition: raw_entry.full_definition.clone(),
                support,
                examples: raw_entry.examples.clone(),
            });
        }

        Ok(Self { entries })
    }

    pub fn info(&self, technique: Technique) -> &TechniqueInfo {
        &self.entries[technique as usize]
    }

    /// A random canned example for the technique.
    pub fn random_example(&self, technique: Technique) -> String {
        self.info(technique)
            .examples
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

/// Result of one selection decision. Created fresh each turn.
#[derive(Debug, Clone)]
pub struct TechniqueSelection {
    pub technique: Technique,
    pub support: SupportLevel,
    pub score: f32,
    /// Illustrative example handed to the response formatter.
    pub example: String,
}

/// Errors from technique selection.
///
/// An oracle failure or malformed judgment here is fatal for the turn: a
/// wrong or fabricated technique name would corrupt the taxonomy's
/// contract with the response-formatting stage.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("oracle failure during technique selection: {0}")]
    Oracle(#[from] OracleError),

    #[error("judgment carried invalid support level '{0}'")]
    InvalidSupportLevel(String),

    #[error("judgment carried unknown or ineligible technique '{0}'")]
    InvalidTechnique(String),
}

/// Context for one selection decision.
#[derive(Debug, Clone)]
pub struct SelectionContext<'a> {
    pub child_input: &'a str,
    pub prompt: &'a str,
    pub context_before: &'a str,
    pub context_after: &'a str,
    pub vocab: Option<&'a str>,
    pub vocab_role: Option<VocabRole>,
    pub max_depth: u32,
    pub depth: u32,
}

/// Per-session technique selector with anti-repetition memory.
#[derive(Debug)]
pub struct TechniqueSelector {
    catalog: TechniqueCatalog,
    recently_used: VecDeque<Technique>,
}

impl TechniqueSelector {
    pub fn new(catalog: TechniqueCatalog) -> Self {
        Self {
            catalog,
            recently_used: VecDeque::new(),
        }
    }

    pub fn catalog(&self) -> &TechniqueCatalog {
        &self.catalog
    }

    /// Select a scaffolding technique for the current turn.
    ///
    /// Disengaged input short-circuits to a random high-support technique
    /// without consulting the oracle; at or past the depth ceiling the
    /// transition sentinel is returned; otherwise scoring is delegated to
    /// the oracle and the judgment validated against the taxonomy.
    pub async fn select<O: Oracle + ?Sized>(
        &mut self,
        oracle: &O,
        ctx: &SelectionContext<'_>,
    ) -> Result<TechniqueSelection, ScaffoldError> {
        if is_disengaged(ctx.child_input) {
            tracing::debug!(input = ctx.child_input, "disengaged input, using high support");
            return Ok(self.high_support_fallback());
        }

        if ctx.depth >= ctx.max_depth {
            return Ok(self.transition());
        }

        let user_prompt = self.build_selection_prompt(ctx);
        let judgment = oracle
            .judge(include_str!("prompts/selection_system.txt"), &user_prompt)
            .await?;

        let support = match SupportLevel::from_str(&judgment.support_level) {
            Some(level @ (SupportLevel::High | SupportLevel::Low)) => level,
            _ => return Err(ScaffoldError::InvalidSupportLevel(judgment.support_level)),
        };

        let name = judgment.selected_technique.unwrap_or_default();
        let technique = Technique::from_name(&name)
            .filter(|t| self.eligible(support).contains(t))
            .ok_or(ScaffoldError::InvalidTechnique(name))?;

        self.remember(technique);

        tracing::debug!(
            technique = technique.name(),
            support = support.as_str(),
            score = judgment.score,
            "technique selected"
        );

        Ok(TechniqueSelection {
            technique,
            support,
            score: judgment.score,
            example: self.catalog.random_example(technique),
        })
    }

    /// The transition sentinel used to close an interaction.
    pub fn transition(&self) -> TechniqueSelection {
        TechniqueSelection {
            technique: Technique::Transition,
            support: SupportLevel::Low,
            score: TRANSITION_SCORE,
            example: self.catalog.random_example(Technique::Transition),
        }
    }

    /// Uniform random choice among the designated high-support trio.
    fn high_support_fallback(&self) -> TechniqueSelection {
        let technique = *Technique::HIGH_SUPPORT_FALLBACKS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Technique::Eliciting);

        TechniqueSelection {
            technique,
            support: SupportLevel::High,
            score: DISENGAGED_SCORE,
            example: self.catalog.random_example(technique),
        }
    }

    /// Techniques valid for ordinary selection at the given support
    /// level: the transition sentinel and the ending-specific techniques
    /// are never part of the ordinary pool.
    fn eligible(&self, support: SupportLevel) -> Vec<Technique> {
        Technique::ALL
            .iter()
            .copied()
            .filter(|t| *t != Technique::Transition && !t.is_ending())
            .filter(|t| self.catalog.info(*t).support == support)
            .collect()
    }

    /// Eligible techniques minus the recently used ones. When every
    /// technique of the level has been used recently, the memory resets
    /// and the full pool becomes available again.
    fn fresh(&mut self, support: SupportLevel) -> Vec<Technique> {
        let eligible = self.eligible(support);
        let fresh: Vec<Technique> = eligible
            .iter()
            .copied()
            .filter(|t| !self.recently_used.contains(t))
            .collect();

        if fresh.is_empty() {
            self.recently_used.clear();
            eligible
        } else {
            fresh
        }
    }

    fn remember(&mut self, technique: Technique) {
        self.recently_used.push_back(technique);
        while self.recently_used.len() > RECENT_MEMORY {
            self.recently_used.pop_front();
        }
    }

    fn build_selection_prompt(&mut self, ctx: &SelectionContext<'_>) -> String {
        let high_info = self.describe_pool(SupportLevel::High);
        let low_info = self.describe_pool(SupportLevel::Low);

        include_str!("prompts/selection_user.txt")
            .replace("{prompt}", ctx.prompt)
            .replace("{child_input}", ctx.child_input)
            .replace("{context_before}", ctx.context_before)
            .replace("{context_after}", ctx.context_after)
            .replace("{target_vocab}", ctx.vocab.unwrap_or("None provided"))
            .replace(
                "{vocab_role}",
                ctx.vocab_role.map(|r| r.as_str()).unwrap_or("Not specified"),
            )
            .replace("{high_support_info}", &high_info)
            .replace("{low_support_info}", &low_info)
    }

    fn describe_pool(&mut self, support: SupportLevel) -> String {
        let mut out = String::new();
        for technique in self.fresh(support) {
            out.push_str("- ");
            out.push_str(technique.name());
            out.push_str(": ");
            out.push_str(&self.catalog.info(technique).definition);
            out.push('\n');
        }
        out
    }
}

/// Phrases that signal the child has checked out of the exchange.
const DISENGAGED_PHRASES: [&str; 9] = [
    "i don't know",
    "idk",
    "dunno",
    "no idea",
    "i forgot",
    "i can't remember",
    "not sure",
    "i don't remember",
    "i don't recall",
];

/// Meaningful one-word answers that do not count as disengagement.
const MEANINGFUL_SINGLE_WORDS: [&str; 6] = ["yes", "no", "both", "maybe", "okay", "sure"];

/// Classify input as disengaged: empty/whitespace, an "I don't know"
/// style phrase, or a single word outside the meaningful whitelist.
pub fn is_disengaged(input: &str) -> bool {
    let clean = input.trim().to_lowercase();
    if clean.is_empty() {
        return true;
    }

    if DISENGAGED_PHRASES.iter().any(|p| clean.contains(p)) {
        return true;
    }

    let words: Vec<&str> = clean.split_whitespace().collect();
    words.len() <= 1 && !MEANINGFUL_SINGLE_WORDS.contains(&clean.as_str())
}
