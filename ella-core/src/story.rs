//! Story segmentation.
//!
//! Turns raw tagged story text into an ordered sequence of [`Section`]s,
//! one per interaction marker plus an optional trailing narrative
//! section. Markers look like:
//!
//! ```text
//! <interaction vocab="river" role="new">What do you see?</interaction>
//! ```
//!
//! `vocab="summary"` is structural: it marks the story's closing
//! interaction rather than naming a vocabulary target. Malformed markers
//! are left in place as plain narrative on purpose.

use once_cell::sync::Lazy;
use regex::Regex;

static INTERACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<interaction(?: vocab="([^"]*)")?(?:\s+role="([^"]*)")?>([^<]*)</interaction>"#)
        .expect("interaction pattern is valid")
});

static ANY_INTERACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<interaction.*?</interaction>").expect("tag-strip pattern is valid")
});

/// Role of a vocabulary word within the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabRole {
    New,
    Easy,
    Review,
}

impl VocabRole {
    /// Parse a role attribute. Unknown values are ignored, matching the
    /// lenient treatment of malformed markers.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "easy" => Some(Self::Easy),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Easy => "easy",
            Self::Review => "review",
        }
    }
}

/// Structural tags that are not vocabulary targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTag {
    /// Marks the story's closing interaction sequence.
    Summary,
}

/// One addressable slice of story text, with or without an embedded
/// interaction prompt. Built once at load time and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Section {
    /// Narrative since the previous marker, with the prompt re-wrapped in
    /// a minimal marker so attribute syntax never reaches the child.
    pub text: String,
    /// The question posed to the child, absent for plain narrative.
    pub prompt: Option<String>,
    /// Target vocabulary word, absent for structural tags.
    pub vocab: Option<String>,
    pub vocab_role: Option<VocabRole>,
    pub special_tag: Option<SpecialTag>,
    /// Full story text preceding this interaction.
    pub context_before: String,
    /// Full story text following this interaction.
    pub context_after: String,
}

impl Section {
    /// Whether this section carries the closing "summary" tag.
    pub fn is_summary(&self) -> bool {
        self.special_tag == Some(SpecialTag::Summary)
    }
}

/// Parse story text into an ordered sequence of sections.
///
/// Every valid marker becomes exactly one prompt-bearing section; any
/// trailing narrative after the last marker becomes one final prompt-less
/// section. With no markers at all, the entire text is a single
/// prompt-less section.
pub fn parse_story(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut last_end = 0;

    for caps in INTERACTION.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };

        let vocab_attr = caps.get(1).map(|m| m.as_str());
        let role_attr = caps.get(2).map(|m| m.as_str());
        let prompt = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();

        let (vocab, special_tag) = match vocab_attr {
            Some("summary") => (None, Some(SpecialTag::Summary)),
            Some("") | None => (None, None),
            Some(word) => (Some(word.to_string()), None),
        };

        let text_before = &content[last_end..whole.start()];
        sections.push(Section {
            text: format!("{text_before}<interaction>{prompt}</interaction>"),
            prompt: Some(prompt.to_string()),
            vocab,
            vocab_role: role_attr.and_then(VocabRole::from_attr),
            special_tag,
            context_before: content[..whole.start()].to_string(),
            context_after: content[whole.end()..].to_string(),
        });

        last_end = whole.end();
    }

    if sections.is_empty() {
        return vec![Section {
            text: content.to_string(),
            prompt: None,
            vocab: None,
            vocab_role: None,
            special_tag: None,
            context_before: String::new(),
            context_after: String::new(),
        }];
    }

    if last_end < content.len() {
        sections.push(Section {
            text: content[last_end..].to_string(),
            prompt: None,
            vocab: None,
            vocab_role: None,
            special_tag: None,
            context_before: String::new(),
            context_after: String::new(),
        });
    }

    sections
}

/// Extract the first three distinct non-"summary" vocabulary words from
/// the story, in order of appearance.
///
/// Returns `None` when fewer than three are found, signaling that the
/// caller should fall back to the built-in word source instead of working
/// from a partial set.
pub fn extract_story_vocabs(content: &str) -> Option<Vec<String>> {
    let mut words: Vec<String> = Vec::new();

    for caps in INTERACTION.captures_iter(content) {
        if let Some(vocab) = caps.get(1).map(|m| m.as_str()) {
            if !vocab.is_empty() && vocab != "summary" && !words.iter().any(|w| w == vocab) {
                words.push(vocab.to_string());
            }
        }
        if words.len() == 3 {
            return Some(words);
        }
    }

    None
}

/// Remove all interaction markers for child-facing display.
pub fn strip_interaction_tags(text: &str) -> String {
    ANY_INTERACTION.replace_all(text, "").into_owned()
}
