//! Session transcript: an ordered log of narration, dialogue, and
//! per-turn strategy annotations, rendered to a plain text file.

use std::path::Path;

use crate::scaffold::TechniqueSelection;
use crate::story::VocabRole;

/// Accumulates a session's log entries in order.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A narrated story block, tags preserved for later analysis.
    pub fn story(&mut self, text: &str) {
        self.entries.push(format!("Robot:\n{text}"));
    }

    /// A generated narrator turn.
    pub fn robot(&mut self, text: &str) {
        self.entries.push(format!("Robot: {}", text.trim()));
    }

    /// Out-of-story narrator speech (greetings, games, bridges).
    pub fn narrator(&mut self, text: &str) {
        self.entries.push(format!("Ella: {text}"));
    }

    /// The child's answer at the top of an interaction.
    pub fn child(&mut self, text: &str) {
        self.entries.push(format!("Child: {text}"));
    }

    /// The child's answer to a follow-up at the given depth.
    pub fn child_followup(&mut self, depth: u32, text: &str) {
        self.entries.push(format!("Child (Follow-up {depth}): {text}"));
    }

    /// The strategy annotation preceding each generated turn.
    pub fn strategy(
        &mut self,
        selection: &TechniqueSelection,
        vocab: Option<&str>,
        vocab_role: Option<VocabRole>,
        summary: bool,
    ) {
        let mut line = format!(
            "[Scaffolding Strategy: {} ({} support) - Complexity Score: {}/10]",
            selection.technique.name(),
            selection.support.as_str(),
            format_score(selection.score),
        );
        if let Some(word) = vocab {
            match vocab_role {
                Some(role) => {
                    line.push_str(&format!(" [Target Vocabulary: {} ({})]", word, role.as_str()))
                }
                None => line.push_str(&format!(" [Target Vocabulary: {word}]")),
            }
        }
        if summary {
            line.push_str(" [Special Tag: summary]");
        }
        self.entries.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the transcript: entries trimmed, speaker lines stripped of
    /// wrapping quotes, empty entries dropped, joined by single newlines.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let cleaned = clean_entry(entry.trim());
            if !cleaned.is_empty() {
                lines.push(cleaned);
            }
        }
        lines.join("\n")
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render()).await?;
        tracing::info!(path = %path.display(), "interaction log saved");
        Ok(())
    }
}

fn clean_entry(entry: &str) -> String {
    for speaker in ["Robot: ", "Child: "] {
        if let Some(rest) = entry.strip_prefix(speaker) {
            if let Some(inner) = rest.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                return format!("{speaker}{inner}");
            }
        }
    }
    entry.to_string()
}

/// Scores render as integers when whole, one number otherwise.
fn format_score(score: f32) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i32)
    } else {
        format!("{score}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::{SupportLevel, Technique};

    fn selection(score: f32) -> TechniqueSelection {
        TechniqueSelection {
            technique: Technique::Eliciting,
            support: SupportLevel::High,
            score,
            example: String::new(),
        }
    }

    #[test]
    fn test_strategy_line_formats() {
        let mut transcript = Transcript::new();
        transcript.strategy(&selection(3.0), Some("river"), Some(VocabRole::New), false);
        assert_eq!(
            transcript.entries[0],
            "[Scaffolding Strategy: eliciting (high support) - Complexity Score: 3/10] \
             [Target Vocabulary: river (new)]"
        );

        let mut transcript = Transcript::new();
        transcript.strategy(&selection(6.5), None, None, true);
        assert_eq!(
            transcript.entries[0],
            "[Scaffolding Strategy: eliciting (high support) - Complexity Score: 6.5/10] \
             [Special Tag: summary]"
        );

        let mut transcript = Transcript::new();
        transcript.strategy(&selection(0.0), Some("brave"), None, false);
        assert_eq!(
            transcript.entries[0],
            "[Scaffolding Strategy: eliciting (high support) - Complexity Score: 0/10] \
             [Target Vocabulary: brave]"
        );
    }

    #[test]
    fn test_render_strips_speaker_quotes_and_empty_entries() {
        let mut transcript = Transcript::new();
        transcript.robot("\"Hello there!\"");
        transcript.child("\"hi\"");
        transcript.entries.push("   ".to_string());
        transcript.narrator("\"quoted but kept\"");

        assert_eq!(
            transcript.render(),
            "Robot: Hello there!\nChild: hi\nElla: \"quoted but kept\""
        );
    }

    #[test]
    fn test_child_followup_labels_depth() {
        let mut transcript = Transcript::new();
        transcript.child_followup(2, "the butterfly");
        assert_eq!(transcript.entries[0], "Child (Follow-up 2): the butterfly");
    }

    #[test]
    fn test_story_block_keeps_tags() {
        let mut transcript = Transcript::new();
        transcript.story("Once upon a time. <interaction>What next?</interaction>");
        assert!(transcript.render().starts_with("Robot:\nOnce upon a time."));
    }
}
