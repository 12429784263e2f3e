//! Session assembly: configuration, story loading, and the top-level
//! run loop over sections.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dialogue::{ChildIo, DialogueError, Orchestrator};
use crate::ending::{EndingArbiter, EndingMode};
use crate::generate::{ResponseGenerator, ResponseLength};
use crate::oracle::Oracle;
use crate::prestory::PreStory;
use crate::scaffold::{CatalogError, TechniqueCatalog, TechniqueSelector};
use crate::story::{parse_story, Section};
use crate::transcript::Transcript;
use crate::vocab::select_target_words;

pub const DEFAULT_CHILD_NAME: &str = "Caro";
pub const DEFAULT_MAX_DEPTH: u32 = 3;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("technique catalog failed validation: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Dialogue(#[from] DialogueError),

    #[error("could not read story file: {0}")]
    Io(#[from] std::io::Error),
}

/// Session settings, builder style.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub child_name: String,
    pub max_depth: u32,
    pub response_length: ResponseLength,
    /// Skip straight to the last prompt-bearing section.
    pub test_mode: bool,
    /// Run the pre-story warm-up before narration.
    pub warm_up: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            child_name: DEFAULT_CHILD_NAME.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            response_length: ResponseLength::Short,
            test_mode: false,
            warm_up: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child_name(mut self, name: impl Into<String>) -> Self {
        self.child_name = name.into();
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_response_length(mut self, length: ResponseLength) -> Self {
        self.response_length = length;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_warm_up(mut self, warm_up: bool) -> Self {
        self.warm_up = warm_up;
        self
    }
}

/// One complete read-through of a story with a child.
pub struct StorySession {
    story_content: String,
    sections: Vec<Section>,
    orchestrator: Orchestrator,
    prestory: PreStory,
    transcript: Transcript,
    config: SessionConfig,
}

impl StorySession {
    /// Build a session from story text. Fails only if the embedded
    /// technique catalog does not validate.
    pub fn new(story_content: impl Into<String>, config: SessionConfig) -> Result<Self, SessionError> {
        let story_content = story_content.into();
        let sections = parse_story(&story_content);
        let catalog = TechniqueCatalog::load()?;
        let orchestrator = Orchestrator::new(
            TechniqueSelector::new(catalog),
            EndingArbiter::new(),
            ResponseGenerator::new(config.child_name.clone(), config.response_length),
            config.max_depth,
        );
        let prestory = PreStory::new(config.child_name.clone());

        tracing::info!(
            sections = sections.len(),
            max_depth = config.max_depth,
            test_mode = config.test_mode,
            "session ready"
        );

        Ok(Self {
            story_content,
            sections,
            orchestrator,
            prestory,
            transcript: Transcript::new(),
            config,
        })
    }

    /// Build a session by reading the story from disk.
    pub async fn load(path: &Path, config: SessionConfig) -> Result<Self, SessionError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::new(content, config)
    }

    /// Run the session end to end: warm-up, then every section in order
    /// (or just the last prompt-bearing one in test mode).
    pub async fn run<O: Oracle + ?Sized, IO: ChildIo>(
        &mut self,
        oracle: &O,
        io: &mut IO,
    ) -> Result<(), SessionError> {
        if self.config.warm_up {
            let words = select_target_words(&self.story_content);
            self.prestory
                .run(oracle, io, &mut self.transcript, &words)
                .await?;
        }

        if self.config.test_mode {
            let last = self.sections.iter().rev().find(|s| s.prompt.is_some());
            if let Some(section) = last.cloned() {
                self.orchestrator
                    .run_section(oracle, io, &mut self.transcript, &section)
                    .await?;
            } else {
                tracing::warn!("test mode found no prompt-bearing section");
            }
            return Ok(());
        }

        let sections = self.sections.clone();
        for section in &sections {
            self.orchestrator
                .run_section(oracle, io, &mut self.transcript, section)
                .await?;
        }
        Ok(())
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The ending mode arbitrated this session, once a summary section
    /// has been reached.
    pub fn ending_mode(&self) -> Option<EndingMode> {
        self.orchestrator.arbiter().chosen()
    }

    /// Fix the ending mode ahead of arbitration, for scripted sessions.
    pub fn pin_ending_mode(&mut self, mode: EndingMode) {
        self.orchestrator.arbiter_mut().pin_mode(mode);
    }

    pub async fn save_transcript(&self, path: &Path) -> std::io::Result<()> {
        self.transcript.save(path).await
    }
}

/// The transcript path derived from a story path:
/// `story.txt` becomes `story_interaction_log.txt`.
pub fn transcript_path(story_path: &Path) -> PathBuf {
    let stem = story_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "story".to_string());
    story_path.with_file_name(format!("{stem}_interaction_log.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_path_derivation() {
        assert_eq!(
            transcript_path(Path::new("/tmp/adventure.txt")),
            PathBuf::from("/tmp/adventure_interaction_log.txt")
        );
        assert_eq!(
            transcript_path(Path::new("story.txt")),
            PathBuf::from("story_interaction_log.txt")
        );
    }

    #[test]
    fn test_config_defaults_and_builders() {
        let config = SessionConfig::new();
        assert_eq!(config.child_name, "Caro");
        assert_eq!(config.max_depth, 3);
        assert!(config.warm_up);
        assert!(!config.test_mode);

        let config = SessionConfig::new()
            .with_max_depth(0)
            .with_test_mode(true)
            .with_warm_up(false);
        assert_eq!(config.max_depth, 1, "depth floor is one turn");
        assert!(config.test_mode);
        assert!(!config.warm_up);
    }

    #[test]
    fn test_session_builds_from_story_text() {
        let session = StorySession::new(
            "Hello. <interaction vocab=\"ant\">Where is the ant?</interaction> Bye.",
            SessionConfig::new(),
        )
        .unwrap();
        assert_eq!(session.sections.len(), 2);
        assert!(session.ending_mode().is_none());
    }
}
