//! Interactive story engine with adaptive scaffolding dialogue.
//!
//! This crate provides:
//! - Story segmentation over `<interaction>` markers
//! - A scaffolding technique taxonomy with per-turn selection
//! - Ending-mode arbitration for a story's closing sequence
//! - Turn-level response generation through a generative oracle
//! - Session transcripts with strategy annotations
//!
//! # Quick Start
//!
//! ```ignore
//! use ella_core::{SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let oracle = openai::OpenAi::from_env()?;
//!     let config = SessionConfig::new().with_max_depth(3);
//!
//!     let mut session = StorySession::load("story.txt".as_ref(), config).await?;
//!     session.run(&oracle, &mut my_child_io).await?;
//!     session.save_transcript("story_interaction_log.txt".as_ref()).await?;
//!     Ok(())
//! }
//! ```

pub mod dialogue;
pub mod ending;
pub mod generate;
pub mod oracle;
pub mod prestory;
pub mod question;
pub mod scaffold;
pub mod session;
pub mod story;
pub mod testing;
pub mod transcript;
pub mod vocab;

// Primary public API
pub use dialogue::{ChildIo, DialogueError, Orchestrator};
pub use ending::{EndingArbiter, EndingMode};
pub use generate::{ResponseGenerator, ResponseLength};
pub use oracle::{Judgment, Oracle, OracleError};
pub use scaffold::{SupportLevel, Technique, TechniqueSelection, TechniqueSelector};
pub use session::{transcript_path, SessionConfig, SessionError, StorySession};
pub use story::{parse_story, Section, SpecialTag, VocabRole};
pub use testing::{MockOracle, MockReply, ScriptedChild, SessionHarness};
pub use transcript::Transcript;
