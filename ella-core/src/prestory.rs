//! Pre-story warm-up: check-in, adventure theme choice, the magic-word
//! game, and the bridge into the story proper.
//!
//! Everything here is best-effort: the two oracle flourishes (theme
//! acknowledgment, final praise) fall back to canned lines, so a flaky
//! connection never stalls the warm-up.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::dialogue::{ChildIo, DialogueError};
use crate::oracle::Oracle;
use crate::transcript::Transcript;

const CHECKINS: [&str; 13] = [
    "Hi {name}! I painted a picture of a friendly dragon. Did you draw or color anything today?",
    "Hello {name}, I was a superhero saving kittens. Who did you help or play with today?",
    "Hey {name}! I explored a secret cave of sparkly crystals. Did you discover something new today?",
    "Good morning, {name}! I counted five jumping frogs at the pond. What numbers did you notice today?",
    "Hi {name}! I met a robot friend at the playground. Who did you meet or play with today?",
    "Hello {name}, I floated a paper boat on a little stream. Did you play with any toys outside today?",
    "Hey {name}! I learned a new animal sound from a parrot. What new sound or word did you learn today?",
    "Good day, {name}! I chased butterflies in a sunny meadow. What made you feel happy or free today?",
    "Hi {name}! I visited a snowy mountain in my magical world. Did you go on any adventures today?",
    "Hello {name}, I found a shiny seashell at the beach. Did you collect or find anything neat today?",
    "Hey {name}! I planted a magical seed and watched it grow. What did you help grow or take care of today?",
    "Good morning, {name}! I flew over a city in a paper airplane. What fun did you have with friends today?",
    "Hi {name}! I spotted a bright rainbow after a storm. What beautiful colors did you see today?",
];

const ADVENTURE_THEMES: [&str; 4] = [
    "A famous landmark on earth (like the Eiffel Tower or Great Wall of China)",
    "A well-known celestial body (like the Moon or Mars)",
    "An everyday location (like a farm or playground)",
    "A natural biome (like a rainforest or desert)",
];

const RETRY_TEMPLATES: [&str; 3] = [
    "Almost! Let's try that magic word one more time!",
    "So close! Can you say it with me again?",
    "Good try! One more time, nice and clear!",
];

const ENCOURAGEMENTS: [&str; 4] = [
    "Perfect! That's exactly how I remember it!",
    "Wonderful! You said it beautifully!",
    "Yes! That's the magic word!",
    "Great job! You're so good at this!",
];

const STORY_BRIDGES: [&str; 3] = [
    "Let me tell you what happened on my journey!",
    "Now, let me tell you my magical story!",
    "Here comes my favorite adventure, just for you!",
];

const ORDINALS: [&str; 3] = ["first", "second", "third"];

/// Runs the warm-up exchange before the first story section.
#[derive(Debug, Clone)]
pub struct PreStory {
    child_name: String,
}

impl PreStory {
    pub fn new(child_name: impl Into<String>) -> Self {
        Self {
            child_name: child_name.into(),
        }
    }

    /// Run the full warm-up. Returns the adventure theme the child chose.
    pub async fn run<O: Oracle + ?Sized, IO: ChildIo>(
        &self,
        oracle: &O,
        io: &mut IO,
        transcript: &mut Transcript,
        words: &[String],
    ) -> Result<String, DialogueError> {
        // 1. Check-in.
        let checkin = pick(&CHECKINS).replace("{name}", &self.child_name);
        self.say(io, transcript, &checkin).await?;
        let answer = self.hear(io, transcript).await?;

        // 2. Acknowledgment and adventure intro.
        let ack = format!(
            "That's wonderful, {}! I love hearing about your day and your story \
             about '{}'. You know, I absolutely love adventures too! Now, let me \
             share some of my past adventures with you. You can choose which one \
             you like!",
            self.child_name,
            answer.trim()
        );
        self.say(io, transcript, &ack).await?;

        // 3. Theme choice: two options, numbered, re-prompt until valid.
        let mut rng = rand::thread_rng();
        let first = rng.gen_range(0..ADVENTURE_THEMES.len());
        let mut second = rng.gen_range(0..ADVENTURE_THEMES.len() - 1);
        if second >= first {
            second += 1;
        }
        let themes = [ADVENTURE_THEMES[first], ADVENTURE_THEMES[second]];
        drop(rng);

        for (i, theme) in themes.iter().enumerate() {
            io.narrate(&format!("{}. {theme}", i + 1)).await?;
        }
        let theme = loop {
            let choice = io.listen(&self.child_name).await?;
            match choice.trim() {
                "1" => break themes[0],
                "2" => break themes[1],
                _ => self.say(io, transcript, "Oops! Please choose 1 or 2!").await?,
            }
        };
        transcript.child(theme);

        // 4. Magic-word game.
        self.say(io, transcript, "Let's say the three special magic words together!")
            .await?;
        for (i, word) in words.iter().take(3).enumerate() {
            let ordinal = ORDINALS[i];
            let ask = format!("The {ordinal} magic word is '{word}'. Can you say '{word}'?");
            self.say(io, transcript, &ask).await?;
            let reply = self.hear(io, transcript).await?;

            if !reply.trim().eq_ignore_ascii_case(word) {
                self.say(io, transcript, pick(&RETRY_TEMPLATES)).await?;
                self.hear(io, transcript).await?;
            }

            if i + 1 < words.len().min(3) {
                self.say(io, transcript, pick(&ENCOURAGEMENTS)).await?;
            }
        }

        // Final praise, oracle-flavored when possible.
        let praise_request = format!(
            "The child {} just said all three magic words: {}. Praise them briefly.",
            self.child_name,
            words.join(", ")
        );
        let praise = match oracle
            .generate(include_str!("prompts/prestory_system.txt"), &praise_request, 40, 0.8)
            .await
        {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%error, "praise generation failed, using canned line");
                format!("You said all three magic words, {}! Amazing!", self.child_name)
            }
        };
        self.say(io, transcript, &praise).await?;

        // 5. Story bridge.
        self.say(io, transcript, pick(&STORY_BRIDGES)).await?;

        Ok(theme.to_string())
    }

    async fn say<IO: ChildIo>(
        &self,
        io: &mut IO,
        transcript: &mut Transcript,
        text: &str,
    ) -> Result<(), DialogueError> {
        io.narrate(text).await?;
        transcript.narrator(text);
        Ok(())
    }

    async fn hear<IO: ChildIo>(
        &self,
        io: &mut IO,
        transcript: &mut Transcript,
    ) -> Result<String, DialogueError> {
        let reply = io.listen(&self.child_name).await?;
        transcript.child(&reply);
        Ok(reply)
    }
}

fn pick<'a>(options: &'a [&'a str]) -> &'a str {
    options
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
}
