//! Target-word selection for the pre-story warm-up.
//!
//! Words come from the story's own markers when it carries at least
//! three; otherwise a set is drawn from the built-in pools, arranged
//! easy / new / review.

use rand::seq::SliceRandom;

use crate::story::extract_story_vocabs;

/// Easy and review words, developmentally familiar.
const SET_A: [&str; 60] = [
    "ant", "aunt", "baseball", "bend", "boy", "bunch", "candle", "cent", "chirp", "coach",
    "cow", "cuddle", "delicious", "divide", "duck", "empty", "far", "flash", "fresh", "garden",
    "glue", "grumble", "healthy", "hole", "ice", "jeans", "kind", "leaf", "lock", "magnet",
    "milk", "mother", "near", "nose", "pain", "path", "piano", "plastic", "pour", "quack",
    "raw", "rink", "rude", "scissors", "ship", "skunk", "sneeze", "sparkle", "stair", "strong",
    "tall", "thirsty", "town", "tumble", "usual", "waddle", "week", "winter", "xylophone", "zoo",
];

/// New words, introduced for the first time.
const SET_B: [&str; 30] = [
    "alligator", "ambulance", "breakfast", "commercial", "disguise", "earthquake",
    "emergency", "freckle", "frisky", "glitter", "hibernate", "hurricane",
    "invisible", "kindergarten", "lifeguard", "meteor", "nickname", "opposite",
    "permission", "pollution", "quarrel", "restaurant", "sentence", "treasure",
    "umbrella", "valentine", "vocabulary", "whisper", "yesterday", "zigzag",
];

/// Last-resort word set when sampling is somehow impossible.
const MINIMAL_SET: [&str; 3] = ["story", "adventure", "fun"];

/// Pick the three magic words for a session: the story's own vocabulary
/// when it provides a full set, a sampled easy/new/review triple
/// otherwise.
pub fn select_target_words(story_content: &str) -> Vec<String> {
    if let Some(words) = extract_story_vocabs(story_content) {
        tracing::debug!(?words, "target words taken from the story");
        return words;
    }

    let mut rng = rand::thread_rng();
    let mut familiar: Vec<&str> = SET_A.choose_multiple(&mut rng, 2).copied().collect();
    let Some(new_word) = SET_B.choose(&mut rng) else {
        return MINIMAL_SET.iter().map(|w| w.to_string()).collect();
    };
    let Some(review) = familiar.pop() else {
        return MINIMAL_SET.iter().map(|w| w.to_string()).collect();
    };
    let Some(easy) = familiar.pop() else {
        return MINIMAL_SET.iter().map(|w| w.to_string()).collect();
    };

    let words = vec![easy.to_string(), new_word.to_string(), review.to_string()];
    tracing::debug!(?words, "target words sampled from built-in pools");
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_words_take_priority() {
        let story = "<interaction vocab=\"ant\">a</interaction>\
<interaction vocab=\"bee\">b</interaction>\
<interaction vocab=\"cow\">c</interaction>";
        assert_eq!(select_target_words(story), vec!["ant", "bee", "cow"]);
    }

    #[test]
    fn test_fallback_samples_easy_new_review() {
        // Two story words is not a full set; the pools take over.
        let story = "<interaction vocab=\"ant\">a</interaction>\
<interaction vocab=\"bee\">b</interaction>";
        let words = select_target_words(story);
        assert_eq!(words.len(), 3);
        assert!(SET_A.contains(&words[0].as_str()));
        assert!(SET_B.contains(&words[1].as_str()));
        assert!(SET_A.contains(&words[2].as_str()));
        assert_ne!(words[0], words[2]);
    }

    #[test]
    fn test_summary_marker_never_becomes_a_word() {
        let story = "<interaction vocab=\"summary\">end?</interaction>";
        let words = select_target_words(story);
        assert!(!words.contains(&"summary".to_string()));
    }
}
