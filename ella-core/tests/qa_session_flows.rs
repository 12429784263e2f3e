//! QA tests for whole-session flows using scripted collaborators:
//! - A regular vocabulary interaction closed by the transition turn
//! - A full closing sequence playing out its turn budget
//! - One ending mode held across every summary section

use ella_core::testing::{assert_transcript_contains, MockReply, SessionHarness};
use ella_core::{EndingMode, SessionConfig};

const VOCAB_STORY: &str = "Once upon a time a duck lived by a river. \
<interaction vocab=\"river\" role=\"new\">What do you see near the river?</interaction> \
The duck waddled home happily. The end.";

const ENDING_STORY: &str = "Sparky found a treasure box in the garden. \
Everyone celebrated together. \
<interaction vocab=\"summary\">What was your favorite part of the story?</interaction> \
Good night.";

#[tokio::test]
async fn test_vocab_interaction_closes_with_transition_at_depth_two() {
    let mut harness = SessionHarness::new(VOCAB_STORY)
        .with_config(SessionConfig::new().with_warm_up(false).with_max_depth(2))
        // Turn 1: selection judgment, then the generated follow-up.
        .expect_oracle(MockReply::judgment(6.0, "low", "predicting"))
        .expect_oracle(MockReply::text(
            "Great thinking! What do you think the duck will find next?",
        ))
        // Turn 2 hits the depth ceiling: transition, generation only.
        .expect_oracle(MockReply::text(
            "What a wonderful idea! Let's see what happens next in our story.",
        ))
        .child_says("I see a big blue river")
        .child_says("maybe a shiny fish");

    let (transcript, ending_mode) = harness.run().await.unwrap();

    assert!(ending_mode.is_none(), "no summary section was reached");
    assert_transcript_contains(
        &transcript,
        "[Scaffolding Strategy: predicting (low support) - Complexity Score: 6/10] \
         [Target Vocabulary: river (new)]",
    );
    assert_transcript_contains(
        &transcript,
        "[Scaffolding Strategy: transition (low support) - Complexity Score: 8/10]",
    );
    assert_transcript_contains(&transcript, "Child: I see a big blue river");
    assert_transcript_contains(&transcript, "Child: maybe a shiny fish");

    // Both the interaction section and the trailing narrative were told,
    // with the section's question spoken after the narration.
    assert!(harness.child.heard_containing("Once upon a time a duck"));
    assert!(harness.child.heard_containing("What do you see near the river?"));
    assert!(harness.child.heard_containing("The duck waddled home happily."));
    assert_eq!(harness.child.labels, vec!["Child", "Child"]);
    assert_eq!(harness.oracle.remaining(), 0);
}

#[tokio::test]
async fn test_alternative_ending_plays_full_budget_and_closes() {
    let mut harness = SessionHarness::new(ENDING_STORY)
        .with_ending_mode(EndingMode::AlternativeEnding)
        // Five turns; each consumes a rubric score then a generation.
        .expect_oracle(MockReply::score(7.0))
        .expect_oracle(MockReply::text("How else could the story have ended?"))
        .expect_oracle(MockReply::score(5.0))
        .expect_oracle(MockReply::text(
            "That is so creative! Which character made it happen?",
        ))
        .expect_oracle(MockReply::score(8.0))
        .expect_oracle(MockReply::text(
            "Ooh! Which place in the garden did they go next?",
        ))
        .expect_oracle(MockReply::score(6.0))
        .expect_oracle(MockReply::text(
            "Lovely! Which friend helped Sparky at the very end?",
        ))
        .expect_oracle(MockReply::score(9.0))
        .expect_oracle(MockReply::text(
            "What a fantastic job you did today, Caro! Your imagination made \
             our story come alive. See you tomorrow for more fun!",
        ))
        .child_says("the box stayed closed forever")
        .child_says("Sparky opened it alone")
        .child_says("they flew to the garden gate")
        .child_says("the butterfly helped him")
        .child_says("they all shared the treasure");

    let (transcript, ending_mode) = harness.run().await.unwrap();

    assert_eq!(ending_mode, Some(EndingMode::AlternativeEnding));

    let summary_turns = transcript.matches("[Special Tag: summary]").count();
    assert_eq!(summary_turns, 5, "budget is five turns, initial included");
    assert_transcript_contains(
        &transcript,
        "[Scaffolding Strategy: alternative_ending (low support) - Complexity Score: 7/10]",
    );

    // The final turn is a personalized closing statement, never a question.
    let last_robot = transcript
        .lines()
        .filter(|l| l.starts_with("Robot: "))
        .last()
        .unwrap();
    assert!(!last_robot.trim_end().ends_with('?'));
    assert!(last_robot.contains("Caro"));
    assert!(last_robot.to_lowercase().contains("see you tomorrow"));

    // Follow-up labels show closing-sequence progress.
    assert_eq!(
        harness.child.labels,
        vec![
            "Child",
            "Child",
            "Child [Follow-up question 2/4]",
            "Child [Follow-up question 3/4]",
            "Child [Follow-up question 4/4] (Final follow-up)",
        ]
    );
    assert_eq!(harness.oracle.remaining(), 0);
}

#[tokio::test]
async fn test_non_final_closing_turn_is_patched_into_a_question() {
    let mut harness = SessionHarness::new(ENDING_STORY)
        .with_ending_mode(EndingMode::SummaryClosure)
        .expect_oracle(MockReply::score(4.0))
        // A statement on a non-final closing turn must not end the
        // exchange early.
        .expect_oracle(MockReply::text("That sounds like a lovely moment."))
        // Turn 2 onward: keep scripted turns ending without questions so
        // every turn exercises the patch until the budget runs out.
        .expect_oracle(MockReply::score(4.0))
        .expect_oracle(MockReply::text("The garden part was my favorite too."))
        .expect_oracle(MockReply::score(4.0))
        .expect_oracle(MockReply::text("Sparky was very brave there."))
        .expect_oracle(MockReply::score(4.0))
        .expect_oracle(MockReply::text("The treasure made everyone smile."))
        .expect_oracle(MockReply::score(4.0))
        .expect_oracle(MockReply::text(
            "Thank you for sharing your wonderful ideas with me today, Caro! \
             See you next time!",
        ))
        .child_says("the garden part")
        .child_says("the treasure")
        .child_says("Sparky")
        .child_says("the celebration")
        .child_says("all of it");

    let (transcript, _) = harness.run().await.unwrap();

    let patched = transcript
        .matches("What else did you notice in our adventure?")
        .count();
    assert_eq!(patched, 4, "every non-final statement turn is patched");
    assert_eq!(transcript.matches("[Special Tag: summary]").count(), 5);
}

#[tokio::test]
async fn test_ending_mode_is_fixed_across_summary_sections() {
    let story = "Part one of the tale. \
<interaction vocab=\"summary\">Tell me the story in your own words.</interaction> \
Part two of the tale. \
<interaction vocab=\"summary\">Tell me the whole story once more.</interaction> \
The end.";

    let mut harness = SessionHarness::new(story).with_ending_mode(EndingMode::SummaryClosure);
    // Two summary sections, budget five turns each: a rubric score and a
    // generated question per turn (statements on the final turns).
    for section in 0..2 {
        for turn in 0..5 {
            harness.oracle.queue(MockReply::score(6.0));
            let reply = if turn == 4 {
                "Good job, Caro! You did such a great job with our story! \
                 I can't wait to see you tomorrow for another adventure!"
                    .to_string()
            } else {
                format!("Lovely! Which part of section {section} did you enjoy, turn {turn}?")
            };
            harness.oracle.queue(MockReply::text(reply));
        }
    }
    for _ in 0..10 {
        harness.child.queue_answer("the sparkly treasure part");
    }

    let (transcript, ending_mode) = harness.run().await.unwrap();

    assert_eq!(ending_mode, Some(EndingMode::SummaryClosure));
    // Every closing turn in both sections carries the same technique.
    assert_eq!(
        transcript
            .matches("[Scaffolding Strategy: response_summary_closure")
            .count(),
        10
    );
    assert_eq!(transcript.matches("[Special Tag: summary]").count(), 10);
    assert_eq!(harness.oracle.remaining(), 0);
}
