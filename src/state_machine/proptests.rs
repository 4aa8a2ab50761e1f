//! Property-based tests for the session state machine
//!
//! Arbitrary event sequences are replayed against a simulated transcript;
//! the invariants below must hold after every step.

use super::*;
use crate::transcript::{Sender, Transcript, Turn};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z?! ]{1,30}",
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Open),
        Just(Event::Close),
        Just(Event::Toggle),
        Just(Event::AdvanceStage),
        arb_text().prop_map(|text| Event::Submit { text }),
        "[a-zA-Z ]{0,30}".prop_map(|text| Event::DeliverySettled {
            turn: Turn::assistant(text)
        }),
    ]
}

/// Apply effects the way the runtime would, counting deliveries started
fn apply(transcript: &mut Transcript, effects: &[Effect]) -> usize {
    let mut deliveries = 0;
    for effect in effects {
        match effect {
            Effect::AppendTurn { turn } => transcript.append(turn.clone()),
            Effect::Deliver { .. } => deliveries += 1,
            Effect::NotifyState => {}
        }
    }
    deliveries
}

proptest! {
    // Invariant 1: loading is true exactly when the last turn is an
    // unanswered user turn, and turns alternate user/assistant
    #[test]
    fn prop_loading_matches_transcript(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut state = SessionState::default();
        let mut transcript = Transcript::new();

        for event in events {
            if let Ok(result) = transition(&state, event) {
                apply(&mut transcript, &result.effects);
                state = result.new_state;
            }

            let last_is_user = transcript.last().is_some_and(Turn::is_user);
            prop_assert_eq!(state.loading, last_is_user);

            for (i, turn) in transcript.all().iter().enumerate() {
                let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
                prop_assert_eq!(turn.sender, expected);
            }
        }
    }

    // Invariant 2: at most one delivery in flight
    #[test]
    fn prop_single_delivery_in_flight(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut state = SessionState::default();
        let mut transcript = Transcript::new();
        let mut in_flight = 0usize;

        for event in events {
            let settles = matches!(event, Event::DeliverySettled { .. });
            if let Ok(result) = transition(&state, event) {
                in_flight += apply(&mut transcript, &result.effects);
                if settles {
                    in_flight -= 1;
                }
                state = result.new_state;
            }
            prop_assert!(in_flight <= 1);
            prop_assert_eq!(in_flight == 1, state.loading);
        }
    }

    // Invariant 3: rejected submissions change nothing
    #[test]
    fn prop_rejected_submit_is_noop(
        open in any::<bool>(),
        loading in any::<bool>(),
        text in arb_text(),
    ) {
        let state = SessionState { open, loading, ..SessionState::default() };
        match transition(&state, Event::Submit { text: text.clone() }) {
            Ok(result) => {
                prop_assert!(!loading);
                prop_assert!(!text.trim().is_empty());
                prop_assert!(result.new_state.loading);
                prop_assert_eq!(result.new_state.open, open);
            }
            Err(TransitionError::EmptyInput) => prop_assert!(text.trim().is_empty()),
            Err(TransitionError::Busy) => prop_assert!(loading),
            Err(TransitionError::UnexpectedSettlement) => prop_assert!(false, "not a settlement"),
        }
    }

    // Invariant 4: visibility never touches loading; stage never goes back
    #[test]
    fn prop_visibility_and_stage(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut state = SessionState::default();

        for event in events {
            let is_visibility = matches!(event, Event::Open | Event::Close | Event::Toggle);
            if let Ok(result) = transition(&state, event) {
                if is_visibility {
                    prop_assert_eq!(result.new_state.loading, state.loading);
                    prop_assert!(result.effects.iter().all(|e| *e == Effect::NotifyState));
                }
                prop_assert!(result.new_state.stage >= state.stage);
                state = result.new_state;
            }
        }
    }
}

/// N sequential submissions, each settled before the next, give 2N
/// alternating turns
#[test]
fn test_sequential_submissions_alternate() {
    let mut state = SessionState::default();
    let mut transcript = Transcript::new();

    for i in 0..10 {
        let result = transition(&state, Event::submit(format!("question {i}"))).unwrap();
        assert_eq!(apply(&mut transcript, &result.effects), 1);
        state = result.new_state;

        let result = transition(
            &state,
            Event::DeliverySettled {
                turn: Turn::assistant(format!("answer {i}")),
            },
        )
        .unwrap();
        apply(&mut transcript, &result.effects);
        state = result.new_state;
    }

    assert_eq!(transcript.len(), 20);
    assert!(!state.loading);
    for (i, turn) in transcript.all().iter().enumerate() {
        let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
        assert_eq!(turn.sender, expected);
    }
}
