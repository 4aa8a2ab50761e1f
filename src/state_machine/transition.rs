//! Pure state transition function

use super::{Effect, Event, SessionState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Add `NotifyState` only when the state actually changed
    fn notify_if_changed(self, old: &SessionState) -> Self {
        if self.new_state == *old {
            self
        } else {
            self.with_effect(Effect::NotifyState)
        }
    }
}

/// Events the state machine refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Assistant is still answering the previous message")]
    Busy,
    #[error("Invalid transition: delivery settled while nothing was in flight")]
    UnexpectedSettlement,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. A rejected
/// event leaves the caller's state untouched.
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        // Visibility never touches the transcript or an in-flight delivery
        Event::Open => Ok(TransitionResult::new(SessionState {
            open: true,
            ..*state
        })
        .notify_if_changed(state)),

        Event::Close => Ok(TransitionResult::new(SessionState {
            open: false,
            ..*state
        })
        .notify_if_changed(state)),

        Event::Toggle => Ok(TransitionResult::new(SessionState {
            open: !state.open,
            ..*state
        })
        .notify_if_changed(state)),

        Event::Submit { text } => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            if !state.can_submit() {
                return Err(TransitionError::Busy);
            }

            Ok(TransitionResult::new(SessionState {
                loading: true,
                ..*state
            })
            .with_effect(Effect::append_user(trimmed))
            .with_effect(Effect::NotifyState)
            .with_effect(Effect::deliver(trimmed)))
        }

        Event::DeliverySettled { turn } => {
            if !state.loading {
                return Err(TransitionError::UnexpectedSettlement);
            }

            Ok(TransitionResult::new(SessionState {
                loading: false,
                ..*state
            })
            .with_effect(Effect::append(turn))
            .with_effect(Effect::NotifyState))
        }

        Event::AdvanceStage => Ok(TransitionResult::new(SessionState {
            stage: state.stage.advance(),
            ..*state
        })
        .notify_if_changed(state)),
    }
}
