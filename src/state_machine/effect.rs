//! Effects produced by state transitions

use crate::transcript::Turn;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a turn to the transcript
    AppendTurn { turn: Turn },

    /// Start delivering a question (runs to settlement, never cancelled)
    Deliver { text: String },

    /// Tell subscribers the state changed
    NotifyState,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::user(text),
        }
    }

    pub fn append(turn: Turn) -> Self {
        Effect::AppendTurn { turn }
    }

    pub fn deliver(text: impl Into<String>) -> Self {
        Effect::Deliver { text: text.into() }
    }
}
