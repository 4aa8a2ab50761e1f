//! Conversation transcript
//!
//! An append-only, insertion-ordered sequence of turns. Turns are never
//! edited or removed; the whole transcript goes away with its session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    #[cfg(test)]
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Ordered transcript of turns
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript with an opening assistant turn
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.append(Turn::assistant(greeting));
        transcript
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}
