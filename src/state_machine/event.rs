//! Events that can occur in a session

use crate::transcript::Turn;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Widget visibility
    Open,
    Close,
    Toggle,

    // User events
    Submit { text: String },

    // Delivery events
    DeliverySettled { turn: Turn },

    // Page sequencing
    AdvanceStage,
}

impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::Submit { text: text.into() }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::Open => "open",
            Event::Close => "close",
            Event::Toggle => "toggle",
            Event::Submit { .. } => "submit",
            Event::DeliverySettled { .. } => "delivery_settled",
            Event::AdvanceStage => "advance_stage",
        }
    }
}
