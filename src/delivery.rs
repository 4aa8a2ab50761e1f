//! Chat delivery
//!
//! Turns a user question into an assistant turn by calling the model with
//! bounded exponential backoff. Every outcome, including failure, settles to
//! a [`Turn`].

mod engine;
mod retry;

pub use engine::DeliveryEngine;
pub use retry::RetryPolicy;

use crate::transcript::Turn;
use thiserror::Error;

pub const CONFIGURATION_MESSAGE: &str = "Configuration Error: Cannot find the required Google AI API key. Please check the server environment configuration.";
pub const RETRY_EXHAUSTED_MESSAGE: &str = "Oops! The AI service encountered an error after multiple retries. Please check your API key and connection, then try again.";
pub const UNCLEAR_RESPONSE_MESSAGE: &str =
    "I apologize, I received an unclear response from the server.";

/// Ways a delivery can end without an answer
///
/// The display text of each variant is exactly what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// No credential configured; nothing was sent
    #[error("{}", CONFIGURATION_MESSAGE)]
    Configuration,
    /// Every attempt failed at the transport or status level
    #[error("{}", RETRY_EXHAUSTED_MESSAGE)]
    Transport { attempts: u32 },
    /// A response arrived but carried no usable text; not retried
    #[error("{}", UNCLEAR_RESPONSE_MESSAGE)]
    MalformedResponse,
}

/// How a delivery ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Answered { text: String, attempts: u32 },
    Failed(DeliveryFailure),
}

impl Settlement {
    pub fn into_turn(self) -> Turn {
        match self {
            Settlement::Answered { text, .. } => Turn::assistant(text),
            Settlement::Failed(failure) => Turn::assistant(failure.to_string()),
        }
    }
}
