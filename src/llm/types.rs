//! Common types for LLM interactions

/// LLM request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
}

impl LlmRequest {
    /// A request carrying one user message and no prior history
    pub fn single_turn(system: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![LlmMessage::user(user_text)],
        }
    }
}

/// User message in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub text: String,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// LLM response
///
/// `text` is `None` when the response arrived but carried no usable answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub usage: Usage,
}

#[cfg(test)]
impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            usage: Usage::default(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
