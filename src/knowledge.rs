//! System context construction
//!
//! Combines the assistant persona, its answering rules and the portfolio
//! knowledge document into the single instruction text sent with every
//! request. Built once at start-up and shared read-only afterwards.

use std::fmt::Write;
use std::path::Path;

/// Knowledge document compiled into the binary
const DEFAULT_KNOWLEDGE: &str = include_str!("../assets/knowledge.md");

pub const DEFAULT_OWNER_NAME: &str = "Jonah Kimani";

/// Immutable persona + rules + knowledge text
#[derive(Debug, Clone)]
pub struct SystemContext {
    owner_name: String,
    text: String,
}

impl SystemContext {
    pub fn new(owner_name: impl Into<String>, knowledge: &str) -> Self {
        let owner_name = owner_name.into();
        let text = build_instruction(&owner_name, knowledge);
        Self { owner_name, text }
    }

    /// Context for the built-in knowledge document
    #[cfg(test)]
    pub fn portfolio_default() -> Self {
        Self::new(DEFAULT_OWNER_NAME, DEFAULT_KNOWLEDGE)
    }

    /// Load the knowledge document from `path`, falling back to the built-in one
    pub fn load(owner_name: &str, path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(path) => {
                let knowledge = std::fs::read_to_string(path)?;
                Ok(Self::new(owner_name, &knowledge))
            }
            None => Ok(Self::new(owner_name, DEFAULT_KNOWLEDGE)),
        }
    }

    /// Full instruction text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Exact sentence the assistant must use for out-of-scope questions
    #[cfg(test)]
    pub fn refusal(&self) -> String {
        refusal_sentence(&self.owner_name)
    }

    /// Opening assistant turn for a new chat session
    pub fn greeting(&self) -> String {
        format!(
            "Hello, I am {}'s AI Assistant. I can tell you all about their skills, projects, and work experience. What would you like to know?",
            first_name(&self.owner_name)
        )
    }
}

fn first_name(owner_name: &str) -> &str {
    owner_name.split_whitespace().next().unwrap_or(owner_name)
}

fn refusal_sentence(owner_name: &str) -> String {
    format!(
        "I am {}'s AI Assistant and can only provide information about {owner_name}'s portfolio. How can I help with that?",
        first_name(owner_name)
    )
}

fn build_instruction(owner_name: &str, knowledge: &str) -> String {
    let first = first_name(owner_name);
    let mut text = String::new();

    let _ = writeln!(
        text,
        "You are {first}'s AI Assistant, a helpful and professional bot dedicated to answering questions about {owner_name}'s professional portfolio."
    );
    let _ = writeln!(text, "Your persona is friendly, concise, and professional.");
    let _ = writeln!(text);
    let _ = writeln!(text, "RULES:");
    let _ = writeln!(
        text,
        "1. Only answer questions based strictly on the PORTFOLIO_KNOWLEDGE below."
    );
    let _ = writeln!(
        text,
        "2. If the user asks about general knowledge, current events, or anything not explicitly covered by the knowledge base, politely decline and state: \"{}\"",
        refusal_sentence(owner_name)
    );
    let _ = writeln!(text, "3. Keep answers brief and factual.");
    let _ = writeln!(text, "4. The portfolio owner's name is {owner_name}.");
    let _ = writeln!(text, "5. You may greet the user however you like.");
    let _ = writeln!(text, "6. If the user thanks you, tell them they are welcome.");
    let _ = writeln!(text, "7. Answer in the language the user asks in.");
    let _ = writeln!(text);
    let _ = writeln!(text, "PORTFOLIO_KNOWLEDGE:");
    text.push_str(knowledge.trim());
    text.push('\n');

    text
}
