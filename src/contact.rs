//! Contact form relay
//!
//! Validates a visitor's message and forwards it once to a third-party
//! form-relay endpoint. There is no retry: the visitor sees success or
//! failure and may send again.

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Please fill out the {0} field before sending your message")]
    MissingField(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Could not reach the form relay: {0}")]
    Transport(String),
    #[error("Form relay rejected the message with status {0}")]
    Rejected(u16),
}

impl ContactError {
    /// Whether the visitor can fix this by editing the form
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::InvalidEmail)
    }
}

/// Fields of the contact form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    /// Trim every field and check it is complete
    pub fn validate(&self) -> Result<ContactForm, ContactError> {
        let form = ContactForm {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
        };

        for (field, value) in [
            ("name", &form.name),
            ("email", &form.email),
            ("message", &form.message),
        ] {
            if value.is_empty() {
                return Err(ContactError::MissingField(field));
            }
        }

        if !EMAIL_RE.is_match(&form.email) {
            return Err(ContactError::InvalidEmail);
        }

        Ok(form)
    }
}

/// Client for the form-relay endpoint
pub struct ContactRelay {
    client: Client,
    endpoint: String,
}

impl ContactRelay {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ContactError> {
        let client = Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .map_err(|e| ContactError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Validate and forward the form once
    pub async fn submit(&self, form: &ContactForm) -> Result<(), ContactError> {
        let form = form.validate()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ContactError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Contact message relayed");
            Ok(())
        } else {
            tracing::warn!(status = status.as_u16(), "Contact relay rejected message");
            Err(ContactError::Rejected(status.as_u16()))
        }
    }
}
