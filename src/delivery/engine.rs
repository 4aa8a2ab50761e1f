//! Delivery engine: one user question in, one assistant turn out

use super::retry::RetryPolicy;
use super::{DeliveryFailure, Settlement};
use crate::knowledge::SystemContext;
use crate::llm::{LlmRequest, LlmService};
use crate::transcript::Turn;
use std::sync::Arc;

/// Sends a user question to the model with bounded retry
///
/// Holds no transcript: every request carries only the newest user text and
/// the system context.
pub struct DeliveryEngine<L: LlmService> {
    service: Option<L>,
    context: Arc<SystemContext>,
    policy: RetryPolicy,
}

impl<L: LlmService> DeliveryEngine<L> {
    /// `service` is `None` when no credential is configured
    pub fn new(service: Option<L>, context: Arc<SystemContext>) -> Self {
        Self {
            service,
            context,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Build the wire request for a question
    pub fn build_request(&self, user_text: &str) -> LlmRequest {
        LlmRequest::single_turn(self.context.text(), user_text)
    }

    /// Deliver `user_text` and settle to an assistant turn
    ///
    /// Never fails: configuration, transport and response problems all come
    /// back as an assistant turn carrying a fixed explanation.
    pub async fn deliver(&self, user_text: &str) -> Turn {
        self.settle(user_text).await.into_turn()
    }

    /// Run the attempt loop and report how it ended
    pub async fn settle(&self, user_text: &str) -> Settlement {
        let Some(service) = &self.service else {
            tracing::warn!("Chat delivery skipped: no API key configured");
            return Settlement::Failed(DeliveryFailure::Configuration);
        };

        let request = self.build_request(user_text);
        let mut attempt = 1;

        loop {
            match service.complete(&request).await {
                Ok(response) => {
                    return match response.text {
                        Some(text) => {
                            tracing::info!(attempt, "Chat delivery answered");
                            Settlement::Answered { text, attempts: attempt }
                        }
                        None => {
                            tracing::warn!(attempt, "Chat delivery got a response without text");
                            Settlement::Failed(DeliveryFailure::MalformedResponse)
                        }
                    };
                }
                Err(e) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        kind = ?e.kind,
                        error = %e.message,
                        delay_ms = %delay.as_millis(),
                        "Chat delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        attempt,
                        kind = ?e.kind,
                        error = %e.message,
                        "Chat delivery failed after final attempt"
                    );
                    return Settlement::Failed(DeliveryFailure::Transport { attempts: attempt });
                }
            }
        }
    }
}
