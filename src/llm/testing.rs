//! Mock LLM services for tests

use super::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Mock service that replays queued results and records every call
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Requests received, in order
    pub requests: Mutex<Vec<LlmRequest>>,
    /// Tokio clock reading at the start of each call
    pub call_times: Mutex<Vec<Instant>>,
    /// Optional per-call latency
    delay: Option<Duration>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::text(text));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls
    pub fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.call_times.lock().unwrap().push(Instant::now());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
