//! Google Gemini provider implementation

use super::types::{LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini `generateContent` client
pub struct GeminiService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: &str, base_url: &str) -> Result<Self, LlmError> {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model_id: model.to_string(),
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|msg| GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(msg.text.clone()),
                }],
            })
            .collect();

        let system_instruction = if request.system.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(request.system.clone()),
                }],
            })
        };

        GeminiRequest {
            contents,
            system_instruction,
        }
    }

    /// Pull the first candidate's first text part, if every node is present
    fn normalize_response(resp: GeminiResponse) -> LlmResponse {
        let usage = resp
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u64::from(u.prompt_token_count),
                output_tokens: u64::from(u.candidates_token_count),
            })
            .unwrap_or_default();

        let text = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .filter(|text| !text.is_empty());

        LlmResponse { text, usage }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |error_resp| error_resp.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        // A body that is not JSON at all counts as a failed attempt
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;

        let gemini_response = serde_json::from_value::<GeminiResponse>(value).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Unexpected response shape");
            GeminiResponse::default()
        });

        Ok(Self::normalize_response(gemini_response))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
