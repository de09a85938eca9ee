//! Vision inference provider (OpenAI Responses API).

use std::time::Duration;

use async_trait::async_trait;
use rectshot_core::config::ProviderConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Instruction sent alongside every capture.
pub const EXPLAIN_PROMPT: &str = "You are helping me understand this screenshot.\n\
    1) Briefly explain what is shown.\n\
    2) If there is a question or problem, answer or solve it clearly.\n";

/// Shown when a successful response carries no answer text.
pub const NO_ANSWER_TEXT: &str = "(No answer text found)";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("could not parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Text recorded in the failed history entry.
    pub fn history_text(&self) -> String {
        match self {
            ProviderError::Remote { message, .. } => format!("Error from OpenAI: {message}"),
            ProviderError::Network(detail) | ProviderError::Parse(detail) => {
                format!("Network or parsing error: {detail}")
            }
        }
    }
}

/// Explains a cropped capture.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// `image_data_url` is a `data:image/png;base64,...` URL.
    async fn explain(
        &self,
        api_key: &SecretString,
        model: &str,
        image_data_url: &str,
    ) -> Result<String, ProviderError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    reasoning: Reasoning<'a>,
    text: TextOptions<'a>,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct Reasoning<'a> {
    effort: &'a str,
}

#[derive(Debug, Serialize)]
struct TextOptions<'a> {
    verbosity: &'a str,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: Vec<InputContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str, detail: &'a str },
}

/// The shapes a successful Responses API body is known to take.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Top-level `output_text` string
    Flat(String),
    /// `output[].content[]` items of type `output_text`, in order
    Nested(Vec<String>),
    /// Neither; kept verbatim
    Unknown(Value),
}

impl ResponseShape {
    pub fn decode(body: Value) -> Self {
        if let Some(text) = body.get("output_text").and_then(Value::as_str) {
            if !text.is_empty() {
                return ResponseShape::Flat(text.to_string());
            }
        }

        if let Some(output) = body.get("output").and_then(Value::as_array) {
            let pieces = output
                .iter()
                .filter_map(|item| item.get("content").and_then(Value::as_array))
                .flatten()
                .filter(|c| c.get("type").and_then(Value::as_str) == Some("output_text"))
                .filter_map(|c| c.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            return ResponseShape::Nested(pieces);
        }

        ResponseShape::Unknown(body)
    }

    /// Text for the history entry.
    pub fn into_answer(self) -> String {
        let answer = match self {
            ResponseShape::Flat(text) => text,
            ResponseShape::Nested(pieces) => pieces.join("\n"),
            ResponseShape::Unknown(raw) => raw.to_string(),
        };
        if answer.is_empty() {
            NO_ANSWER_TEXT.to_string()
        } else {
            answer
        }
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn remote_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// HTTPS client for the Responses endpoint.
pub struct OpenAiResponsesClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiResponsesClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_request<'a>(&'a self, model: &'a str, image_data_url: &'a str) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model,
            reasoning: Reasoning {
                effort: &self.config.reasoning_effort,
            },
            text: TextOptions {
                verbosity: &self.config.verbosity,
            },
            input: vec![InputMessage {
                role: "user",
                content: vec![
                    InputContent::InputText {
                        text: EXPLAIN_PROMPT,
                    },
                    InputContent::InputImage {
                        image_url: image_data_url,
                        detail: &self.config.image_detail,
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiResponsesClient {
    async fn explain(
        &self,
        api_key: &SecretString,
        model: &str,
        image_data_url: &str,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(model, image_data_url);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "inference request rejected");
            return Err(ProviderError::Remote {
                status: status.as_u16(),
                message: remote_message(&body),
            });
        }

        let json: Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let shape = ResponseShape::decode(json);
        if matches!(shape, ResponseShape::Unknown(_)) {
            tracing::debug!("unrecognized response shape, showing raw body");
        }
        Ok(shape.into_answer())
    }
}
