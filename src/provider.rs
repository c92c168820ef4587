//! Vision provider: one chat completion per slide image.
//!
//! [`VisionModel`] is the seam between the OCR stage and the network. The
//! default implementation, [`MistralClient`], speaks Mistral's
//! OpenAI-compatible `chat/completions` endpoint directly over `reqwest`.
//! Tests substitute their own model to observe requests and script replies.
//!
//! ## Message layout
//!
//! A single user turn with two content parts, in order:
//! 1. `text`: the extraction prompt
//! 2. `image_url`: the slide as a `data:image/png;base64,…` URI
//!
//! ## Reply handling
//!
//! Only `choices[0].message.content` is read. Mistral returns either a plain
//! string or an array of typed chunks; both are accepted, and the text chunks
//! are concatenated. `null` content means the model had nothing to say and is
//! treated as an empty string.

use crate::error::OcrError;
use crate::pipeline::encode::EncodedImage;
use crate::request::ApiKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Everything a model needs for one completion.
#[derive(Clone, Copy)]
pub struct VisionCall<'a> {
    pub model: &'a str,
    pub credential: &'a ApiKey,
    pub prompt: &'a str,
    pub image: &'a EncodedImage,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A remote (or fake) vision-language model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Submit one image and return the raw completion text (untrimmed).
    async fn complete(&self, call: VisionCall<'_>) -> Result<String, OcrError>;
}

/// [`VisionModel`] for Mistral's chat completions API.
#[derive(Debug, Clone)]
pub struct MistralClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl MistralClient {
    /// `base_url` is the API root, e.g. `https://api.mistral.ai/v1`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, OcrError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| OcrError::Internal(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::Timeout {
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }
        } else {
            // Drop the URL: it is fixed and only adds noise.
            OcrError::Network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl VisionModel for MistralClient {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn complete(&self, call: VisionCall<'_>) -> Result<String, OcrError> {
        let body = ChatRequest::new(&call);
        debug!(
            "POST {} model={} image={} bytes",
            self.endpoint,
            call.model,
            call.image.data.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(call.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(OcrError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [UserMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    fn new(call: &VisionCall<'a>) -> Self {
        Self {
            model: call.model,
            messages: [UserMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: call.prompt },
                    ContentPart::ImageUrl {
                        image_url: call.image.data_uri(),
                    },
                ],
            }],
            temperature: call.temperature,
            max_tokens: call.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: String },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplyContent {
    Text(String),
    Chunks(Vec<ReplyChunk>),
}

#[derive(Debug, Deserialize)]
struct ReplyChunk {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Extract the first choice's text from a chat completion body.
pub fn parse_completion(body: &str) -> Result<String, OcrError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::MalformedResponse(format!("not a chat completion: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::MalformedResponse("response contained no choices".into()))?;

    Ok(match choice.message.content {
        None => String::new(),
        Some(ReplyContent::Text(text)) => text,
        Some(ReplyContent::Chunks(chunks)) => chunks
            .into_iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text)
            .collect(),
    })
}
