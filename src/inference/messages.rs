//! HTTP backend for a Messages-style multimodal API.
//!
//! One `POST {base_url}/v1/messages` per request. The system instruction
//! goes in `system`, the content blocks become the single user turn in
//! their original order, and decoding is pinned with `temperature = 0` and
//! `top_p = 0`.

use super::{InferenceClient, InferenceResponse};
use crate::config::ExtractionConfig;
use crate::error::{IdpError, InferenceError};
use crate::pipeline::content_type::DocumentFormat;
use crate::pipeline::encode::to_base64;
use crate::pipeline::request::{ContentBlock, InferenceRequest};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Client for the Messages endpoint.
#[derive(Clone)]
pub struct MessagesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl fmt::Debug for MessagesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagesClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl MessagesClient {
    /// Build a client using the model and timeouts from `config`.
    pub fn new(api_key: impl Into<String>, config: &ExtractionConfig) -> Result<Self, IdpError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(IdpError::ConfigurationMissing {
                name: "api_key",
                hint: "Set ANTHROPIC_API_KEY or pass --api-key.",
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.api_timeout())
            .build()
            .map_err(|e| IdpError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: config.model.clone(),
            request_timeout: config.api_timeout(),
        })
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl InferenceClient for MessagesClient {
    fn name(&self) -> &str {
        "messages"
    }

    async fn converse(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let body = wire_request(&self.model, request)?;
        debug!("POST {} ({} blocks)", self.endpoint(), body.messages[0].content.len());

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let err = status_error(status, retry_after, &text);
            warn!("Inference call failed: {}", err);
            return Err(err);
        }

        parse_response(&text)
    }
}

impl MessagesClient {
    fn transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                secs: self.request_timeout.as_secs(),
            }
        } else {
            InferenceError::Service {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    system: &'a str,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireBlock {
    Text {
        text: String,
    },
    Image {
        source: WireSource,
    },
    Document {
        source: WireSource,
        title: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireSource {
    Base64 {
        media_type: &'static str,
        data: String,
    },
    Text {
        media_type: &'static str,
        data: String,
    },
}

fn wire_request<'a>(
    model: &'a str,
    request: &'a InferenceRequest,
) -> Result<WireRequest<'a>, InferenceError> {
    let content = request
        .blocks
        .iter()
        .map(wire_block)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WireRequest {
        model,
        max_tokens: request.generation.max_tokens,
        temperature: request.generation.temperature,
        top_p: request.generation.top_p,
        system: &request.system,
        messages: vec![WireMessage {
            role: "user",
            content,
        }],
    })
}

fn wire_block(block: &ContentBlock) -> Result<WireBlock, InferenceError> {
    Ok(match block {
        ContentBlock::Text(text) => WireBlock::Text { text: text.clone() },
        ContentBlock::Image { format, bytes } => WireBlock::Image {
            source: WireSource::Base64 {
                media_type: format.mime_type(),
                data: to_base64(bytes),
            },
        },
        ContentBlock::Document { name, format, bytes } => {
            let source = match format {
                DocumentFormat::Pdf => WireSource::Base64 {
                    media_type: format.mime_type(),
                    data: to_base64(bytes),
                },
                f if f.is_textual() => {
                    let text = std::str::from_utf8(bytes).map_err(|e| {
                        InferenceError::UnsupportedContent(format!(
                            "{f:?} document '{name}' is not valid UTF-8: {e}"
                        ))
                    })?;
                    WireSource::Text {
                        media_type: "text/plain",
                        data: text.to_string(),
                    }
                }
                other => {
                    return Err(InferenceError::UnsupportedContent(format!(
                        "{other:?} documents are not accepted by the Messages API"
                    )))
                }
            };
            WireBlock::Document {
                source,
                title: name.clone(),
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<WireResponseBlock>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    #[serde(default)]
    message: String,
}

fn parse_response(body: &str) -> Result<InferenceResponse, InferenceError> {
    let parsed: WireResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedEnvelope(e.to_string()))?;

    let text: String = parsed
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    if text.is_empty() {
        return Err(InferenceError::MalformedEnvelope(
            "response contains no text content".into(),
        ));
    }

    Ok(InferenceResponse {
        text,
        input_tokens: parsed.usage.input_tokens,
        output_tokens: parsed.usage.output_tokens,
    })
}

/// Classify a non-success HTTP answer.
fn status_error(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> InferenceError {
    let message = serde_json::from_str::<WireErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());
    let code = status.as_u16();

    match code {
        429 => InferenceError::RateLimited { retry_after_secs },
        408 | 529 => InferenceError::Service {
            status: Some(code),
            message,
        },
        _ if status.is_server_error() => InferenceError::Service {
            status: Some(code),
            message,
        },
        _ => InferenceError::Rejected {
            status: code,
            message,
        },
    }
}
