//! `edgequake_llm` backend.
//!
//! Maps an [`InferenceRequest`] onto a chat call: the system instruction as a
//! system message, then one user message whose text is the concatenated text
//! blocks and whose attachments are the image blocks in order. Chat providers
//! have no document attachment, so any document block is rejected before a
//! call is made.

use super::{InferenceClient, InferenceResponse};
use crate::error::{IdpError, InferenceError};
use crate::pipeline::encode::to_base64;
use crate::pipeline::request::{ContentBlock, InferenceRequest};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Inference over any `edgequake_llm` chat provider.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("label", &self.label)
            .finish()
    }
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn converse(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let messages = chat_messages(request)?;
        let options = completion_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                warn!("{}: chat call failed: {}", self.label, e);
                InferenceError::Service {
                    status: None,
                    message: e.to_string(),
                }
            })?;

        Ok(InferenceResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// System message plus one user turn carrying text and images in order.
fn chat_messages(request: &InferenceRequest) -> Result<Vec<ChatMessage>, InferenceError> {
    let mut text = Vec::new();
    let mut images = Vec::new();

    for block in &request.blocks {
        match block {
            ContentBlock::Text(t) => text.push(t.as_str()),
            ContentBlock::Image { format, bytes } => {
                images.push(ImageData::new(to_base64(bytes), format.mime_type()));
            }
            ContentBlock::Document { name, format, .. } => {
                return Err(InferenceError::UnsupportedContent(format!(
                    "chat providers cannot attach {format:?} document '{name}'; use the Messages backend"
                )));
            }
        }
    }

    let prompt = text.join("\n\n");
    Ok(vec![
        ChatMessage::system(request.system.as_str()),
        ChatMessage::user_with_images(prompt.as_str(), images),
    ])
}

fn completion_options(request: &InferenceRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.generation.temperature),
        max_tokens: Some(request.generation.max_tokens as usize),
        ..Default::default()
    }
}

/// Resolve a chat provider, from most-specific to least-specific.
///
/// 1. **Named provider** (`provider_name`) with `model`.
/// 2. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 3. **OpenAI** when `OPENAI_API_KEY` is set.
/// 4. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<ProviderClient, IdpError> {
    let model = model.unwrap_or(DEFAULT_PROVIDER_MODEL);

    if let Some(name) = provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| IdpError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No chat provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY or EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL.\n\
                Error: {e}"
            ),
        })?;
    info!("Using auto-detected chat provider");
    Ok(ProviderClient::new(llm, "auto"))
}

fn create_provider(name: &str, model: &str) -> Result<ProviderClient, IdpError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        IdpError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using chat provider {} ({})", name, model);
    Ok(ProviderClient::new(provider, format!("{name}/{model}")))
}
