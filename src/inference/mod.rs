//! The inference call: one request in, one text answer out.
//!
//! [`InferenceClient`] is the seam between the pipeline and whatever serves
//! the model. Two backends ship with the crate:
//!
//! * [`MessagesClient`] speaks a Messages-style HTTP API directly and can
//!   carry every route (document and image blocks).
//! * [`ProviderClient`] adapts an `edgequake_llm` provider. Those providers
//!   take images only, so document routes fail with
//!   [`InferenceError::UnsupportedContent`].
//!
//! [`converse_with_timeout`] bounds the call with the configured per-call
//! timeout so a hung connection surfaces as [`InferenceError::Timeout`].

pub mod messages;
pub mod provider;

pub use messages::MessagesClient;
pub use provider::{resolve_provider, ProviderClient};

use crate::error::InferenceError;
use crate::pipeline::request::InferenceRequest;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// The model's answer and its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A multimodal model endpoint.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Send one request and return the model's text.
    async fn converse(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError>;
}

/// Run `client.converse` under a hard deadline.
pub async fn converse_with_timeout(
    client: &dyn InferenceClient,
    request: &InferenceRequest,
    timeout: Duration,
) -> Result<InferenceResponse, InferenceError> {
    let start = Instant::now();
    let response = tokio::time::timeout(timeout, client.converse(request))
        .await
        .map_err(|_| InferenceError::Timeout {
            secs: timeout.as_secs(),
        })??;

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        client.name(),
        response.input_tokens,
        response.output_tokens,
        start.elapsed()
    );
    Ok(response)
}
