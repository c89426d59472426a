//! One invocation, start to finish.
//!
//! ```text
//! event ─▶ key ─▶ read blob ─▶ route ─┬─ Unsupported ─▶ sentinel (no call, no writes)
//!                                     └─ prompt ─▶ request ─▶ converse ─▶ map ─▶ write blob + record
//! ```
//!
//! The answer is parsed before anything is written, so a malformed response
//! leaves both outputs untouched. The handler makes exactly one inference
//! call and never retries; see [`crate::retry`] for the orchestrator side.

use crate::config::ExtractionConfig;
use crate::error::IdpError;
use crate::event;
use crate::inference::{converse_with_timeout, InferenceClient};
use crate::pipeline::request::{build_request, GenerationConfig};
use crate::pipeline::response::{map_response, ExtractionResult};
use crate::pipeline::route::{self, ProcessingRoute};
use crate::prompts::resolve_prompt;
use crate::source::SourceDocument;
use crate::store::{response_key, BlobStore, ParameterStore, RecordStore, RESPONSE_MEDIA_TYPE};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Returned instead of a response when the content type is not supported.
pub const UNSUPPORTED_CONTENT_TYPE: &str = "Unsupported Content Type";

/// Successful end of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Fields were extracted and both outputs written.
    Extracted(ExtractionResult),
    /// The content type is not supported; nothing was sent or written.
    Unsupported,
}

impl InvocationOutcome {
    /// The value handed back to the caller: the raw model text, or the
    /// sentinel.
    pub fn response_text(&self) -> &str {
        match self {
            InvocationOutcome::Extracted(r) => &r.raw_response,
            InvocationOutcome::Unsupported => UNSUPPORTED_CONTENT_TYPE,
        }
    }
}

/// The external systems an [`Extractor`] reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub params: Arc<dyn ParameterStore>,
    pub records: Arc<dyn RecordStore>,
}

/// Runs invocations against a fixed configuration and set of collaborators.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    client: Arc<dyn InferenceClient>,
    stores: Collaborators,
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("client", &self.client.name())
            .finish_non_exhaustive()
    }
}

impl Extractor {
    pub fn new(
        config: ExtractionConfig,
        client: Arc<dyn InferenceClient>,
        stores: Collaborators,
    ) -> Self {
        Self {
            config,
            client,
            stores,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process the key named by an invocation event.
    pub async fn handle_event(&self, event: &Value) -> Result<InvocationOutcome, IdpError> {
        let key = event::source_key(event)?;
        self.process(&key).await
    }

    /// Process one source document.
    #[instrument(skip(self), fields(backend = self.client.name()))]
    pub async fn process(&self, key: &str) -> Result<InvocationOutcome, IdpError> {
        // Fail fast, before any external call.
        let max_tokens = self.config.require_max_tokens()?;

        let blob = self
            .stores
            .blobs
            .get(key)
            .await
            .map_err(|source| IdpError::SourceRead {
                key: key.to_string(),
                source,
            })?;
        let source = SourceDocument::new(key, blob.media_type, blob.bytes);

        let decision = route::decide(&source, &self.config.thresholds).await;
        if decision.route == ProcessingRoute::Unsupported {
            info!("'{}': {} is not supported; skipping", key, source.media_type);
            return Ok(InvocationOutcome::Unsupported);
        }

        let stored_prompt = self
            .stores
            .params
            .extraction_prompt()
            .await
            .map_err(IdpError::ParameterRead)?;
        let prompt = resolve_prompt(Some(&stored_prompt), self.config.env_prompt.as_deref());
        info!("Using extraction prompt from {}", prompt.source);

        let request = build_request(
            &source,
            &decision,
            &prompt.text,
            GenerationConfig::deterministic(max_tokens),
            &self.config.limits,
        )?;

        let response =
            converse_with_timeout(self.client.as_ref(), &request, self.config.api_timeout()).await?;

        let result = map_response(key, &response.text, &decision)?;

        let blob_key = response_key(key);
        self.stores
            .blobs
            .put(&blob_key, response.text.as_bytes(), RESPONSE_MEDIA_TYPE)
            .await
            .map_err(|source| IdpError::OutputWrite {
                target: blob_key.clone(),
                source,
            })?;
        self.stores
            .records
            .put(key, &result.attributes)
            .await
            .map_err(|source| IdpError::OutputWrite {
                target: format!("record '{key}'"),
                source,
            })?;

        info!(
            "'{}': {} fields via {}",
            key,
            result.attributes.len(),
            result.route
        );
        Ok(InvocationOutcome::Extracted(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::InferenceResponse;
    use crate::pipeline::request::InferenceRequest;
    use crate::store::memory::{MemoryBlobStore, MemoryParameterStore, MemoryRecordStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Canned {
        answer: String,
        seen: Mutex<Vec<InferenceRequest>>,
    }

    #[async_trait]
    impl InferenceClient for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn converse(
            &self,
            request: &InferenceRequest,
        ) -> Result<InferenceResponse, InferenceError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(InferenceResponse {
                text: self.answer.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    async fn setup(
        answer: &str,
        max_tokens: Option<u32>,
    ) -> (Extractor, Arc<Canned>, MemoryBlobStore, MemoryRecordStore) {
        let blobs = MemoryBlobStore::new();
        blobs.insert("photo.png", vec![0x89, b'P', b'N', b'G'], "image/png").await;
        let records = MemoryRecordStore::new();
        let client = Arc::new(Canned {
            answer: answer.to_string(),
            ..Canned::default()
        });
        let config = ExtractionConfig::builder().max_tokens_opt(max_tokens).build().unwrap();
        let extractor = Extractor::new(
            config,
            client.clone(),
            Collaborators {
                blobs: Arc::new(blobs.clone()),
                params: Arc::new(MemoryParameterStore::new("P1")),
                records: Arc::new(records.clone()),
            },
        );
        (extractor, client, blobs, records)
    }

    #[tokio::test]
    async fn image_key_round_trip() {
        let (extractor, client, blobs, records) = setup(r#"{"name":"Ada"}"#, Some(100)).await;
        let outcome = extractor.process("photo.png").await.unwrap();

        assert_eq!(outcome.response_text(), r#"{"name":"Ada"}"#);
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].generation.max_tokens, 100);
        drop(seen);

        let raw = blobs.snapshot("photo.png-Response.json").await.unwrap();
        assert_eq!(raw.media_type, "application/json");
        let record = records.get("photo.png").await.unwrap();
        assert_eq!(record["name"], "Ada");
        assert_eq!(record["route"], "SingleImageInference");
    }

    #[tokio::test]
    async fn missing_token_budget_fails_before_any_call() {
        let (extractor, client, blobs, _) = setup("{}", None).await;
        let err = extractor.process("photo.png").await.unwrap_err();
        assert!(matches!(err, IdpError::ConfigurationMissing { .. }));
        assert!(client.seen.lock().unwrap().is_empty());
        assert_eq!(blobs.put_count().await, 0);
    }

    #[tokio::test]
    async fn handle_event_decodes_key() {
        let (extractor, _, _, records) = setup("{}", Some(10)).await;
        let event = serde_json::json!({"Key": "photo.png"});
        extractor.handle_event(&event).await.unwrap();
        assert!(records.get("photo.png").await.is_some());
    }

    #[test]
    fn sentinel_text() {
        assert_eq!(
            InvocationOutcome::Unsupported.response_text(),
            "Unsupported Content Type"
        );
    }
}
