//! # idp-extract
//!
//! Extract structured fields from PDFs, scans and document photos with a
//! multimodal model.
//!
//! ## Why routing?
//!
//! A PDF may be born-digital text, a wrapper around page scans, or text with
//! a letterhead logo. Sending a scan-only PDF as a document wastes the
//! model's text pipeline on pages that have no text layer; sending every
//! embedded image drowns the request in logos. This crate looks inside each
//! PDF, classifies its images by geometry, and picks one presentation per
//! file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source (bytes + media type + key)
//!  │
//!  ├─ 1. Resolve   media type → Document | Image | Unsupported
//!  ├─ 2. Extract   PDF only: decode page images, classify logo / scanned
//!  ├─ 3. Route     WholeDocument | MultiImage | SingleImage | Unsupported
//!  ├─ 4. Request   [text(prompt), document | image…] + system + decoding
//!  ├─ 5. Converse  one inference call with a hard timeout
//!  ├─ 6. Map       JSON object → flat string attributes + provenance
//!  └─ 7. Persist   <key>-Response.json blob + one record per key
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idp_extract::store::{FileParameterStore, FsBlobStore, FsRecordStore};
//! use idp_extract::{Collaborators, ExtractionConfig, Extractor, MessagesClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder().max_tokens(4096).build()?;
//!     let client = MessagesClient::new(std::env::var("ANTHROPIC_API_KEY")?, &config)?;
//!     let extractor = Extractor::new(
//!         config,
//!         Arc::new(client),
//!         Collaborators {
//!             blobs: Arc::new(FsBlobStore::new("inbox")),
//!             params: Arc::new(FileParameterStore::none()),
//!             records: Arc::new(FsRecordStore::new("records")),
//!         },
//!     );
//!     let outcome = extractor.process("claim.pdf").await?;
//!     println!("{}", outcome.response_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `idp-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! idp-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod inference;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod source;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, RequestLimits};
pub use error::{ExtractError, FailureKind, IdpError, InferenceError, StoreError};
pub use handler::{Collaborators, Extractor, InvocationOutcome, UNSUPPORTED_CONTENT_TYPE};
pub use inference::{InferenceClient, InferenceResponse, MessagesClient, ProviderClient};
pub use pipeline::classify::{classify, ClassifierThresholds, ImageClassification};
pub use pipeline::request::{ContentBlock, GenerationConfig, InferenceRequest};
pub use pipeline::response::{AttributeRecord, ExtractionResult};
pub use pipeline::route::{ProcessingRoute, Provenance, RouteDecision, RouteKind};
pub use retry::{retry, RetryPolicy};
pub use source::SourceDocument;
