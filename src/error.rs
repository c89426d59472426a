//! Error types for the idp-extract library.
//!
//! Failures fall into three tiers:
//!
//! * [`ExtractError`]: **Local**: one embedded image could not be decoded,
//!   or the PDF could not be parsed for image extraction at all. These are
//!   absorbed inside [`crate::pipeline::extract`] and only ever logged; the
//!   router degrades to whole-document inference instead.
//!
//! * [`InferenceError`]: a failed model call. Carries its own retry
//!   classification so the orchestrator can back off on transient failures.
//!
//! * [`IdpError`]: **Fatal** for the unit of work. Returned as `Err` from
//!   [`crate::handler::Extractor::process`]. No output is written once one of
//!   these is raised after routing.
//!
//! An unsupported content type is not an error at all: it is the
//! [`crate::handler::InvocationOutcome::Unsupported`] outcome, which carries
//! the sentinel string and is never retried.

use std::path::PathBuf;
use thiserror::Error;

/// Whether the invoking orchestrator may re-run the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient; re-running the same input may succeed.
    Retryable,
    /// Re-running the same input will fail the same way.
    Terminal,
}

/// All fatal errors for one invocation.
#[derive(Debug, Error)]
pub enum IdpError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// A required configuration value was not supplied.
    #[error("Required configuration '{name}' is missing.\n{hint}")]
    ConfigurationMissing { name: &'static str, hint: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No inference backend could be constructed.
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The invocation event did not name a source document.
    #[error("Invalid invocation event: {0}")]
    InvalidEvent(String),

    /// The source document could not be read from blob storage.
    #[error("Failed to read source document '{key}': {source}")]
    SourceRead {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The secure parameter store could not be read.
    #[error("Failed to read extraction prompt parameter: {0}")]
    ParameterRead(#[source] StoreError),

    // ── Inference errors ──────────────────────────────────────────────────
    /// The request for the chosen route exceeds the configured limits.
    #[error("Inference request too large: {detail}")]
    RequestTooLarge { detail: String },

    /// The model call itself failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The model answered, but not with a JSON object.
    #[error("Model response is not a JSON object: {detail}")]
    MalformedResponse { detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Writing the raw response or the attribute record failed.
    #[error("Failed to write {target}: {source}")]
    OutputWrite {
        target: String,
        #[source]
        source: StoreError,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdpError {
    /// Retry classification for the orchestrator.
    pub fn kind(&self) -> FailureKind {
        match self {
            IdpError::Inference(e) => e.kind(),
            IdpError::SourceRead { source, .. }
            | IdpError::ParameterRead(source)
            | IdpError::OutputWrite { source, .. } => source.kind(),
            IdpError::ConfigurationMissing { .. }
            | IdpError::InvalidConfig(_)
            | IdpError::ProviderNotConfigured { .. }
            | IdpError::InvalidEvent(_)
            | IdpError::RequestTooLarge { .. }
            | IdpError::MalformedResponse { .. }
            | IdpError::Internal(_) => FailureKind::Terminal,
        }
    }

    /// Shorthand for `kind() == FailureKind::Retryable`.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}

/// A failed call to the inference service.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// No response arrived within the per-call budget.
    #[error("Inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 429; the caller should back off.
    #[error("Inference service rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Network failure or a 5xx-class answer.
    #[error("Inference service error{}: {message}", http_suffix(.status))]
    Service { status: Option<u16>, message: String },

    /// The service refused the request (bad credentials, invalid payload).
    #[error("Inference request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend cannot carry one of the request's content blocks.
    #[error("Inference backend cannot send this content: {0}")]
    UnsupportedContent(String),

    /// The service answered with an envelope we could not read.
    #[error("Malformed inference service envelope: {0}")]
    MalformedEnvelope(String),
}

impl InferenceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InferenceError::Timeout { .. }
            | InferenceError::RateLimited { .. }
            | InferenceError::Service { .. } => FailureKind::Retryable,
            InferenceError::Rejected { .. }
            | InferenceError::UnsupportedContent(_)
            | InferenceError::MalformedEnvelope(_) => FailureKind::Terminal,
        }
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// A non-fatal extraction failure.
///
/// Logged by the extractor and then dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The bytes could not be loaded as a PDF document.
    #[error("PDF could not be parsed: {0}")]
    PdfParse(String),

    /// One embedded image could not be decoded or re-encoded.
    #[error("Page {page}, object {position} ('{name}'): image decode failed: {detail}")]
    ImageDecode {
        page: u32,
        position: usize,
        name: String,
        detail: String,
    },
}

/// Failure reported by a blob, parameter or record store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists under the key.
    #[error("'{key}' not found")]
    NotFound { key: String },

    /// The key is not acceptable to this store (e.g. escapes its root).
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Local file-system failure.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote backend failure; assumed transient.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::Backend(_) => FailureKind::Retryable,
            StoreError::NotFound { .. } | StoreError::InvalidKey { .. } | StoreError::Io { .. } => {
                FailureKind::Terminal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_timeout_is_retryable() {
        let e = IdpError::from(InferenceError::Timeout { secs: 240 });
        assert!(e.is_retryable());
        assert!(e.to_string().contains("240s"), "got: {e}");
    }

    #[test]
    fn rejected_request_is_terminal() {
        let e = IdpError::from(InferenceError::Rejected {
            status: 400,
            message: "bad image".into(),
        });
        assert_eq!(e.kind(), FailureKind::Terminal);
        assert!(e.to_string().contains("400"));
    }

    #[test]
    fn malformed_response_is_terminal() {
        let e = IdpError::MalformedResponse {
            detail: "expected value at line 1".into(),
        };
        assert!(!e.is_retryable());
    }

    #[test]
    fn missing_config_is_terminal_and_named() {
        let e = IdpError::ConfigurationMissing {
            name: "max_tokens",
            hint: "Set MAX_RESPONSE_TOKENS.",
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("max_tokens"));
    }

    #[test]
    fn store_errors_follow_backend_kind() {
        let transient = IdpError::OutputWrite {
            target: "record".into(),
            source: StoreError::Backend("throttled".into()),
        };
        assert!(transient.is_retryable());

        let missing = IdpError::SourceRead {
            key: "a.pdf".into(),
            source: StoreError::NotFound { key: "a.pdf".into() },
        };
        assert!(!missing.is_retryable());
    }

    #[test]
    fn service_error_display_with_and_without_status() {
        let with = InferenceError::Service {
            status: Some(503),
            message: "overloaded".into(),
        };
        assert!(with.to_string().contains("HTTP 503"));

        let without = InferenceError::Service {
            status: None,
            message: "connection reset".into(),
        };
        assert!(!without.to_string().contains("HTTP"));
    }

    #[test]
    fn image_decode_display_names_position() {
        let e = ExtractError::ImageDecode {
            page: 2,
            position: 1,
            name: "Im1".into(),
            detail: "unsupported filter JBIG2Decode".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("Im1"), "got: {msg}");
    }
}
