//! Configuration types for field extraction.
//!
//! Every per-invocation knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is immutable once built and is
//! passed explicitly into each stage; nothing reads process state after
//! construction.

use crate::error::IdpError;
use crate::pipeline::classify::ClassifierThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default model for the Messages backend.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Configuration for one extraction invocation.
///
/// # Example
/// ```rust
/// use idp_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("claude-3-5-sonnet-20241022")
///     .max_tokens(4096)
///     .api_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.require_max_tokens().unwrap(), 4096);
/// ```
#[derive(Clone, Serialize)]
pub struct ExtractionConfig {
    /// Model identifier passed to the inference backend.
    pub model: String,

    /// Maximum output tokens per call. Required; there is no default.
    ///
    /// Checked by [`ExtractionConfig::require_max_tokens`] before any
    /// external call is made.
    pub max_tokens: Option<u32>,

    /// Environment-level override for the extraction prompt. Used when the
    /// parameter store yields nothing.
    pub env_prompt: Option<String>,

    /// Pixel and aspect-ratio thresholds for the image classifier.
    pub thresholds: ClassifierThresholds,

    /// Size limits a request must fit before it is sent.
    pub limits: RequestLimits,

    /// TCP/TLS connect timeout for the inference endpoint. Default: 30.
    pub connect_timeout_secs: u64,

    /// Per-call inference timeout in seconds. Default: 240.
    pub api_timeout_secs: u64,

    /// Overall time budget of one invocation in seconds. Default: 300.
    ///
    /// Both timeouts above must be strictly shorter than this.
    pub invocation_budget_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            env_prompt: None,
            thresholds: ClassifierThresholds::default(),
            limits: RequestLimits::default(),
            connect_timeout_secs: 30,
            api_timeout_secs: 240,
            invocation_budget_secs: 300,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field(
                "env_prompt",
                &self.env_prompt.as_ref().map(|p| format!("<{} chars>", p.len())),
            )
            .field("thresholds", &self.thresholds)
            .field("limits", &self.limits)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("invocation_budget_secs", &self.invocation_budget_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The output token budget, or `ConfigurationMissing` if unset.
    pub fn require_max_tokens(&self) -> Result<u32, IdpError> {
        self.max_tokens.ok_or(IdpError::ConfigurationMissing {
            name: "max_tokens",
            hint: "Set MAX_RESPONSE_TOKENS or pass --max-tokens.",
        })
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    /// Set or clear the token budget from an optional source such as an
    /// environment variable.
    pub fn max_tokens_opt(mut self, n: Option<u32>) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn env_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.env_prompt = Some(prompt.into());
        self
    }

    pub fn thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn limits(mut self, limits: RequestLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn invocation_budget_secs(mut self, secs: u64) -> Self {
        self.config.invocation_budget_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing token budget is not a build error; it is reported by
    /// [`ExtractionConfig::require_max_tokens`] at invocation time.
    pub fn build(self) -> Result<ExtractionConfig, IdpError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(IdpError::InvalidConfig("Model id must not be empty".into()));
        }
        if c.max_tokens == Some(0) {
            return Err(IdpError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 || c.connect_timeout_secs == 0 {
            return Err(IdpError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        if c.api_timeout_secs >= c.invocation_budget_secs {
            return Err(IdpError::InvalidConfig(format!(
                "Inference timeout ({}s) must be shorter than the invocation budget ({}s)",
                c.api_timeout_secs, c.invocation_budget_secs
            )));
        }
        if c.connect_timeout_secs >= c.invocation_budget_secs {
            return Err(IdpError::InvalidConfig(format!(
                "Connect timeout ({}s) must be shorter than the invocation budget ({}s)",
                c.connect_timeout_secs, c.invocation_budget_secs
            )));
        }
        if c.limits.max_images == 0 {
            return Err(IdpError::InvalidConfig("max_images must be ≥ 1".into()));
        }
        let t = &c.thresholds;
        if t.squareish_ratio.0 >= t.squareish_ratio.1
            || t.rectangular_ratio.0 >= t.rectangular_ratio.1
        {
            return Err(IdpError::InvalidConfig(
                "Aspect-ratio bounds must be (low, high) with low < high".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Limits ───────────────────────────────────────────────────────────────

/// Upper bounds on what a single request may carry.
///
/// Requests over either bound are rejected with
/// [`IdpError::RequestTooLarge`]; content is never truncated or split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimits {
    /// Maximum number of `image` blocks. Default: 20.
    pub max_images: usize,
    /// Maximum total bytes across document and image blocks, before base64.
    /// Default: 24 MiB.
    pub max_payload_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_images: 20,
            max_payload_bytes: 24 * 1024 * 1024,
        }
    }
}
