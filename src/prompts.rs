//! Prompts for field extraction.
//!
//! The system instruction is fixed. The extraction prompt (the leading `text`
//! block of every request) is resolved once per invocation from, in order:
//!
//! 1. the secure parameter store,
//! 2. the environment-level override ([`crate::config::ExtractionConfig::env_prompt`]),
//! 3. [`DEFAULT_EXTRACTION_PROMPT`].
//!
//! The first non-empty value wins.

use serde::Serialize;
use std::fmt;

/// Built-in extraction prompt used when nothing overrides it.
pub const DEFAULT_EXTRACTION_PROMPT: &str =
    "Extract the fields as JSON document, no other filler words, newline character are required in the output";

/// System instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "Your response should be in JSON format.
Do not include any explanations, only provide a RFC8259 compliant JSON response without deviation.
Respond with exactly one JSON object.
Do not include markdown code blocks in your response.";

/// Where the extraction prompt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PromptSource {
    ParameterStore,
    Environment,
    Default,
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromptSource::ParameterStore => "parameter store",
            PromptSource::Environment => "environment",
            PromptSource::Default => "built-in default",
        })
    }
}

/// The extraction prompt for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub text: String,
    pub source: PromptSource,
}

/// Pick the first non-empty prompt. Whitespace-only values count as empty.
pub fn resolve_prompt(parameter: Option<&str>, environment: Option<&str>) -> ResolvedPrompt {
    let non_empty = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);

    if let Some(text) = non_empty(parameter) {
        ResolvedPrompt {
            text,
            source: PromptSource::ParameterStore,
        }
    } else if let Some(text) = non_empty(environment) {
        ResolvedPrompt {
            text,
            source: PromptSource::Environment,
        }
    } else {
        ResolvedPrompt {
            text: DEFAULT_EXTRACTION_PROMPT.to_string(),
            source: PromptSource::Default,
        }
    }
}
