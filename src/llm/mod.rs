//! Fallback-chained completion client and response normalization.
//!
//! The client owns a fixed ordered list of model identifiers and tries them
//! strictly in order against an opaque [`transport::ChatTransport`]; the
//! first transport-success with a readable body wins. Normalization strips
//! code fences and parses structured output with bounded diagnostics.

pub mod client;
pub mod normalize;
pub mod prompt;
pub mod transport;
pub mod types;

pub use client::FallbackClient;
pub use transport::{ChatTransport, HttpTransport, ProviderRequest, TransportError};
pub use types::{ChatMessage, CompletionOptions, ContentPart, MessageContent, Role};

use thiserror::Error;

/// One failed model attempt, recorded while the chain continues.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub model: String,
    pub error: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion request has no messages")]
    EmptyRequest,

    /// Every configured model failed. Carries the full ordered attempt list;
    /// the display keeps the original "Last error" shape.
    #[error("All models failed. Last error: {}", last_failure(.attempts))]
    AllModelsExhausted { attempts: Vec<ProviderFailure> },

    /// Transport succeeded but the text was not valid structured output.
    /// The snippet is capped at 1000 characters.
    #[error("AI returned malformed JSON. Raw response (truncated): {snippet}")]
    MalformedOutput { snippet: String },
}

fn last_failure(attempts: &[ProviderFailure]) -> String {
    attempts
        .last()
        .map(ProviderFailure::to_string)
        .unwrap_or_else(|| "no models configured".to_string())
}

/// Text chain used for chat, report explanation, and symptom triage.
pub const DEFAULT_TEXT_MODELS: &[&str] = &[
    "zhipuai/glm-4-plus",
    "zhipuai/glm-4-0520",
    "zhipuai/glm-4",
    "openai/gpt-4o",
    "openai/gpt-3.5-turbo",
];

/// Vision chain used for image OCR.
pub const DEFAULT_VISION_MODELS: &[&str] = &[
    "openai/gpt-4o",
    "openai/gpt-4-turbo",
    "anthropic/claude-3.5-sonnet",
];
