//! The model fallback chain.
//!
//! Models are tried strictly in configuration order, one attempt each, no
//! backoff. The first attempt whose transport succeeds and whose body
//! carries a completion wins immediately; if every attempt fails the
//! caller gets the full ordered failure list.

use std::sync::Arc;
use std::time::Duration;

use super::transport::{ChatTransport, ProviderRequest};
use super::types::{supports_json_output, ChatMessage, CompletionOptions};
use super::{LlmError, ProviderFailure};

/// Timeout for text-only requests.
const TEXT_TIMEOUT_SECS: u64 = 60;
/// Timeout for requests carrying embedded images.
const IMAGE_TIMEOUT_SECS: u64 = 90;

pub struct FallbackClient {
    transport: Arc<dyn ChatTransport>,
    models: Vec<String>,
}

impl FallbackClient {
    pub fn new(transport: Arc<dyn ChatTransport>, models: Vec<String>) -> Self {
        Self { transport, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Run the fallback chain and return the winning model's raw text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::EmptyRequest);
        }

        let timeout = request_timeout(messages);
        let mut attempts: Vec<ProviderFailure> = Vec::new();

        for model in &self.models {
            let body = build_payload(model, messages, options);
            tracing::debug!(%model, "trying completion model");

            match self.transport.send(ProviderRequest { body, timeout }).await {
                Ok(response) => match extract_content(&response) {
                    Ok(content) => {
                        tracing::info!(%model, "completion succeeded");
                        return Ok(content);
                    }
                    Err(reason) => {
                        tracing::warn!(%model, %reason, "model returned unusable body");
                        attempts.push(ProviderFailure {
                            model: model.clone(),
                            error: reason,
                        });
                    }
                },
                Err(e) => {
                    tracing::warn!(%model, error = %e, "model attempt failed");
                    attempts.push(ProviderFailure {
                        model: model.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(LlmError::AllModelsExhausted { attempts })
    }
}

/// 90s when any message embeds an image, 60s otherwise.
fn request_timeout(messages: &[ChatMessage]) -> Duration {
    if messages.iter().any(ChatMessage::has_image) {
        Duration::from_secs(IMAGE_TIMEOUT_SECS)
    } else {
        Duration::from_secs(TEXT_TIMEOUT_SECS)
    }
}

fn build_payload(
    model: &str,
    messages: &[ChatMessage],
    options: &CompletionOptions,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": options.temperature,
        "stream": false,
    });
    if let Some(max_tokens) = options.max_tokens {
        payload["max_tokens"] = max_tokens.into();
    }
    // The structured-output directive is a capability, not a guarantee:
    // attach it only to models known to accept it.
    if options.json_mode && supports_json_output(model) {
        payload["response_format"] = serde_json::json!({"type": "json_object"});
    }
    payload
}

/// Pull the first completion's message content out of a response body.
fn extract_content(response: &serde_json::Value) -> Result<String, String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "response missing choices[0].message.content".to_string())
}
