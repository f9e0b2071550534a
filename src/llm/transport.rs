//! Opaque HTTP capability: POST a JSON payload, get a JSON body or a
//! typed failure, within a bounded timeout.
//!
//! The trait keeps the fallback loop testable — `MockTransport` scripts
//! outcomes and records every request it sees.

use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned an unreadable body: {0}")]
    MalformedBody(String),
}

/// One provider call: the JSON payload plus its deadline.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub body: serde_json::Value,
    pub timeout: Duration,
}

pub trait ChatTransport: Send + Sync {
    /// POST the payload to the chat-completions endpoint and return the
    /// parsed JSON response body.
    fn send(
        &self,
        request: ProviderRequest,
    ) -> BoxFuture<'_, Result<serde_json::Value, TransportError>>;
}

// ──────────────────────────────────────────────
// Production transport (reqwest)
// ──────────────────────────────────────────────

/// Maximum upstream error body carried in a `Status` failure.
const ERROR_BODY_LIMIT: usize = 300;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Timeouts are per-request (set by the caller), not on the client.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl ChatTransport for HttpTransport {
    fn send(
        &self,
        request: ProviderRequest,
    ) -> BoxFuture<'_, Result<serde_json::Value, TransportError>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let timeout_secs = request.timeout.as_secs();

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("HTTP-Referer", "http://localhost:3000")
                .header("X-Title", crate::config::APP_NAME)
                .timeout(request.timeout)
                .json(&request.body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        TransportError::Timeout(timeout_secs)
                    } else {
                        TransportError::Network(e.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(ERROR_BODY_LIMIT).collect(),
                });
            }

            response
                .json()
                .await
                .map_err(|e| TransportError::MalformedBody(e.to_string()))
        })
    }
}

// ──────────────────────────────────────────────
// Mock transport for tests
// ──────────────────────────────────────────────

/// Scripted transport: pops one pre-seeded outcome per call and records
/// every request for assertions.
pub struct MockTransport {
    outcomes: std::sync::Mutex<std::collections::VecDeque<Result<serde_json::Value, TransportError>>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            outcomes: std::sync::Mutex::new(std::collections::VecDeque::new()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn push_failure(self, error: TransportError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Seed a transport-success body with the standard
    /// `choices[0].message.content` shape.
    pub fn push_success_text(self, content: &str) -> Self {
        let body = serde_json::json!({
            "choices": [{"message": {"content": content}}]
        });
        self.push_success_body(body)
    }

    pub fn push_success_body(self, body: serde_json::Value) -> Self {
        self.outcomes.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatTransport for MockTransport {
    fn send(
        &self,
        request: ProviderRequest,
    ) -> BoxFuture<'_, Result<serde_json::Value, TransportError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(TransportError::Network("no scripted response".to_string()))
                })
        })
    }
}
