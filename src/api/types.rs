//! Shared API context passed to every handler.

use std::sync::Arc;

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::llm::{
    ChatTransport, FallbackClient, HttpTransport, DEFAULT_TEXT_MODELS, DEFAULT_VISION_MODELS,
};

/// Stand-in for the authenticated user until accounts exist.
pub const PLACEHOLDER_USER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Everything a request handler needs: configuration plus the two model
/// chains (text for chat/reports/triage, vision for image OCR). Both
/// chains share one transport.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub llm: Arc<FallbackClient>,
    pub ocr: Arc<FallbackClient>,
}

impl ApiContext {
    pub fn new(config: AppConfig) -> Self {
        let transport: Arc<dyn ChatTransport> =
            Arc::new(HttpTransport::new(&config.base_url, &config.api_key));
        Self::with_transport(config, transport)
    }

    /// Build a context over an arbitrary transport. Tests inject a
    /// `MockTransport` here.
    pub fn with_transport(config: AppConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let text_models = DEFAULT_TEXT_MODELS.iter().map(|m| m.to_string()).collect();
        let vision_models = DEFAULT_VISION_MODELS
            .iter()
            .map(|m| m.to_string())
            .collect();
        Self {
            config: Arc::new(config),
            llm: Arc::new(FallbackClient::new(transport.clone(), text_models)),
            ocr: Arc::new(FallbackClient::new(transport, vision_models)),
        }
    }

    /// Open a fresh database connection.
    ///
    /// Connections are per-operation so no SQLite handle is ever held
    /// across an outbound model call.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        open_database(&self.config.db_path())
    }
}
