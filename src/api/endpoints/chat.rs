//! POST /chat/ask — context-aware Q&A over stored records.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PLACEHOLDER_USER_ID};
use crate::chat::{answer_question, ChatAnswer};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Option<String>,
}

pub async fn ask(
    State(ctx): State<ApiContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".into()));
    }

    let mut conn = ctx.open_db()?;
    let answer = answer_question(
        &mut conn,
        &ctx.llm,
        PLACEHOLDER_USER_ID,
        &request.question,
        request.session_id,
    )
    .await?;
    Ok(Json(answer))
}
