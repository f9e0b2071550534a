//! POST /records/explain — patient-friendly explanation of one record.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::ReportExplanation;
use crate::reports::explain_record;

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub record_id: String,
}

pub async fn explain(
    State(ctx): State<ApiContext>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ReportExplanation>, ApiError> {
    let mut conn = ctx.open_db()?;
    let explanation = explain_record(&mut conn, &ctx.llm, &request.record_id).await?;
    Ok(Json(explanation))
}
