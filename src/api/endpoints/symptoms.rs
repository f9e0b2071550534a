//! POST /symptoms/analyze — structured preliminary triage.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::symptoms::{analyze_symptoms, SymptomAssessment, SymptomRequest};

pub async fn analyze(
    State(ctx): State<ApiContext>,
    Json(request): Json<SymptomRequest>,
) -> Result<Json<SymptomAssessment>, ApiError> {
    let assessment = analyze_symptoms(&ctx.llm, &request).await?;
    Ok(Json(assessment))
}
