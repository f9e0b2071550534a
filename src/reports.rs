//! AI explanation of a stored record, cached per record id.

use rusqlite::Connection;
use thiserror::Error;

use crate::db::repository::{get_explanation, get_record, upsert_explanation};
use crate::db::DatabaseError;
use crate::llm::normalize::parse_structured;
use crate::llm::prompt::{report_user_prompt, REPORT_SYSTEM_PROMPT};
use crate::llm::{ChatMessage, CompletionOptions, FallbackClient, LlmError};
use crate::models::ReportExplanation;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("record {0} not found")]
    NotFound(String),

    #[error("no text extracted from this record, cannot generate explanation")]
    NoExtractedText,

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Explain a record in patient-friendly terms.
///
/// Explanations are cached: a second call for the same record returns the
/// stored result without touching the model chain. Fields the model omits
/// fall back to neutral defaults rather than failing the whole response.
pub async fn explain_record(
    conn: &mut Connection,
    llm: &FallbackClient,
    record_id: &str,
) -> Result<ReportExplanation, ReportError> {
    let record = get_record(conn, record_id)?
        .ok_or_else(|| ReportError::NotFound(record_id.to_string()))?;

    if let Some(cached) = get_explanation(conn, record_id)? {
        tracing::debug!(record_id, "returning cached explanation");
        return Ok(cached);
    }

    if record.extracted_text.trim().is_empty() {
        return Err(ReportError::NoExtractedText);
    }

    let messages = vec![
        ChatMessage::system(REPORT_SYSTEM_PROMPT),
        ChatMessage::user(report_user_prompt(
            &record.extracted_text,
            &record.parsed_data,
        )),
    ];
    let options = CompletionOptions {
        temperature: 0.7,
        max_tokens: Some(1500),
        json_mode: true,
    };
    let raw = llm.complete(&messages, &options).await?;
    let analysis = parse_structured(&raw)?;

    let explanation = ReportExplanation {
        record_id: record_id.to_string(),
        simple_summary: analysis["simple_summary"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        key_findings: string_list(&analysis["key_findings"]),
        overall_health_score: analysis["overall_health_score"].as_i64().unwrap_or(50),
        risk_level: analysis["risk_level"]
            .as_str()
            .unwrap_or("MODERATE")
            .to_string(),
        concerns: string_list(&analysis["concerns"]),
        next_steps: string_list(&analysis["next_steps"]),
        explanation_generated_at: chrono::Utc::now().to_rfc3339(),
    };

    upsert_explanation(conn, &explanation)?;
    tracing::info!(record_id, risk = %explanation.risk_level, "explanation generated");
    Ok(explanation)
}

/// Lenient string-array extraction: non-arrays and non-string entries are
/// dropped, not errors.
fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
