//! Symptom triage: structured preliminary assessment of free-text symptoms.
//!
//! Unlike report explanation, the assessment schema is strict — a response
//! missing required fields is malformed output, not something to paper
//! over with defaults. The assessment id is generated server-side and
//! pinned in the prompt so the stored id never depends on model output.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::llm::normalize::{bounded_snippet, parse_structured};
use crate::llm::prompt::{triage_user_prompt, TRIAGE_SYSTEM_INSTRUCTION};
use crate::llm::{ChatMessage, CompletionOptions, FallbackClient, LlmError};

const MAX_AGE: u8 = 120;

#[derive(Debug, Error)]
pub enum SymptomError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymptomRequest {
    pub symptoms: String,
    pub age: u8,
    pub gender: String,
    pub duration: String,
    pub severity: u8,
}

impl SymptomRequest {
    fn validate(&self) -> Result<(), SymptomError> {
        if self.symptoms.trim().is_empty() {
            return Err(SymptomError::InvalidInput(
                "symptoms description must not be empty".to_string(),
            ));
        }
        if self.age > MAX_AGE {
            return Err(SymptomError::InvalidInput(format!(
                "age must be at most {MAX_AGE}"
            )));
        }
        if !(1..=10).contains(&self.severity) {
            return Err(SymptomError::InvalidInput(
                "severity must be between 1 and 10".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossibleCondition {
    pub condition: String,
    pub probability: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymptomAssessment {
    pub assessment_id: String,
    pub urgency_level: String,
    pub urgency_score: i64,
    pub possible_conditions: Vec<PossibleCondition>,
    pub recommended_tests: Vec<String>,
    pub action_items: Vec<String>,
    pub warning_signs: Vec<String>,
    pub when_to_seek_care: String,
}

/// Model-produced assessment before the server-side id is applied.
/// Every field is required; `deny_unknown_fields` is deliberately absent
/// since models often add commentary fields.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    urgency_level: String,
    urgency_score: i64,
    possible_conditions: Vec<PossibleCondition>,
    recommended_tests: Vec<String>,
    action_items: Vec<String>,
    warning_signs: Vec<String>,
    when_to_seek_care: String,
}

/// Analyze symptoms into a structured triage assessment.
pub async fn analyze_symptoms(
    llm: &FallbackClient,
    request: &SymptomRequest,
) -> Result<SymptomAssessment, SymptomError> {
    request.validate()?;

    let assessment_id = Uuid::new_v4();
    let messages = vec![
        ChatMessage::system(TRIAGE_SYSTEM_INSTRUCTION),
        ChatMessage::user(triage_user_prompt(
            &request.symptoms,
            request.age,
            &request.gender,
            &request.duration,
            request.severity,
            assessment_id,
        )),
    ];
    let options = CompletionOptions {
        temperature: 0.7,
        max_tokens: Some(2000),
        json_mode: true,
    };
    let raw = llm.complete(&messages, &options).await?;
    let value = parse_structured(&raw)?;

    let parsed: RawAssessment =
        serde_json::from_value(value).map_err(|_| LlmError::MalformedOutput {
            snippet: bounded_snippet(&raw),
        })?;

    if !(1..=100).contains(&parsed.urgency_score) {
        return Err(SymptomError::Llm(LlmError::MalformedOutput {
            snippet: bounded_snippet(&raw),
        }));
    }

    tracing::info!(
        %assessment_id,
        urgency = %parsed.urgency_level,
        score = parsed.urgency_score,
        "symptom assessment generated"
    );

    Ok(SymptomAssessment {
        assessment_id: assessment_id.to_string(),
        urgency_level: parsed.urgency_level,
        urgency_score: parsed.urgency_score,
        possible_conditions: parsed.possible_conditions,
        recommended_tests: parsed.recommended_tests,
        action_items: parsed.action_items,
        warning_signs: parsed.warning_signs,
        when_to_seek_care: parsed.when_to_seek_care,
    })
}
