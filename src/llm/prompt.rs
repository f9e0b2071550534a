//! Prompt templates for OCR, chat Q&A, report explanation, and symptom triage.
//!
//! Builders that take dynamic input return owned strings; fixed instructions
//! are consts so callers and tests share one source of truth.

use std::fmt::Write as _;

use uuid::Uuid;

use crate::models::{MedicalRecord, TestResult};

/// Extracted-text budget carried into a report-analysis prompt.
const REPORT_TEXT_LIMIT: usize = 2000;

// ═══════════════════════════════════════════════════════════
// OCR
// ═══════════════════════════════════════════════════════════

pub const OCR_INSTRUCTION: &str = "\
Extract all text and medical information from this medical record image.
Please provide:
1. Patient information (if visible)
2. Test/procedure type
3. Date of test/procedure
4. All test results with values and ranges
5. Findings and observations
6. Diagnosis or impressions
7. Any recommendations

Format the extracted information clearly and completely.";

// ═══════════════════════════════════════════════════════════
// Chat Q&A
// ═══════════════════════════════════════════════════════════

/// System instruction embedding the user's full medical context.
pub fn chat_system_instruction(medical_context: &str) -> String {
    format!(
        "You are a helpful medical AI assistant with access to the user's health records, \
which were extracted from their medical documents using OCR and text processing. Provide accurate, \
personalized answers based on this medical data. Always reference specific values, dates, and record IDs \
when available. Be clear, compassionate, and professional.\n\n\
IMPORTANT: Base your answers ONLY on the medical records provided below. Do not make assumptions \
about data that is not present in the records.\n\n\
{medical_context}\n\n\
When answering:\n\
- Reference specific test results and dates\n\
- Mention record IDs or source files when relevant\n\
- Explain medical terms in simple language\n\
- Suggest when to consult a healthcare provider\n\
- Be honest if information is insufficient\n\
- If you see concerning results, clearly explain why they're concerning"
    )
}

/// Format every stored record into a single context block for the chat
/// system instruction.
pub fn build_medical_context(records: &[MedicalRecord]) -> String {
    if records.is_empty() {
        return "No medical data available.".to_string();
    }

    let mut context = String::from("User's Medical Records:\n\n");
    for (idx, record) in records.iter().enumerate() {
        let _ = write!(
            context,
            "=== Record {n} ===\n\
Record ID: {id}\n\
Source File: {source}\n\
Record Type: {record_type}\n\
Report Date: {report_date}\n\n\
Content:\n{content}\n\n{rule}\n\n",
            n = idx + 1,
            id = record.id,
            source = record.source_file(),
            record_type = record.record_type,
            report_date = record.report_date,
            content = record.extracted_text,
            rule = "=".repeat(50),
        );
    }
    context
}

// ═══════════════════════════════════════════════════════════
// Report explanation
// ═══════════════════════════════════════════════════════════

pub const REPORT_SYSTEM_PROMPT: &str = "\
You are a medical AI assistant that explains lab reports in simple, patient-friendly language.
Analyze the medical report and provide a comprehensive explanation in JSON format.

Your response MUST be valid JSON with this exact structure:
{
  \"simple_summary\": \"2-3 sentence overview in simple language\",
  \"key_findings\": [\"finding 1\", \"finding 2\", \"finding 3\"],
  \"overall_health_score\": number (1-100),
  \"risk_level\": \"LOW or MODERATE or HIGH\",
  \"concerns\": [\"concern 1\", \"concern 2\"],
  \"next_steps\": [\"step 1\", \"step 2\", \"step 3\"]
}

Guidelines:
- Use simple, non-technical language
- Be compassionate and clear
- Focus on actionable insights
- Always recommend consulting a doctor for medical decisions
- Return ONLY valid JSON, no markdown or extra text";

/// User prompt for report analysis. The extracted text is truncated on a
/// char boundary so one oversized report cannot blow the context window.
pub fn report_user_prompt(
    extracted_text: &str,
    parsed_data: &std::collections::BTreeMap<String, TestResult>,
) -> String {
    let truncated: String = extracted_text.chars().take(REPORT_TEXT_LIMIT).collect();

    let mut parsed_summary = String::new();
    for (test_name, data) in parsed_data {
        let _ = writeln!(
            parsed_summary,
            "- {}: {} {} (Status: {})",
            test_name,
            data.value,
            data.unit,
            data.status.as_str()
        );
    }

    format!(
        "Analyze this medical report:\n\n\
EXTRACTED TEXT:\n{truncated}\n\n\
PARSED TEST RESULTS:\n{parsed_summary}\n\
Provide your analysis as valid JSON only."
    )
}

// ═══════════════════════════════════════════════════════════
// Symptom triage
// ═══════════════════════════════════════════════════════════

pub const TRIAGE_SYSTEM_INSTRUCTION: &str = "\
You are a medical AI assistant providing preliminary, non-diagnostic guidance. \
Analyze the user's symptoms and generate a comprehensive assessment strictly in JSON format. \
Your response MUST be valid JSON that conforms to this exact structure:
{
  \"assessment_id\": \"string\",
  \"urgency_level\": \"NORMAL or MODERATE or URGENT\",
  \"urgency_score\": number (1-100),
  \"possible_conditions\": [{\"condition\": \"string\", \"probability\": number (0-100), \"description\": \"string\"}],
  \"recommended_tests\": [\"string\"],
  \"action_items\": [\"string\"],
  \"warning_signs\": [\"string\"],
  \"when_to_seek_care\": \"string\"
}
Do not include any text, markdown, or explanation outside the JSON object. \
Return ONLY valid JSON.";

/// User prompt for triage. The assessment id is pinned so the response can
/// be correlated with the server-generated id regardless of what the model
/// echoes back.
pub fn triage_user_prompt(
    symptoms: &str,
    age: u8,
    gender: &str,
    duration: &str,
    severity: u8,
    assessment_id: Uuid,
) -> String {
    format!(
        "Analyze the following patient data for a symptom assessment:\n\
- Symptoms Description: {symptoms}\n\
- Age: {age} years, Gender: {gender}\n\
- Duration: {duration}\n\
- Severity: {severity}/10\n\n\
The assessment_id field MUST be set to: {assessment_id}\n\n\
Provide your response as a valid JSON object only."
    )
}
