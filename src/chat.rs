//! Context-aware chat over the user's stored records.
//!
//! Every question is answered against the full record set: the extracted
//! text of each record is embedded into the system instruction, prior turns
//! of the session are replayed, and the answer is post-processed for
//! references, confidence, and follow-up suggestions.

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{
    all_records, get_conversation_history, insert_chat_message,
};
use crate::db::DatabaseError;
use crate::llm::prompt::{build_medical_context, chat_system_instruction};
use crate::llm::{ChatMessage, CompletionOptions, FallbackClient, LlmError};
use crate::models::MedicalRecord;

/// Referencing heuristic: more than this many shared words between a
/// record's text and the answer counts as a reference.
const WORD_OVERLAP_THRESHOLD: usize = 5;
/// At most this many follow-up suggestions per answer.
const MAX_FOLLOW_UPS: usize = 4;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no medical records available to answer from")]
    NoRecords,

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub referenced_records: Vec<String>,
    pub confidence_score: f64,
    pub follow_up_suggestions: Vec<String>,
    pub session_id: String,
}

/// Answer a question against the user's records.
///
/// A missing `session_id` starts a fresh session; both the question and
/// the answer are persisted under it either way.
pub async fn answer_question(
    conn: &mut Connection,
    llm: &FallbackClient,
    user_id: &str,
    question: &str,
    session_id: Option<String>,
) -> Result<ChatAnswer, ChatError> {
    let records = all_records(conn, user_id)?;
    if records.is_empty() {
        return Err(ChatError::NoRecords);
    }

    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let history = get_conversation_history(conn, &session_id)?;

    let context = build_medical_context(&records);
    let mut messages = vec![ChatMessage::system(chat_system_instruction(&context))];
    for turn in &history {
        match turn.role.as_str() {
            "assistant" => messages.push(ChatMessage::assistant(&turn.content)),
            _ => messages.push(ChatMessage::user(&turn.content)),
        }
    }
    messages.push(ChatMessage::user(question));

    let answer = llm
        .complete(&messages, &CompletionOptions::default())
        .await?;

    let referenced = extract_referenced_records(&answer, &records);
    let confidence = calculate_confidence(&records, &answer);
    let follow_ups = generate_follow_ups(&records);

    insert_chat_message(conn, &session_id, "user", question, &[])?;
    insert_chat_message(conn, &session_id, "assistant", &answer, &referenced)?;

    tracing::info!(
        %session_id,
        referenced = referenced.len(),
        confidence,
        "chat answer generated"
    );

    Ok(ChatAnswer {
        answer,
        referenced_records: referenced,
        confidence_score: confidence,
        follow_up_suggestions: follow_ups,
        session_id,
    })
}

/// Which records does the answer appear to draw on?
///
/// A record counts as referenced when its id or source file name appears
/// in the answer, or when the answer shares enough words with its text.
fn extract_referenced_records(answer: &str, records: &[MedicalRecord]) -> Vec<String> {
    let answer_lower = answer.to_lowercase();
    let answer_words: std::collections::HashSet<&str> = answer_lower.split_whitespace().collect();

    let mut referenced = Vec::new();
    for record in records {
        if answer_lower.contains(&record.id.to_lowercase()) {
            referenced.push(record.id.clone());
            continue;
        }
        if answer_lower.contains(&record.source_file().to_lowercase()) {
            referenced.push(record.id.clone());
            continue;
        }

        let content_lower = record.extracted_text.to_lowercase();
        let content_words: std::collections::HashSet<&str> =
            content_lower.split_whitespace().collect();
        if content_words.intersection(&answer_words).count() > WORD_OVERLAP_THRESHOLD {
            referenced.push(record.id.clone());
        }
    }
    referenced
}

/// Heuristic confidence in [0.1, 1.0] from surface features of the answer.
fn calculate_confidence(records: &[MedicalRecord], answer: &str) -> f64 {
    const UNCERTAIN_PHRASES: &[&str] = &[
        "may",
        "might",
        "possibly",
        "unclear",
        "uncertain",
        "don't have enough",
        "cannot determine",
        "insufficient data",
        "would need more",
        "consult with",
        "speak to your doctor",
    ];
    const MEDICAL_TERMS: &[&str] = &[
        "diagnosis",
        "test result",
        "level",
        "range",
        "normal",
        "abnormal",
    ];

    let mut confidence: f64 = 0.3;
    if !records.is_empty() {
        confidence += 0.3;
    }
    if answer.chars().any(|c| c.is_ascii_digit()) {
        confidence += 0.2;
    }

    let answer_lower = answer.to_lowercase();
    if UNCERTAIN_PHRASES.iter().any(|p| answer_lower.contains(p)) {
        confidence -= 0.25;
    }
    if MEDICAL_TERMS.iter().any(|t| answer_lower.contains(t)) {
        confidence += 0.15;
    }

    confidence.clamp(0.1, 1.0)
}

fn generate_follow_ups(records: &[MedicalRecord]) -> Vec<String> {
    let mut suggestions = Vec::new();
    if !records.is_empty() {
        suggestions.push("Can you explain the most recent test results?".to_string());
        suggestions.push("What do these findings mean for my health?".to_string());
    }
    suggestions.extend(
        [
            "What lifestyle changes should I consider based on this data?",
            "Are there any concerning trends in my records?",
            "What should I discuss with my doctor about these results?",
            "When should I schedule my next check-up?",
        ]
        .map(String::from),
    );
    suggestions.truncate(MAX_FOLLOW_UPS);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_record;
    use crate::db::sqlite::open_memory_database;
    use crate::llm::transport::MockTransport;
    use crate::models::RecordStatus;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn record(id: &str, text: &str) -> MedicalRecord {
        MedicalRecord {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            record_type: "lab_report".to_string(),
            report_date: "2025-06-01".to_string(),
            lab_name: "City Lab".to_string(),
            file_path: format!("/data/files/{id}.pdf"),
            extracted_text: text.to_string(),
            parsed_data: BTreeMap::new(),
            notes: None,
            status: RecordStatus::Normal,
            created_at: "2025-06-01T09:00:00Z".to_string(),
            updated_at: "2025-06-01T09:00:00Z".to_string(),
        }
    }

    fn client(transport: Arc<MockTransport>) -> FallbackClient {
        FallbackClient::new(transport, vec!["zhipuai/glm-4-plus".to_string()])
    }

    #[tokio::test]
    async fn no_records_fails_before_any_model_call() {
        let mut conn = open_memory_database().unwrap();
        let transport = Arc::new(MockTransport::new());
        let llm = client(transport.clone());

        let err = answer_question(&mut conn, &llm, "user-1", "How am I doing?", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NoRecords));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn answer_carries_context_and_persists_both_turns() {
        let mut conn = open_memory_database().unwrap();
        insert_record(&conn, &record("rec-1", "Blood Sugar: 130 mg/dL")).unwrap();

        let transport = Arc::new(
            MockTransport::new()
                .push_success_text("Your Blood Sugar level of 130 mg/dL in rec-1 is elevated."),
        );
        let llm = client(transport.clone());

        let result = answer_question(&mut conn, &llm, "user-1", "Is my sugar high?", None)
            .await
            .unwrap();

        assert!(result.answer.contains("elevated"));
        assert_eq!(result.referenced_records, vec!["rec-1".to_string()]);
        assert_eq!(result.follow_up_suggestions.len(), 4);

        // System instruction embeds the record content
        let body = &transport.requests()[0].body;
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("Blood Sugar: 130 mg/dL"));
        assert!(system.contains("Record ID: rec-1"));

        // Both turns are stored under the generated session
        let history = get_conversation_history(&conn, &result.session_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn existing_session_replays_history() {
        let mut conn = open_memory_database().unwrap();
        insert_record(&conn, &record("rec-1", "Cholesterol: 180 mg/dL")).unwrap();
        insert_chat_message(&conn, "sess-1", "user", "What was my cholesterol?", &[]).unwrap();
        insert_chat_message(&conn, "sess-1", "assistant", "It was 180 mg/dL.", &[]).unwrap();

        let transport = Arc::new(MockTransport::new().push_success_text("Still fine."));
        let llm = client(transport.clone());

        let result = answer_question(
            &mut conn,
            &llm,
            "user-1",
            "Has it changed?",
            Some("sess-1".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(result.session_id, "sess-1");

        let messages = transport.requests()[0].body["messages"]
            .as_array()
            .unwrap()
            .clone();
        // system + 2 history turns + new question
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "Has it changed?");
    }

    #[tokio::test]
    async fn model_exhaustion_propagates_without_persisting() {
        let mut conn = open_memory_database().unwrap();
        insert_record(&conn, &record("rec-1", "Cholesterol: 180 mg/dL")).unwrap();

        let transport = Arc::new(MockTransport::new());
        let llm = client(transport);

        let err = answer_question(&mut conn, &llm, "user-1", "Hello?", Some("s".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Llm(LlmError::AllModelsExhausted { .. })));
        assert!(get_conversation_history(&conn, "s").unwrap().is_empty());
    }

    #[test]
    fn reference_detection_by_id_file_and_overlap() {
        let records = vec![
            record("alpha", "unique words nowhere else"),
            record("beta", "completely different things"),
            record("gamma", "shared tokens one two three four five six seven"),
        ];

        // by id
        let refs = extract_referenced_records("see record alpha for details", &records);
        assert_eq!(refs, vec!["alpha".to_string()]);

        // by source file
        let refs = extract_referenced_records("as shown in beta.pdf", &records);
        assert_eq!(refs, vec!["beta".to_string()]);

        // by word overlap (> 5 shared words)
        let refs = extract_referenced_records(
            "the shared tokens one two three four five six are notable",
            &records,
        );
        assert_eq!(refs, vec!["gamma".to_string()]);
    }

    #[test]
    fn confidence_rewards_specifics_and_penalizes_hedging() {
        let records = vec![record("r", "text")];

        // records + digits + medical term: 0.3 + 0.3 + 0.2 + 0.15
        let high = calculate_confidence(&records, "Your test result is 130, above the range.");
        assert!((high - 0.95).abs() < 1e-9);

        // hedged answer loses 0.25
        let hedged = calculate_confidence(&records, "It might be fine, consult with a doctor.");
        assert!((hedged - 0.35).abs() < 1e-9);

        let floor = calculate_confidence(&[], "possibly unclear");
        assert!((floor - 0.1).abs() < 1e-9);
    }

    #[test]
    fn follow_ups_capped_at_four() {
        let with_records = generate_follow_ups(&[record("r", "text")]);
        assert_eq!(with_records.len(), 4);
        assert!(with_records[0].contains("most recent test results"));

        let without = generate_follow_ups(&[]);
        assert_eq!(without.len(), 4);
        assert!(without[0].contains("lifestyle changes"));
    }
}
