//! Record, explanation, and chat-history queries.
//!
//! All functions take a `&Connection`; callers open connections per
//! operation so no lock is held across network calls.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{MedicalRecord, RecordStatus, RecordSummary, ReportExplanation};

use super::DatabaseError;

/// One prior turn of a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

// ──────────────────────────────────────────────
// Medical records
// ──────────────────────────────────────────────

pub fn insert_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    let parsed_json = serde_json::to_string(&record.parsed_data)
        .expect("parsed lab values always serialize");
    conn.execute(
        "INSERT INTO medical_records
             (id, user_id, record_type, report_date, lab_name, file_path,
              extracted_text, parsed_data, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id,
            record.user_id,
            record.record_type,
            record.report_date,
            record.lab_name,
            record.file_path,
            record.extracted_text,
            parsed_json,
            record.notes,
            record.status.as_str(),
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

/// List records for a user, newest report first, with total count for
/// pagination.
pub fn list_records(
    conn: &Connection,
    user_id: &str,
    limit: i64,
    offset: i64,
    record_type: Option<&str>,
) -> Result<(Vec<RecordSummary>, i64), DatabaseError> {
    let total: i64 = match record_type {
        Some(rt) => conn.query_row(
            "SELECT COUNT(*) FROM medical_records WHERE user_id = ?1 AND record_type = ?2",
            params![user_id, rt],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM medical_records WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?,
    };

    let mut summaries = Vec::new();
    let mut push_row = |row: &Row| -> rusqlite::Result<()> {
        summaries.push(RecordSummary {
            record_id: row.get("id")?,
            record_type: row.get("record_type")?,
            report_date: row.get("report_date")?,
            lab_name: row.get("lab_name")?,
            status: parse_status(&row.get::<_, String>("status")?),
            created_at: row.get("created_at")?,
        });
        Ok(())
    };

    match record_type {
        Some(rt) => {
            let mut stmt = conn.prepare(
                "SELECT id, record_type, report_date, lab_name, status, created_at
                 FROM medical_records
                 WHERE user_id = ?1 AND record_type = ?2
                 ORDER BY report_date DESC, created_at DESC
                 LIMIT ?3 OFFSET ?4",
            )?;
            let mut rows = stmt.query(params![user_id, rt, limit, offset])?;
            while let Some(row) = rows.next()? {
                push_row(row)?;
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, record_type, report_date, lab_name, status, created_at
                 FROM medical_records
                 WHERE user_id = ?1
                 ORDER BY report_date DESC, created_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let mut rows = stmt.query(params![user_id, limit, offset])?;
            while let Some(row) = rows.next()? {
                push_row(row)?;
            }
        }
    }

    Ok((summaries, total))
}

pub fn get_record(
    conn: &Connection,
    record_id: &str,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let record = conn
        .query_row(
            "SELECT id, user_id, record_type, report_date, lab_name, file_path,
                    extracted_text, parsed_data, notes, status, created_at, updated_at
             FROM medical_records WHERE id = ?1",
            params![record_id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

/// All records for a user, newest report first. Used to build chat context.
pub fn all_records(conn: &Connection, user_id: &str) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, record_type, report_date, lab_name, file_path,
                extracted_text, parsed_data, notes, status, created_at, updated_at
         FROM medical_records
         WHERE user_id = ?1
         ORDER BY report_date DESC, created_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_record)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn row_to_record(row: &Row) -> rusqlite::Result<MedicalRecord> {
    let parsed_json: String = row.get("parsed_data")?;
    Ok(MedicalRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        record_type: row.get("record_type")?,
        report_date: row.get("report_date")?,
        lab_name: row.get("lab_name")?,
        file_path: row.get("file_path")?,
        extracted_text: row.get("extracted_text")?,
        parsed_data: serde_json::from_str(&parsed_json).unwrap_or_default(),
        notes: row.get("notes")?,
        status: parse_status(&row.get::<_, String>("status")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Unknown status strings degrade to NORMAL rather than failing the read.
fn parse_status(value: &str) -> RecordStatus {
    RecordStatus::parse(value).unwrap_or_else(|| {
        tracing::warn!(value, "unknown record status in database");
        RecordStatus::Normal
    })
}

// ──────────────────────────────────────────────
// Report explanations
// ──────────────────────────────────────────────

/// Insert or replace the explanation for a record.
pub fn upsert_explanation(
    conn: &Connection,
    explanation: &ReportExplanation,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO report_explanations
             (record_id, simple_summary, key_findings, overall_health_score,
              risk_level, concerns, next_steps, explanation_generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            explanation.record_id,
            explanation.simple_summary,
            serde_json::to_string(&explanation.key_findings).expect("string list serializes"),
            explanation.overall_health_score,
            explanation.risk_level,
            serde_json::to_string(&explanation.concerns).expect("string list serializes"),
            serde_json::to_string(&explanation.next_steps).expect("string list serializes"),
            explanation.explanation_generated_at,
        ],
    )?;
    Ok(())
}

pub fn get_explanation(
    conn: &Connection,
    record_id: &str,
) -> Result<Option<ReportExplanation>, DatabaseError> {
    let explanation = conn
        .query_row(
            "SELECT record_id, simple_summary, key_findings, overall_health_score,
                    risk_level, concerns, next_steps, explanation_generated_at
             FROM report_explanations WHERE record_id = ?1",
            params![record_id],
            |row| {
                let key_findings: String = row.get("key_findings")?;
                let concerns: String = row.get("concerns")?;
                let next_steps: String = row.get("next_steps")?;
                Ok(ReportExplanation {
                    record_id: row.get("record_id")?,
                    simple_summary: row.get("simple_summary")?,
                    key_findings: serde_json::from_str(&key_findings).unwrap_or_default(),
                    overall_health_score: row.get("overall_health_score")?,
                    risk_level: row.get("risk_level")?,
                    concerns: serde_json::from_str(&concerns).unwrap_or_default(),
                    next_steps: serde_json::from_str(&next_steps).unwrap_or_default(),
                    explanation_generated_at: row.get("explanation_generated_at")?,
                })
            },
        )
        .optional()?;
    Ok(explanation)
}

// ──────────────────────────────────────────────
// Chat history
// ──────────────────────────────────────────────

pub fn insert_chat_message(
    conn: &Connection,
    session_id: &str,
    role: &str,
    content: &str,
    referenced_records: &[String],
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (session_id, role, content, referenced_records, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session_id,
            role,
            content,
            serde_json::to_string(referenced_records).expect("string list serializes"),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Prior turns of a session, oldest first.
pub fn get_conversation_history(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<ChatTurn>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM chat_messages WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok(ChatTurn {
            role: row.get("role")?,
            content: row.get("content")?,
        })
    })?;
    let mut turns = Vec::new();
    for row in rows {
        turns.push(row?);
    }
    Ok(turns)
}
