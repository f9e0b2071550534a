//! Domain types shared across the pipeline, storage, and API layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overall severity classification for a parsed value or a whole record.
///
/// Ordering matters: `Urgent > Monitor > Normal`, so a record's overall
/// status is the maximum over its parsed values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    #[default]
    Normal,
    Monitor,
    Urgent,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Normal => "NORMAL",
            RecordStatus::Monitor => "MONITOR",
            RecordStatus::Urgent => "URGENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NORMAL" => Some(RecordStatus::Normal),
            "MONITOR" => Some(RecordStatus::Monitor),
            "URGENT" => Some(RecordStatus::Urgent),
            _ => None,
        }
    }
}

/// A single parsed lab value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub value: f64,
    pub unit: String,
    /// `[low, high]` when a rule supplied one; empty for unrecognized tests.
    pub normal_range: Vec<f64>,
    pub status: RecordStatus,
}

/// Full stored medical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: String,
    pub user_id: String,
    pub record_type: String,
    /// ISO date (`YYYY-MM-DD`), validated at upload.
    pub report_date: String,
    pub lab_name: String,
    pub file_path: String,
    pub extracted_text: String,
    pub parsed_data: BTreeMap<String, TestResult>,
    pub notes: Option<String>,
    pub status: RecordStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl MedicalRecord {
    /// File name of the stored source document.
    pub fn source_file(&self) -> &str {
        std::path::Path::new(&self.file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file_path)
    }
}

/// Listing row returned by `GET /records`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub record_id: String,
    pub record_type: String,
    pub report_date: String,
    pub lab_name: String,
    pub status: RecordStatus,
    pub created_at: String,
}

/// AI-generated explanation of one record, cached per record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExplanation {
    pub record_id: String,
    pub simple_summary: String,
    pub key_findings: Vec<String>,
    pub overall_health_score: i64,
    pub risk_level: String,
    pub concerns: Vec<String>,
    pub next_steps: Vec<String>,
    pub explanation_generated_at: String,
}
