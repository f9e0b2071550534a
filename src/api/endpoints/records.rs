//! Record upload, listing, and detail.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PLACEHOLDER_USER_ID};
use crate::config::MAX_FILE_SIZE_BYTES;
use crate::db::repository::{get_explanation, get_record, insert_record, list_records};
use crate::models::MedicalRecord;
use crate::pipeline::{extract_text, overall_status, parse_lab_values};

const ALLOWED_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

// ──────────────────────────────────────────────
// POST /records/upload
// ──────────────────────────────────────────────

struct UploadForm {
    file_bytes: Vec<u8>,
    file_name: Option<String>,
    content_type: String,
    record_type: String,
    report_date: String,
    lab_name: String,
    notes: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file_bytes = None;
    let mut file_name = None;
    let mut content_type = None;
    let mut record_type = None;
    let mut report_date = None;
    let mut lab_name = None;
    let mut notes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            "record_type" => record_type = Some(read_text(field).await?),
            "report_date" => report_date = Some(read_text(field).await?),
            "lab_name" => lab_name = Some(read_text(field).await?),
            "notes" => notes = Some(read_text(field).await?),
            _ => {}
        }
    }

    let missing =
        |what: &str| ApiError::BadRequest(format!("missing required field: {what}"));
    Ok(UploadForm {
        file_bytes: file_bytes.ok_or_else(|| missing("file"))?,
        file_name,
        content_type: content_type.ok_or_else(|| missing("file content type"))?,
        record_type: record_type.ok_or_else(|| missing("record_type"))?,
        report_date: report_date.ok_or_else(|| missing("report_date"))?,
        lab_name: lab_name.ok_or_else(|| missing("lab_name"))?,
        notes,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart field: {e}")))
}

/// Accept a document, store it, extract and parse its text, and persist
/// the record. Extraction failures degrade to an empty text rather than
/// rejecting the upload — the file itself is still worth keeping.
pub async fn upload(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let form = read_upload_form(multipart).await?;

    if form.file_bytes.len() > MAX_FILE_SIZE_BYTES {
        return Err(ApiError::BadRequest(format!(
            "File size exceeds maximum limit of {}MB.",
            MAX_FILE_SIZE_BYTES / (1024 * 1024)
        )));
    }
    if !ALLOWED_TYPES.contains(&form.content_type.as_str()) {
        return Err(ApiError::BadRequest(
            "Invalid file type. Only PDF, JPG, and PNG are allowed.".to_string(),
        ));
    }
    let report_date = NaiveDate::parse_from_str(&form.report_date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("report_date must be in YYYY-MM-DD format.".into()))?;

    let record_id = Uuid::new_v4().to_string();
    let extension = file_extension(form.file_name.as_deref(), &form.content_type);
    let files_dir = ctx.config.files_dir();
    tokio::fs::create_dir_all(&files_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create storage directory: {e}")))?;
    let file_path = files_dir.join(format!("{record_id}.{extension}"));
    tokio::fs::write(&file_path, &form.file_bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot store uploaded file: {e}")))?;

    let extracted_text = match extract_text(&form.file_bytes, &form.content_type, &ctx.ocr).await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(%record_id, error = %e, "text extraction failed, storing record without text");
            String::new()
        }
    };

    let parsed_data = parse_lab_values(&extracted_text);
    let initial_status = overall_status(&parsed_data);
    let now = chrono::Utc::now().to_rfc3339();

    let record = MedicalRecord {
        id: record_id.clone(),
        user_id: PLACEHOLDER_USER_ID.to_string(),
        record_type: form.record_type,
        report_date: report_date.to_string(),
        lab_name: form.lab_name,
        file_path: file_path.display().to_string(),
        extracted_text: extracted_text.clone(),
        parsed_data: parsed_data.clone(),
        notes: form.notes,
        status: initial_status,
        created_at: now.clone(),
        updated_at: now,
    };

    let conn = ctx.open_db()?;
    if let Err(e) = insert_record(&conn, &record) {
        // The stored file is orphaned if the insert failed
        let _ = tokio::fs::remove_file(&file_path).await;
        return Err(e.into());
    }

    tracing::info!(%record_id, status = initial_status.as_str(), "record uploaded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "record_id": record_id,
            "status": "success",
            "message": "File uploaded and processed successfully",
            "initial_status": initial_status,
            "extracted_text": extracted_text,
            "parsed_data": parsed_data,
        })),
    ))
}

/// File extension from the uploaded name, falling back to the MIME type.
fn file_extension(file_name: Option<&str>, content_type: &str) -> String {
    if let Some(ext) = file_name.and_then(|n| n.rsplit_once('.').map(|(_, e)| e)) {
        if !ext.is_empty() {
            return ext.to_ascii_lowercase();
        }
    }
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.last())
        .map(|e| e.to_string())
        .unwrap_or_else(|| "pdf".to_string())
}

// ──────────────────────────────────────────────
// GET /records
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub record_type: Option<String>,
}

fn default_limit() -> i64 {
    10
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = ctx.open_db()?;
    let (records, total) = list_records(
        &conn,
        PLACEHOLDER_USER_ID,
        query.limit,
        query.offset,
        query.record_type.as_deref(),
    )?;
    Ok(Json(json!({
        "total": total,
        "records": records,
    })))
}

// ──────────────────────────────────────────────
// GET /records/:record_id
// ──────────────────────────────────────────────

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(record_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = ctx.open_db()?;
    let record = get_record(&conn, &record_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Record with ID {record_id} not found.")))?;

    let analysis = get_explanation(&conn, &record_id)?.map(|e| {
        json!({
            "simple_summary": e.simple_summary,
            "key_findings": e.key_findings,
            "overall_health_score": e.overall_health_score,
            "risk_level": e.risk_level,
            "concerns": e.concerns,
            "next_steps": e.next_steps,
        })
    });

    Ok(Json(json!({
        "record_id": record.id,
        "record_type": record.record_type,
        "report_date": record.report_date,
        "lab_name": record.lab_name,
        "extracted_text": record.extracted_text,
        "parsed_data": record.parsed_data,
        "analysis": analysis,
    })))
}
