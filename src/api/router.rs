//! API router.
//!
//! Returns a composable `Router` with all endpoints nested under
//! `/api/v1/`. CORS is permissive — the browser frontend runs on a
//! different origin in development.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::config::MAX_FILE_SIZE_BYTES;

/// Build the API router.
///
/// The body limit sits above the documented 10 MB upload cap so oversized
/// files reach the handler's own check and get a structured 400 rather
/// than a bare 413.
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/records/upload", post(endpoints::records::upload))
        .route("/records", get(endpoints::records::list))
        .route("/records/explain", post(endpoints::reports::explain))
        .route("/records/:record_id", get(endpoints::records::detail))
        .route("/chat/ask", post(endpoints::chat::ask))
        .route("/symptoms/analyze", post(endpoints::symptoms::analyze))
        .with_state(ctx);

    Router::new()
        .nest("/api/v1", routes)
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE_BYTES + 2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::api::types::PLACEHOLDER_USER_ID;
    use crate::config::AppConfig;
    use crate::db::repository::insert_record;
    use crate::llm::transport::MockTransport;
    use crate::models::{MedicalRecord, RecordStatus};

    fn test_context(
        storage: &std::path::Path,
        transport: MockTransport,
    ) -> (ApiContext, Arc<MockTransport>) {
        let config = AppConfig::from_lookup(|key| match key {
            "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
            "MEDICLEAR_STORAGE_DIR" => Some(storage.display().to_string()),
            _ => None,
        })
        .unwrap();
        let transport = Arc::new(transport);
        let ctx = ApiContext::with_transport(config, transport.clone());
        (ctx, transport)
    }

    fn stored_record(id: &str) -> MedicalRecord {
        MedicalRecord {
            id: id.to_string(),
            user_id: PLACEHOLDER_USER_ID.to_string(),
            record_type: "lab_report".to_string(),
            report_date: "2025-06-01".to_string(),
            lab_name: "City Lab".to_string(),
            file_path: format!("/tmp/files/{id}.pdf"),
            extracted_text: "Blood Sugar: 130 mg/dL".to_string(),
            parsed_data: std::collections::BTreeMap::new(),
            notes: None,
            status: RecordStatus::Urgent,
            created_at: "2025-06-01T09:00:00Z".to_string(),
            updated_at: "2025-06-01T09:00:00Z".to_string(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Hand-built multipart body: one file part plus the metadata fields.
    fn multipart_upload(
        file_name: &str,
        content_type: &str,
        file_bytes: &[u8],
        report_date: &str,
    ) -> Request<Body> {
        let boundary = "X-TEST-BOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file_bytes);
        for (name, value) in [
            ("record_type", "lab_report"),
            ("report_date", report_date),
            ("lab_name", "City Lab"),
        ] {
            body.extend_from_slice(
                format!(
                    "\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/records/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_response_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = Request::builder()
            .uri("/api/v1/records")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["total"], 0);
        assert_eq!(json["records"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_record_detail_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = Request::builder()
            .uri("/api/v1/records/no-such-id")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn explain_unknown_record_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/records/explain",
            serde_json::json!({"record_id": "missing"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn explain_exhausted_models_is_502() {
        let tmp = tempfile::tempdir().unwrap();
        // No scripted outcomes: every model attempt fails
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let conn = ctx.open_db().unwrap();
        insert_record(&conn, &stored_record("r1")).unwrap();
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/records/explain",
            serde_json::json!({"record_id": "r1"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM_FAILED");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("All models failed"));
    }

    #[tokio::test]
    async fn chat_without_records_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, transport) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/chat/ask",
            serde_json::json!({"question": "How am I doing?"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn chat_empty_question_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/chat/ask",
            serde_json::json!({"question": "   "}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_answers_from_stored_records() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(
            tmp.path(),
            MockTransport::new().push_success_text("Your sugar is 130, which is high."),
        );
        let conn = ctx.open_db().unwrap();
        insert_record(&conn, &stored_record("r1")).unwrap();
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/chat/ask",
            serde_json::json!({"question": "Is my sugar high?"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert!(json["answer"].as_str().unwrap().contains("130"));
        assert!(!json["session_id"].as_str().unwrap().is_empty());
        assert!(json["confidence_score"].as_f64().unwrap() > 0.0);
        assert_eq!(json["follow_up_suggestions"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn symptoms_invalid_age_is_400_without_model_call() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, transport) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = json_request(
            "POST",
            "/api/v1/symptoms/analyze",
            serde_json::json!({
                "symptoms": "headache",
                "age": 130,
                "gender": "male",
                "duration": "2 days",
                "severity": 5
            }),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = multipart_upload("notes.txt", "text/plain", b"hello", "2025-06-01");
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = response_json(response).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Only PDF, JPG, and PNG"));
    }

    #[tokio::test]
    async fn upload_rejects_malformed_report_date() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = multipart_upload("r.pdf", "application/pdf", b"%PDF-", "June 1st 2025");
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = response_json(response).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn upload_survives_failed_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let files_dir = ctx.config.files_dir();
        let app = api_router(ctx.clone());

        // Declared as PDF but unparseable: the record is still stored,
        // just without text.
        let req = multipart_upload("broken.pdf", "application/pdf", b"not a pdf", "2025-06-01");
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["initial_status"], "NORMAL");
        assert_eq!(json["extracted_text"], "");
        let record_id = json["record_id"].as_str().unwrap();

        // File landed in storage and the record is queryable
        assert!(files_dir.join(format!("{record_id}.pdf")).exists());
        let conn = ctx.open_db().unwrap();
        let (records, total) =
            crate::db::repository::list_records(&conn, PLACEHOLDER_USER_ID, 10, 0, None).unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].record_id, record_id);
    }

    #[tokio::test]
    async fn upload_image_extracts_and_parses_labs() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, transport) = test_context(
            tmp.path(),
            MockTransport::new().push_success_text("Blood Sugar: 130 mg/dL"),
        );
        let app = api_router(ctx);

        let req = multipart_upload("scan.png", "image/png", &[0x89, 0x50, 0x4E, 0x47], "2025-06-01");
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["initial_status"], "URGENT");
        assert_eq!(json["parsed_data"]["Blood Sugar"]["value"], 130.0);
        assert_eq!(json["parsed_data"]["Blood Sugar"]["status"], "URGENT");

        // OCR went through the vision chain
        assert_eq!(transport.request_count(), 1);
        assert_eq!(
            transport.requests()[0].body["model"],
            "openai/gpt-4o"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = test_context(tmp.path(), MockTransport::new());
        let app = api_router(ctx);

        let req = Request::builder()
            .uri("/api/v1/nonexistent")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
