use crate::clock::{Clock, ManualClock, SystemClock};
use crate::delivery::{DeliveryConfig, DeliveryController};
use crate::store::SqlStore;
use crate::{build_app, storage, AppState};
use axum::http::header::{
    ACCESS_CONTROL_EXPOSE_HEADERS, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH,
    CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::*;
use chrono::{DateTime, TimeDelta, Utc};
use filedrop_shared::file::{DeleteResponse, FileListResponse, FileResponse, UploadResponse};
use filedrop_shared::status::{ApiIndex, HealthResponse};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

fn server_for(state: AppState) -> TestServer {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                "filedrop_backend=debug,tower_http=debug",
            ))
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
    let shared_state = Arc::new(state);
    let app: Router = build_app(&shared_state);

    let config = TestServerConfig {
        expect_success_by_default: true,
        ..Default::default()
    };

    TestServer::new_with_config(app, config).unwrap()
}

async fn setup_test_server() -> TestServer {
    server_for(AppState::test().await)
}

async fn setup_test_server_with(
    clock: Arc<ManualClock>,
    config: DeliveryConfig,
) -> TestServer {
    server_for(AppState::test_with(clock, config).await)
}

/// Whole seconds, so timestamps survive the trip through sqlite unchanged.
fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

fn file_form(content: &[u8], filename: &str, mime_type: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec())
            .file_name(filename)
            .mime_type(mime_type),
    )
}

async fn upload(
    server: &TestServer,
    content: &[u8],
    filename: &str,
    mime_type: &str,
) -> UploadResponse {
    let res = server
        .post("/api/files/upload")
        .multipart(file_form(content, filename, mime_type))
        .await;
    res.assert_status(StatusCode::CREATED);
    res.json()
}

#[tokio::test]
async fn test_upload_view_expire_scenario() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = setup_test_server_with(clock.clone(), DeliveryConfig::default()).await;

    let uploaded = upload(&server, b"helloworld", "a.txt", "text/plain").await;
    assert!(uploaded.success);
    assert_eq!(uploaded.file.size, 10);
    assert_eq!(uploaded.file.name, "a.txt");
    assert_eq!(uploaded.file.file_id.as_str().len(), 32);
    let file_id = uploaded.file.file_id.to_string();
    assert!(uploaded
        .file
        .view_url
        .ends_with(&format!("/api/files/view/{}", file_id)));
    assert!(uploaded
        .file
        .download_url
        .ends_with(&format!("/api/files/download/{}", file_id)));

    let res = server.get(&format!("/api/files/view/{}", file_id)).await;
    res.assert_status_ok();
    assert_eq!(res.as_bytes().as_ref(), b"helloworld");
    assert_eq!(res.header(CONTENT_TYPE), "text/plain");
    assert_eq!(res.header(CONTENT_DISPOSITION), "inline; filename=\"a.txt\"");

    info!("moving clock past the TTL");
    clock.advance(TimeDelta::seconds(86_400));

    let res = server
        .get(&format!("/api/files/view/{}", file_id))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::GONE);

    let res = server
        .get(&format!("/api/files/view/{}", file_id))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_framing() {
    let server = setup_test_server().await;

    let png_content = vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    ];
    let uploaded = upload(&server, &png_content, "pixel.png", "image/png").await;
    let file_id = uploaded.file.file_id;
    assert_eq!(uploaded.file.mime_type, "image/png");

    let res = server.get(&format!("/api/files/download/{}", file_id)).await;
    res.assert_status_ok();
    assert_eq!(res.as_bytes().as_ref(), png_content.as_slice());
    assert_eq!(res.header(CONTENT_TYPE), "application/octet-stream");
    assert_eq!(
        res.header(CONTENT_DISPOSITION),
        "attachment; filename=\"pixel.png\""
    );
    assert_eq!(
        res.header(CONTENT_LENGTH),
        png_content.len().to_string().as_str()
    );
    assert_eq!(res.header(HeaderName::from_static("x-content-type-options")), "nosniff");
    assert_eq!(res.header(CACHE_CONTROL), "private, no-transform, max-age=0");

    // view keeps the stored type
    let res = server.get(&format!("/api/files/view/{}", file_id)).await;
    assert_eq!(res.header(CONTENT_TYPE), "image/png");
    assert_eq!(res.as_bytes().as_ref(), png_content.as_slice());
}

#[tokio::test]
async fn test_filename_is_percent_encoded() {
    let server = setup_test_server().await;

    let uploaded = upload(&server, b"%PDF-1.4", "my report (v2).pdf", "application/pdf").await;
    assert_eq!(uploaded.file.name, "my report (v2).pdf");

    let res = server
        .get(&format!("/api/files/view/{}", uploaded.file.file_id))
        .await;
    assert_eq!(
        res.header(CONTENT_DISPOSITION),
        "inline; filename=\"my%20report%20(v2).pdf\""
    );
    assert_eq!(res.header(CONTENT_TYPE), "application/pdf");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let server = setup_test_server().await;

    let form = MultipartForm::new().add_text("filename", "nothing.txt");
    let res = server
        .post("/api/files/upload")
        .multipart(form)
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json();
    assert_eq!(body["error"], "No file uploaded");

    let res = server.get("/api/files").await;
    assert!(res.json::<FileListResponse>().files.is_empty());
}

#[tokio::test]
async fn test_zero_byte_upload() {
    let server = setup_test_server().await;

    let uploaded = upload(&server, b"", "empty.bin", "application/octet-stream").await;
    assert_eq!(uploaded.file.size, 0);

    let res = server
        .get(&format!("/api/files/download/{}", uploaded.file.file_id))
        .await;
    res.assert_status_ok();
    assert!(res.as_bytes().is_empty());
    assert_eq!(res.header(CONTENT_LENGTH), "0");
}

#[tokio::test]
async fn test_upload_too_large() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = setup_test_server_with(
        clock,
        DeliveryConfig {
            max_upload_bytes: 16,
            ..Default::default()
        },
    )
    .await;

    let res = server
        .post("/api/files/upload")
        .multipart(file_form(&[7u8; 32], "big.bin", "application/octet-stream"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

    // at the limit is accepted
    let uploaded = upload(&server, &[7u8; 16], "ok.bin", "application/octet-stream").await;
    assert_eq!(uploaded.file.size, 16);
}

#[tokio::test]
async fn test_pdf_field_alias_and_defaults() {
    let server = setup_test_server().await;

    // no filename or content type on the part
    let form = MultipartForm::new().add_part("pdf", Part::bytes(b"%PDF".to_vec()));
    let res = server.post("/api/files/upload").multipart(form).await;
    res.assert_status(StatusCode::CREATED);
    let uploaded: UploadResponse = res.json();
    assert_eq!(uploaded.file.name, "unnamed");
    assert_eq!(uploaded.file.size, 4);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let server = setup_test_server().await;
    let missing = filedrop_shared::file::FileId::generate();

    for path in [
        format!("/api/files/{}", missing),
        format!("/api/files/view/{}", missing),
        format!("/api/files/download/{}", missing),
        "/api/files/view/not-a-file-id".to_string(),
    ] {
        let res = server.get(&path).expect_failure().await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "GET {}", path);
        let body: serde_json::Value = res.json();
        assert_eq!(body["error"], "File not found");
    }

    let res = server
        .delete(&format!("/api/files/{}", missing))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_newest_first() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = setup_test_server_with(clock.clone(), DeliveryConfig::default()).await;

    let first = upload(&server, b"one", "file1.txt", "text/plain").await;
    clock.advance(TimeDelta::seconds(5));
    let second = upload(&server, b"two!", "file2.txt", "text/plain").await;

    let res = server.get("/api/files").await;
    res.assert_status_ok();
    let listed: FileListResponse = res.json();
    assert!(listed.success);
    assert_eq!(listed.files.len(), 2);
    assert_eq!(listed.files[0], second.file);
    assert_eq!(listed.files[1], first.file);
    assert_eq!(listed.files[1].size, 3);

    // expired entries still show up in the listing
    clock.advance(TimeDelta::days(2));
    let listed: FileListResponse = server.get("/api/files").await.json();
    assert_eq!(listed.files.len(), 2);
}

#[tokio::test]
async fn test_get_metadata() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = setup_test_server_with(clock.clone(), DeliveryConfig::default()).await;

    let uploaded = upload(&server, b"metadata", "meta.txt", "text/plain").await;
    let res = server
        .get(&format!("/api/files/{}", uploaded.file.file_id))
        .await;
    res.assert_status_ok();
    let fetched: FileResponse = res.json();
    assert!(fetched.success);
    assert_eq!(fetched.file, uploaded.file);
    assert_eq!(
        fetched.file.expires_at - fetched.file.uploaded_at,
        TimeDelta::hours(24)
    );

    clock.advance(TimeDelta::hours(25));
    let res = server
        .get(&format!("/api/files/{}", uploaded.file.file_id))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::GONE);
}

#[tokio::test]
async fn test_delete_twice() {
    let server = setup_test_server().await;

    let uploaded = upload(&server, b"short lived", "bye.txt", "text/plain").await;
    let path = format!("/api/files/{}", uploaded.file.file_id);

    let res = server.delete(&path).await;
    res.assert_status_ok();
    let deleted: DeleteResponse = res.json();
    assert!(deleted.success);

    let res = server.delete(&path).expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let res = server
        .get(&format!("/api/files/view/{}", uploaded.file.file_id))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_failure_hides_detail() {
    let conn = storage::start_db(None, Duration::from_secs(5))
        .await
        .expect("Failed to start test DB");
    let store = SqlStore::new(conn.clone(), Duration::from_secs(5));
    conn.close().await.expect("Failed to close pool");

    let server = server_for(AppState {
        controller: DeliveryController::new(
            Arc::new(store),
            Arc::new(SystemClock),
            DeliveryConfig::default(),
        ),
        dev_mode: false,
    });

    let res = server.get("/api/files").expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json();
    assert_eq!(body["error"], "Storage unavailable");

    let res = server
        .post("/api/files/upload")
        .multipart(file_form(b"data", "a.txt", "text/plain"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let res = server.get("/api/health").expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let health: HealthResponse = res.json();
    assert_eq!(health.status, "DEGRADED");
    assert_eq!(health.database, "disconnected");
}

#[tokio::test]
async fn test_cors_exposes_content_disposition() {
    let server = setup_test_server().await;

    let res = server
        .get("/api/files")
        .add_header(ORIGIN, HeaderValue::from_static("http://example.com"))
        .await;
    res.assert_status_ok();
    let exposed = res.header(ACCESS_CONTROL_EXPOSE_HEADERS);
    assert!(exposed
        .to_str()
        .unwrap()
        .to_ascii_lowercase()
        .contains("content-disposition"));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let server = setup_test_server().await;

    let res = server.get("/api/openapi.json").await;
    res.assert_status_ok();
    let doc: serde_json::Value = res.json();
    assert!(doc["paths"]["/api/files/upload"].is_object());
}

#[tokio::test]
async fn test_upload_without_multipart_body() {
    let server = setup_test_server().await;

    let res = server
        .post("/api/files/upload")
        .text("hello")
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(res.header(CONTENT_TYPE), "application/json");
    let body: serde_json::Value = res.json();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_health() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = setup_test_server_with(clock.clone(), DeliveryConfig::default()).await;

    let res = server.get("/api/health").await;
    res.assert_status_ok();
    let health: HealthResponse = res.json();
    assert_eq!(health.status, "OK");
    assert_eq!(health.database, "connected");
    assert_eq!(health.timestamp, clock.now());
}

#[tokio::test]
async fn test_api_index() {
    let server = setup_test_server().await;

    let res = server.get("/").await;
    res.assert_status_ok();
    let index: ApiIndex = res.json();
    assert_eq!(index.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(index.endpoints.upload, "POST /api/files/upload");
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let server = setup_test_server().await;

    for path in ["/nope", "/api/files/view/a/b", "/api/nothing/here"] {
        let res = server.get(path).expect_failure().await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "GET {}", path);
        let body: serde_json::Value = res.json();
        assert_eq!(body["error"], "Endpoint not found");
    }
}
