//! The reqwest-backed client against a local axum server

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use presigned_upload::transport::{FormUpload, PartUpload, UploadBody};
use presigned_upload::{HttpClient, UploadClient};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn form(body: Bytes) -> impl IntoResponse {
    let text = String::from_utf8_lossy(&body);
    let ok = text.contains("name=\"policy\"")
        && text.contains("name=\"file\"; filename=\"report.csv\"")
        && text.contains("a,b,c")
        && text.find("name=\"policy\"") < text.find("name=\"file\"");
    if ok {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn part(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if length != Some(body.len()) {
        return (StatusCode::LENGTH_REQUIRED, [(header::ETAG, "\"\"")]);
    }
    (StatusCode::OK, [(header::ETAG, "\"part-etag\"")])
}

async fn poll(headers: HeaderMap) -> impl IntoResponse {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("jwt-123") => (
            StatusCode::OK,
            Json(json!({"status": "done", "callbackData": {"ok": true}})),
        ),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"}))),
    }
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "received": body }))
}

async fn serve() -> String {
    let app = Router::new()
        .route("/form", post(form))
        .route("/part", put(part))
        .route("/poll", get(poll))
        .route("/echo", post(echo));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> HttpClient {
    HttpClient::new(Duration::from_secs(10)).unwrap()
}

#[tokio::test]
async fn test_post_form_sends_fields_before_file() {
    let base = serve().await;
    let sent = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&sent);

    let response = client()
        .post_form(
            FormUpload {
                url: format!("{}/form", base),
                fields: vec![("policy".to_string(), "p".to_string())],
                file_field: "file".to_string(),
                file_name: "report.csv".to_string(),
                content_type: "text/csv".to_string(),
                body: UploadBody::Bytes(Bytes::from_static(b"a,b,c\n1,2,3\n")),
            },
            Arc::new(move |n| counter.store(n, Ordering::SeqCst)),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 204);
    assert_eq!(sent.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn test_post_form_streams_file_from_disk() {
    let base = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    std::fs::write(&path, b"a,b,c\n1,2,3\n").unwrap();

    let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = Arc::clone(&reports);
    let response = client()
        .post_form(
            FormUpload {
                url: format!("{}/form", base),
                fields: vec![("policy".to_string(), "p".to_string())],
                file_field: "file".to_string(),
                file_name: "report.csv".to_string(),
                content_type: "text/csv".to_string(),
                body: UploadBody::File { path, len: 12 },
            },
            Arc::new(move |n| seen.lock().unwrap().push(n)),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 204);
    let reports = reports.lock().unwrap().clone();
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reports.last(), Some(&12));
}

#[tokio::test]
async fn test_post_form_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = client()
        .post_form(
            FormUpload {
                url: "http://127.0.0.1:9/form".to_string(),
                fields: Vec::new(),
                file_field: "file".to_string(),
                file_name: "gone.bin".to_string(),
                content_type: "application/octet-stream".to_string(),
                body: UploadBody::File {
                    path: dir.path().join("gone.bin"),
                    len: 4,
                },
            },
            Arc::new(|_| {}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, presigned_upload::UploadError::Io { .. }));
}

#[tokio::test]
async fn test_put_part_reads_etag() {
    let base = serve().await;
    let response = client()
        .put_part(
            PartUpload {
                url: format!("{}/part", base),
                part_number: 1,
                content_type: "application/octet-stream".to_string(),
                content_disposition: Some("inline; filename=\"x\"".to_string()),
                body: Bytes::from(vec![5u8; 100_000]),
            },
            Arc::new(|_| {}),
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.etag.as_deref(), Some("part-etag"));
}

#[tokio::test]
async fn test_get_json_sends_authorization() {
    let base = serve().await;
    let url = format!("{}/poll", base);

    let response = client().get_json(&url, "jwt-123").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json::<Value>().unwrap(),
        json!({"status": "done", "callbackData": {"ok": true}})
    );

    let response = client().get_json(&url, "wrong").await.unwrap();
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_post_json_round_trip() {
    let base = serve().await;
    let response = client()
        .post_json(&format!("{}/echo", base), &json!({"fileKey": "k"}))
        .await
        .unwrap();
    assert_eq!(response.json::<Value>().unwrap(), json!({"received": {"fileKey": "k"}}));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client()
        .get_json(&format!("http://{}/poll", addr), "jwt")
        .await
        .unwrap_err();
    assert!(matches!(err, presigned_upload::UploadError::Network { .. }));
}
