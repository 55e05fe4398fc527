//! Router tests driven through `tower::ServiceExt::oneshot`.

#![cfg(unix)]

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use http_body_util::BodyExt;
use qp2pdf::{router, ServiceConfig};
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn post_convert(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn root_lists_endpoints() {
    let (status, _, body) = send(router(ServiceConfig::default()), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["message"], "LaTeX to PDF Converter API");
    assert_eq!(body["endpoints"], serde_json::json!(["/convert", "/health"]));
}

#[tokio::test]
async fn health_is_healthy() {
    let (status, _, body) = send(router(ServiceConfig::default()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn question_paper_returns_pdf_attachment() {
    let tools = FakeTools::new();
    tools.engine("lualatex", ENGINE_OK);

    let (status, headers, body) = send(
        router(tools.config()),
        post_convert(question_paper_json().to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=QP1.pdf");
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn unknown_engine_is_400_without_invocations() {
    let tools = FakeTools::new();
    tools.engine("pdflatex", ENGINE_OK);

    let (status, _, body) = send(
        router(tools.config()),
        post_convert(markup_json("unknown").to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json(&body);
    assert_eq!(body["kind"], "invalid_input");
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("unknown"));
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn malformed_json_is_400() {
    let (status, _, body) = send(router(ServiceConfig::default()), post_convert("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["kind"], "invalid_input");
}

#[tokio::test]
async fn compile_failure_is_422_with_diagnostics() {
    let tools = FakeTools::new();
    tools.engine("pdflatex", ENGINE_ALWAYS_FAILS);

    let (status, _, body) = send(
        router(tools.config()),
        post_convert(markup_json("pdflatex").to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(&body);
    assert_eq!(body["kind"], "compilation_failure");
    assert!(body["error"].as_str().unwrap().contains("Undefined control sequence"));
}

#[tokio::test]
async fn timeout_is_408() {
    let tools = FakeTools::new();
    tools.engine("pdflatex", ENGINE_HANGS);
    let config = ServiceConfig::builder()
        .tools(tools.locator())
        .markup_timeout_secs(1)
        .build()
        .unwrap();

    let (status, _, body) = send(router(config), post_convert(markup_json("pdflatex").to_string())).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json(&body)["kind"], "timeout");
}

#[tokio::test]
async fn missing_engine_is_500() {
    let tools = FakeTools::new();
    let (status, _, body) = send(
        router(tools.config()),
        post_convert(markup_json("lualatex").to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["kind"], "internal_fault");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://exams.example.edu")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(router(ServiceConfig::default()), request).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
