use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wonderbot::prompts::ASSISTANT;
use wonderbot::web_server::{
    build_router, handle_client_event, AnalysisResponse, AppState, ClientEvent, NoticeBody, ServerEvent,
};
use wonderbot::{BackendConfig, CompletionDispatcher, ModelSelection, OpenAiBackend, Session};

fn dispatcher(base_url: &str) -> CompletionDispatcher {
    let backend = OpenAiBackend::new(BackendConfig::new(format!("{}/v1", base_url), "sk-test")).unwrap();
    CompletionDispatcher::new(Arc::new(backend), ModelSelection::default())
}

fn test_server(base_url: &str) -> TestServer {
    TestServer::new(build_router(AppState::new(dispatcher(base_url), &ASSISTANT))).unwrap()
}

// Nothing listens here; tests using it never reach the backend.
const OFFLINE: &str = "http://127.0.0.1:1";

#[tokio::test]
async fn test_index_renders_tabs_and_products() {
    let server = test_server(OFFLINE);
    let response = server.get("/").await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(ASSISTANT.title));
    assert!(html.contains("Material Calculator"));
    assert!(html.contains("Wonder Xtreme"));
    assert!(html.contains("Construction Material Storage"));
    assert!(html.contains(r#"<option value="luxury">Luxury</option>"#));
    assert!(html.contains("1800-180-6677"));
    assert!(html.contains("Current Offers"));
    assert!(html.contains("Bulk order discounts"));
    assert!(html.contains("Site visit assistance"));
}

#[tokio::test]
async fn test_static_files() {
    let server = test_server(OFFLINE);
    server.get("/static/app.js").await.assert_status_ok();
    server.get("/static/missing.js").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_estimate_endpoint() {
    let server = test_server(OFFLINE);
    let response = server
        .post("/api/estimate")
        .json(&json!({
            "project_type": "residential",
            "floors": 1,
            "total_area": 1000,
            "construction_grade": "premium"
        }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["total_cement_bags"], 400.0);
    assert_eq!(body["materials"][0]["material"], "Wonder PPC Cement");
    assert_eq!(body["materials"][0]["quantity"], "400 bags");
    assert_eq!(body["materials"][0]["cost"], "140,000");
    assert_eq!(body["timeline"][1]["cement_bags"], "160");
    assert_eq!(body["timeline"][3]["cement_bags"], "N/A");
}

#[tokio::test]
async fn test_estimate_rejects_out_of_range_input() {
    let server = test_server(OFFLINE);
    let response = server
        .post("/api/estimate")
        .json(&json!({
            "project_type": "commercial",
            "floors": 2,
            "total_area": 50,
            "construction_grade": "basic"
        }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let notice: NoticeBody = response.json();
    assert!(notice.detail.contains("100 sq ft"));
}

#[tokio::test]
async fn test_analyze_upload() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 500})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "1. Overall Design Assessment: good light"}}]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let server = test_server(&backend.uri());
    let form = MultipartForm::new().add_part(
        "design",
        Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]).file_name("plan.jpg").mime_type("image/jpeg"),
    );
    let response = server.post("/api/analyze").multipart(form).await;
    response.assert_status_ok();

    let body: AnalysisResponse = response.json();
    assert!(body.analysis.starts_with("1. Overall Design Assessment"));
    assert_eq!(body.next_steps.len(), ASSISTANT.analysis_next_steps.len());
    assert_eq!(body.helpline, "1800-180-6677");
}

#[tokio::test]
async fn test_analyze_accepts_photo_sized_upload() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "1. Overall Design Assessment: wide frontage"}}]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let server = test_server(&backend.uri());
    let mut photo = vec![0u8; 3 * 1024 * 1024];
    photo[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    let form = MultipartForm::new().add_part("design", Part::bytes(photo).file_name("site.jpg").mime_type("image/jpeg"));
    let response = server.post("/api/analyze").multipart(form).await;
    response.assert_status_ok();

    let body: AnalysisResponse = response.json();
    assert!(body.analysis.contains("wide frontage"));
}

#[tokio::test]
async fn test_analyze_without_file_is_bad_request() {
    let server = test_server(OFFLINE);
    let form = MultipartForm::new().add_text("comment", "no file here");
    let response = server.post("/api/analyze").multipart(form).expect_failure().await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_with_backend_down_is_bad_gateway() {
    let server = test_server(OFFLINE);
    let form = MultipartForm::new().add_part("design", Part::bytes(vec![1, 2, 3]).file_name("plan.jpg"));
    let response = server.post("/api/analyze").multipart(form).expect_failure().await;
    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_chat_event_over_real_backend() {
    let backend = MockServer::start().await;
    let chunk = json!({"choices": [{"index": 0, "delta": {"content": "Hello!"}}]});
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(format!("data: {}\n\ndata: [DONE]\n\n", chunk), "text/event-stream"))
        .expect(1)
        .mount(&backend)
        .await;

    let mut session = Session::start(dispatcher(&backend.uri()), &ASSISTANT);
    let (mut tx, rx) = mpsc::unbounded();
    handle_client_event(&mut session, ClientEvent::Chat { text: "hi".to_string() }, &mut tx)
        .await
        .unwrap();
    drop(tx);

    let events: Vec<ServerEvent> = rx.collect().await;
    assert_eq!(
        events,
        vec![
            ServerEvent::Partial { text: "Hello!▌".to_string() },
            ServerEvent::Complete { text: "Hello!".to_string() },
        ]
    );
    assert_eq!(session.messages().len(), 3);
}
