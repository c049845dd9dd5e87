// tests/http_routes.rs

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use scantest::engine::{SessionCore, spawn_session};
use scantest::engine::core::UNKNOWN_TEST_MESSAGE;
use scantest::files::ScanStore;
use scantest::fs::mock::MockFileSystem;
use scantest::types::ProcessRole;
use scantest_test_utils::builders::ConfigFileBuilder;
use scantest_test_utils::fake_launcher::FakeLauncher;
use scantest_test_utils::init_tracing;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> (Router, FakeLauncher) {
    init_tracing();
    let cfg = ConfigFileBuilder::new().grace_period("50ms").build();
    let launcher = FakeLauncher::new();
    let (session, _task) = spawn_session(SessionCore::from_config(&cfg), launcher.clone());

    let fs = MockFileSystem::new();
    fs.add_file_at("output_scans/old.csv", "old", 10);
    fs.add_file_at("output_scans/new.csv", "new scan", 20);
    let store = ScanStore::open(Arc::new(fs), "output_scans").expect("open store");

    let router = scantest::http::router(scantest::http::AppState {
        session,
        store: Arc::new(store),
    });
    (router, launcher)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    let value = serde_json::from_slice(&body).expect("json body");
    (status, value)
}

#[tokio::test]
async fn submit_then_poll_round_trip() {
    let (app, launcher) = app();

    let (status, body) = get_json(&app, "/component_testing/submit_test_request?test=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "submittedTestRequest": true,
            "testParams": { "test": "1" },
            "outcome": "started"
        })
    );

    let test = launcher.launches_of(ProcessRole::Test)[0].id;
    launcher
        .stdout(test, r#"{"type":"update","status":"running","msg":"homing","step":3}"#)
        .await;

    let (status, body) = get_json(&app, "/component_testing/request_update").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "type": "update", "status": "running", "msg": "homing", "step": 3 }])
    );

    let (_, body) = get_json(&app, "/component_testing/request_update").await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn second_submit_reports_busy() {
    let (app, launcher) = app();

    get_json(&app, "/component_testing/submit_test_request?test=0").await;
    let (status, body) = get_json(&app, "/component_testing/submit_test_request?test=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submittedTestRequest"], json!(false));
    assert_eq!(body["outcome"], json!("busy"));
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn unknown_test_is_reported_through_updates() {
    let (app, launcher) = app();

    let (_, body) = get_json(&app, "/component_testing/submit_test_request?test=banana").await;
    assert_eq!(body["outcome"], json!("rejected"));

    let (_, body) = get_json(&app, "/component_testing/request_update").await;
    assert_eq!(
        body,
        json!([{ "type": "update", "status": "failed", "msg": UNKNOWN_TEST_MESSAGE }])
    );
    assert!(launcher.launches().is_empty());
}

#[tokio::test]
async fn scan_files_are_listed_newest_first() {
    let (app, _) = app();
    let (status, body) = get_json(&app, "/file_manager/request_scan_files").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "files": ["new.csv", "old.csv"] }));
}

#[tokio::test]
async fn delete_file_returns_updated_listing() {
    let (app, _) = app();

    let (status, body) = get_json(&app, "/file_manager/delete_file?file=old.csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "deleted": true, "file": "old.csv", "updatedFileList": ["new.csv"] })
    );

    let (status, _) = get_json(&app, "/file_manager/delete_file?file=old.csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/file_manager/delete_file?file=..").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_streams_file_as_attachment() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(
            Request::get("/file_manager/download_file/new.csv")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"new.csv\""
    );
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&body[..], b"new scan");

    let (status, _) = get(&app, "/file_manager/download_file/missing.csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/file_manager/download_file/nested/new.csv").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_reports_whether_the_rig_is_held() {
    let (app, launcher) = app();

    let (status, body) = get_json(&app, "/component_testing/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "busy": false, "activeTest": null, "liveProcesses": 0, "cleanupAlarms": [] })
    );

    get_json(&app, "/component_testing/submit_test_request?test=2").await;
    let test = launcher.launches_of(ProcessRole::Test)[0].id;

    let (_, body) = get_json(&app, "/component_testing/status").await;
    assert_eq!(body["busy"], json!(true));
    assert_eq!(body["activeTest"], json!(test.0));
    assert_eq!(body["liveProcesses"], json!(1));
}
