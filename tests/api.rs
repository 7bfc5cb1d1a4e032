//! End-to-end tests over the HTTP surface, using a shell-script stand-in
//! for the Java renderer.

#![cfg(unix)]

use std::num::NonZeroU32;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use plantd::application::health::HealthProbe;
use plantd::application::render::RenderService;
use plantd::config::{RendererSettings, ResponseMode};
use plantd::domain::DiagramFormat;
use plantd::infra::http::{AppState, build_router};

const RENDER_OK: &str = r#"#!/bin/sh
set -eu
if [ "${1:-}" = "-version" ]; then
  printf 'openjdk version "21.0.2"\n' >&2
  exit 0
fi
fmt=""
input=""
for arg in "$@"; do
  case "$arg" in
    -t*) fmt="${arg#-t}" ;;
    *) input="$arg" ;;
  esac
done
out="${input%.uml}.$fmt"
printf '<svg xmlns="http://www.w3.org/2000/svg">ok</svg>' > "$out"
"#;

const RENDER_FAIL: &str = r#"#!/bin/sh
if [ "${1:-}" = "-version" ]; then
  printf 'openjdk version "21.0.2"\n' >&2
  exit 0
fi
printf 'Syntax Error?some diagram description here' >&2
exit 200
"#;

struct Gateway {
    router: Router,
    temp_dir: PathBuf,
    _dir: TempDir,
}

fn gateway(script_body: &str, mode: ResponseMode) -> Gateway {
    let dir = TempDir::new().expect("temp dir");

    let script = dir.path().join("fake-java");
    std::fs::write(&script, script_body).expect("write script");
    let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("set perms");

    let jar_dir = dir.path().join("jars");
    std::fs::create_dir_all(&jar_dir).expect("jar dir");
    std::fs::write(jar_dir.join("plantuml.jar"), b"jar").expect("jar");

    let settings = RendererSettings {
        java_path: script.clone(),
        jar_dir,
        jar_name: "plantuml.jar".to_string(),
        temp_dir: dir.path().join("temp"),
        default_format: DiagramFormat::Svg,
        response_mode: mode,
        max_concurrency: NonZeroU32::new(4).expect("nonzero"),
        timeout: Duration::from_secs(5),
    };

    let render = Arc::new(RenderService::from_settings(&settings).expect("service"));
    let health = Arc::new(HealthProbe::new(script, settings.jar_dir.join("plantuml.jar")));

    Gateway {
        router: build_router(AppState { render, health }),
        temp_dir: dir.path().join("temp"),
        _dir: dir,
    }
}

async fn post_generate(router: &Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json: Value = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

#[tokio::test]
async fn generate_returns_a_fresh_file_id() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);

    let (status, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"svg"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["format"], "svg");
    let file_id = body["file_id"].as_str().expect("file_id present");
    uuid::Uuid::parse_str(file_id).expect("file_id is a uuid");
}

#[tokio::test]
async fn preview_is_repeatable_and_typed() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);
    let (_, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"svg"}"#,
    )
    .await;
    let file_id = body["file_id"].as_str().expect("file_id");

    let first = get(&gateway.router, &format!("/preview/{file_id}.svg")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        first
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("content type"),
        "image/svg+xml"
    );
    let first_bytes = first.into_body().collect().await.expect("body").to_bytes();
    assert!(first_bytes.starts_with(b"<svg"), "svg prologue expected");

    let second = get(&gateway.router, &format!("/preview/{file_id}.svg")).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_bytes = second.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(first_bytes, second_bytes, "preview must not consume");
}

#[tokio::test]
async fn download_is_single_use() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);
    let (_, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"svg"}"#,
    )
    .await;
    let file_id = body["file_id"].as_str().expect("file_id");

    let first = get(&gateway.router, &format!("/download/{file_id}.svg")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let disposition = first
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .expect("attachment header")
        .to_str()
        .expect("header text")
        .to_string();
    assert!(disposition.starts_with("attachment;"), "{disposition}");
    assert!(disposition.contains(&format!("{file_id}.svg")));

    let second = get(&gateway.router, &format!("/download/{file_id}.svg")).await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    let bytes = second.into_body().collect().await.expect("body").to_bytes();
    let json: Value = serde_json::from_slice(&bytes).expect("error envelope");
    assert_eq!(json["success"], Value::Bool(false));
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn empty_and_missing_code_are_rejected() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);

    let (status, body) = post_generate(&gateway.router, r#"{"code":"","format":"svg"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], Value::Bool(false));

    let (status, body) = post_generate(&gateway.router, r#"{"format":"png"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], Value::Bool(false));
}

#[tokio::test]
async fn unknown_format_is_rejected_before_any_work() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);

    let (status, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\n@enduml","format":"../../etc/passwd"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], Value::Bool(false));

    let leftovers: Vec<_> = std::fs::read_dir(&gateway.temp_dir)
        .expect("temp dir listing")
        .collect();
    assert!(leftovers.is_empty(), "rejected formats must not touch disk");
}

#[tokio::test]
async fn renderer_stderr_is_returned_verbatim() {
    let gateway = gateway(RENDER_FAIL, ResponseMode::TwoPhase);

    let (status, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nbroken","format":"svg"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["error"], "Syntax Error?some diagram description here");

    let leftovers: Vec<_> = std::fs::read_dir(&gateway.temp_dir)
        .expect("temp dir listing")
        .collect();
    assert!(leftovers.is_empty(), "failed renders must not leak files");
}

#[tokio::test]
async fn inline_mode_embeds_the_artifact() {
    let gateway = gateway(RENDER_OK, ResponseMode::Inline);

    let (status, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"svg"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], Value::Bool(true));
    let content = body["content"].as_str().expect("raw svg content");
    assert!(content.starts_with("<svg"));
    assert!(body.get("encoding").is_none());

    let (status, body) = post_generate(
        &gateway.router,
        r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"png"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["encoding"], "base64");
    assert!(body["content"].is_string());
}

#[tokio::test]
async fn health_reports_status_without_failing() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);
    let response = get(&gateway.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["external_runtime_available"], Value::Bool(true));
    assert_eq!(json["renderer_artifact_present"], Value::Bool(true));
    assert!(
        json["external_runtime_version"]
            .as_str()
            .expect("version")
            .contains("openjdk")
    );
}

#[tokio::test]
async fn health_degrades_when_runtime_and_jar_are_absent() {
    let dir = TempDir::new().expect("temp dir");
    let settings = RendererSettings {
        java_path: dir.path().join("no-such-java"),
        jar_dir: dir.path().join("jars"),
        jar_name: "plantuml.jar".to_string(),
        temp_dir: dir.path().join("temp"),
        default_format: DiagramFormat::Svg,
        response_mode: ResponseMode::TwoPhase,
        max_concurrency: NonZeroU32::new(1).expect("nonzero"),
        timeout: Duration::from_secs(5),
    };
    let render = Arc::new(RenderService::from_settings(&settings).expect("service"));
    let health = Arc::new(HealthProbe::new(
        settings.java_path.clone(),
        settings.jar_path(),
    ));
    let router = build_router(AppState { render, health });

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["external_runtime_available"], Value::Bool(false));
    assert_eq!(json["external_runtime_version"], Value::Null);
    assert_eq!(json["renderer_artifact_present"], Value::Bool(false));
}

#[tokio::test]
async fn concurrent_generates_yield_distinct_coexisting_artifacts() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let router = gateway.router.clone();
        handles.push(tokio::spawn(async move {
            post_generate(
                &router,
                r#"{"code":"@startuml\nAlice->Bob\n@enduml","format":"svg"}"#,
            )
            .await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let (status, body) = handle.await.expect("join");
        assert_eq!(status, StatusCode::OK);
        let file_id = body["file_id"].as_str().expect("file_id").to_string();
        assert!(ids.insert(file_id), "ids must be pairwise distinct");
    }

    // Every artifact pair must still be on disk before any retrieval.
    let entries = std::fs::read_dir(&gateway.temp_dir)
        .expect("temp dir listing")
        .count();
    assert_eq!(entries, ids.len() * 2, "inputs and outputs must coexist");

    for id in &ids {
        let response = get(&gateway.router, &format!("/preview/{id}.svg")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn preview_of_unknown_artifact_is_not_found() {
    let gateway = gateway(RENDER_OK, ResponseMode::TwoPhase);
    let id = uuid::Uuid::new_v4();
    let response = get(&gateway.router, &format!("/preview/{id}.svg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
