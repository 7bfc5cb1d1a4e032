use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{
    HeaderValue, StatusCode,
    header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::application::render::{GenerateOutcome, Retrieved};
use crate::domain::DiagramFormat;

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub code: String,
    pub format: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .render
        .generate(&request.code, request.format.as_deref())
        .await
        .map_err(|err| ApiError::from_render_error("infra::http::generate", err))?;

    let body = match outcome {
        GenerateOutcome::TwoPhase { file_id, format } => json!({
            "success": true,
            "file_id": file_id,
            "format": format,
        }),
        GenerateOutcome::InlineText { content, format } => json!({
            "success": true,
            "content": content,
            "format": format,
        }),
        GenerateOutcome::InlineBinary { content, format } => json!({
            "success": true,
            "content": content,
            "encoding": "base64",
            "format": format,
        }),
    };

    Ok(Json(body))
}

pub async fn preview(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let (id, format) = parse_artifact_name("infra::http::preview", &name)?;
    let retrieved = state
        .render
        .preview(id, format)
        .await
        .map_err(|err| ApiError::from_render_error("infra::http::preview", err))?;
    Ok(build_artifact_response(retrieved, false))
}

pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let (id, format) = parse_artifact_name("infra::http::download", &name)?;
    let retrieved = state
        .render
        .download(id, format)
        .await
        .map_err(|err| ApiError::from_render_error("infra::http::download", err))?;
    Ok(build_artifact_response(retrieved, true))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.health.check().await;
    Json(json!(report))
}

/// Split `{file_id}.{format}` and validate both halves. The format must be
/// allow-listed before anything touches the filesystem; an id that is not a
/// UUID can never name an artifact.
fn parse_artifact_name(
    source: &'static str,
    name: &str,
) -> Result<(Uuid, DiagramFormat), ApiError> {
    let Some((id, extension)) = name.rsplit_once('.') else {
        return Err(ApiError::bad_request(
            source,
            "expected `{file_id}.{format}`",
        ));
    };

    let format = extension
        .parse::<DiagramFormat>()
        .map_err(|err| ApiError::bad_request(source, err.to_string()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| ApiError::not_found(source, "artifact not found"))?;

    Ok((id, format))
}

fn build_artifact_response(retrieved: Retrieved, as_attachment: bool) -> Response {
    let Retrieved {
        body,
        format,
        file_name,
    } = retrieved;

    let mut response = Response::new(Body::from(body.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format.content_type()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&body.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    if as_attachment
        && let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
    {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    response
}
