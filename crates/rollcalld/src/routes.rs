//! HTTP surface of the daemon: the upload form, a health probe, and the
//! upload endpoint itself.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::Engine as _;
use rollcall_core::{FaceEngine, MatchHit};
use rollcall_roster::ReferenceStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>rollcall</title></head>
<body>
  <h1>rollcall</h1>
  <form action="/upload" method="post" enctype="multipart/form-data">
    <p><input type="file" name="image" accept="image/*"></p>
    <p><button type="submit">Upload</button></p>
  </form>
</body>
</html>
"#;

/// Shared, read-only-after-startup request state. The engine itself needs a
/// lock because ONNX sessions run with exclusive access.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<dyn FaceEngine>>,
    pub store: Arc<ReferenceStore>,
    pub tolerance: f32,
}

#[derive(Debug)]
pub enum ApiError {
    NoImage,
    InvalidBase64,
    NoFaceDetected,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoImage => (StatusCode::BAD_REQUEST, "No image provided".to_string()),
            ApiError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "Invalid base64 image data".to_string())
            }
            ApiError::NoFaceDetected => (
                StatusCode::BAD_REQUEST,
                "No faces detected in uploaded image".to_string(),
            ),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "upload processing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize)]
struct FaceResult {
    face_index: usize,
    location: [u32; 4],
    matches: Vec<MatchHit>,
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    faces_detected: usize,
    results: Vec<FaceResult>,
}

#[derive(Deserialize)]
struct UploadForm {
    image_base64: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/upload", post(upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "roster_members": state.store.len(),
        "enrolled": state.store.enrolled_count(),
    }))
}

/// `POST /upload` — one image per request, as a multipart `image` file or an
/// `image_base64` form field. Every detected face is matched against the
/// reference store at the process-wide tolerance.
async fn upload(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    let image_bytes = extract_image(request).await?;

    let engine = state.engine.clone();
    let faces = tokio::task::spawn_blocking(move || {
        let mut engine = match engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        engine.detect_and_embed(&image_bytes)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("inference task failed: {e}")))?
    .map_err(|e| ApiError::Internal(format!("face pipeline failed: {e}")))?;

    if faces.is_empty() {
        return Err(ApiError::NoFaceDetected);
    }

    let results = faces
        .iter()
        .enumerate()
        .map(|(face_index, face)| FaceResult {
            face_index,
            location: face.location.as_array(),
            matches: state.store.matches_for(&face.embedding, state.tolerance),
        })
        .collect();

    Ok(Json(UploadResponse {
        status: "Processed",
        faces_detected: faces.len(),
        results,
    }))
}

/// Pull the probe image out of the request body.
///
/// A multipart body may carry the raw bytes in `image` (which wins) or a
/// base64 string in `image_base64`; a urlencoded body may carry
/// `image_base64` only. Anything else is a missing image.
async fn extract_image(request: Request) -> Result<Vec<u8>, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| ApiError::NoImage)?;

        let mut base64_field: Option<String> = None;
        while let Some(field) = multipart.next_field().await.map_err(|_| ApiError::NoImage)? {
            match field.name() {
                Some("image") => {
                    let bytes = field.bytes().await.map_err(|_| ApiError::NoImage)?;
                    return Ok(bytes.to_vec());
                }
                Some("image_base64") => {
                    base64_field = Some(field.text().await.map_err(|_| ApiError::NoImage)?);
                }
                _ => {}
            }
        }

        match base64_field {
            Some(text) => decode_base64_image(&text),
            None => Err(ApiError::NoImage),
        }
    } else {
        let Form(form) = Form::<UploadForm>::from_request(request, &())
            .await
            .map_err(|_| ApiError::NoImage)?;
        match form.image_base64 {
            Some(text) => decode_base64_image(&text),
            None => Err(ApiError::NoImage),
        }
    }
}

/// Decode a base64 image string, stripping an optional
/// `data:image/...;base64,` header first.
fn decode_base64_image(text: &str) -> Result<Vec<u8>, ApiError> {
    let payload = if text.starts_with("data:image") {
        text.split_once(',').map(|(_, rest)| rest).unwrap_or(text)
    } else {
        text
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::InvalidBase64)
}
