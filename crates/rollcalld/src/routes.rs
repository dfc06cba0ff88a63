//! HTTP surface: thin glue between axum and the engine thread / roster /
//! attendance log.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbImage;
use rollcall_core::recognizer::UNKNOWN;
use rollcall_core::roster::RosterError;
use rollcall_core::types::StoredImage;
use rollcall_core::{EnrollError, RosterStore};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::attendance::{AttendanceFilter, AttendanceLog, DEFAULT_STATUS};
use crate::engine::{EngineHandle, WorkerError};

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub store: RosterStore,
    pub log: Arc<AttendanceLog>,
    pub default_tolerance: f32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/students", get(list_students).post(add_student))
        .route("/students/base64", post(add_student_base64))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/recognize", post(recognize_face))
        .route("/recognize/base64", post(recognize_face_base64))
        .route("/attendance", get(get_attendance).post(mark_attendance))
        .route("/dataset/rebuild", post(rebuild_dataset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No face detected in the image")]
    NoFaceDetected,
    #[error("Student ID already exists")]
    DuplicateIdentifier,
    #[error("Student not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Enroll(EnrollError::NoFaceDetected) => ApiError::NoFaceDetected,
            WorkerError::Enroll(EnrollError::DuplicateIdentifier(_)) => {
                ApiError::DuplicateIdentifier
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        // A missing roster file surfaces as a server error, same as the
        // unhandled load failure it replaces.
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoFaceDetected | ApiError::DuplicateIdentifier | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn root() -> Json<Value> {
    Json(json!({ "message": "Rollcall face recognition attendance service" }))
}

async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let roster = state.store.load()?;
    let mut students = Vec::with_capacity(roster.len());
    for (slot, record) in &roster {
        students.push(json!({
            "slot": slot,
            "id": record.external_id,
            "name": record.display_name,
            "image": encode_stored_base64(&record.reference_image)?,
        }));
    }
    Ok(Json(json!(students)))
}

async fn get_student(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let (slot, record) = state
        .store
        .lookup_by_external_id(&id)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({
        "slot": slot,
        "id": record.external_id,
        "name": record.display_name,
        "image": encode_stored_base64(&record.reference_image)?,
    })))
}

async fn add_student(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut name = None;
    let mut student_id = None;
    let mut image_bytes = None;

    while let Some(field) = next_field(&mut multipart).await? {
        match field.0.as_str() {
            "name" => name = Some(field.1),
            "student_id" => student_id = Some(field.1),
            "image" => image_bytes = Some(field.2),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError::BadRequest("missing field: name".into()))?;
    let student_id =
        student_id.ok_or_else(|| ApiError::BadRequest("missing field: student_id".into()))?;
    let bytes = image_bytes.ok_or_else(|| ApiError::BadRequest("missing field: image".into()))?;
    let image = decode_image(&bytes)?;

    state.engine.enroll(student_id, name, image, None).await?;
    Ok(Json(json!({ "message": "Student added successfully" })))
}

#[derive(Deserialize)]
struct StudentPayload {
    id: String,
    name: String,
    image: Option<String>,
}

async fn add_student_base64(
    State(state): State<AppState>,
    Json(student): Json<StudentPayload>,
) -> ApiResult<Json<Value>> {
    let data = student
        .image
        .ok_or_else(|| ApiError::BadRequest("Image is required".into()))?;
    let image = decode_base64_image(&data)?;

    state.engine.enroll(student.id, student.name, image, None).await?;
    Ok(Json(json!({ "message": "Student added successfully" })))
}

async fn update_student(
    Path(id): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (old_slot, old_record) = state
        .store
        .lookup_by_external_id(&id)?
        .ok_or(ApiError::NotFound)?;

    let mut name = None;
    let mut new_id = None;
    let mut image_bytes = None;
    while let Some(field) = next_field(&mut multipart).await? {
        match field.0.as_str() {
            "name" => name = Some(field.1),
            "new_id" => new_id = Some(field.1),
            "image" => image_bytes = Some(field.2),
            _ => {}
        }
    }

    let update_name = name.unwrap_or(old_record.display_name);
    let update_id = new_id.unwrap_or(id);
    let update_image = match image_bytes {
        Some(bytes) => decode_image(&bytes)?,
        None => stored_to_rgb(&old_record.reference_image)?,
    };

    state
        .engine
        .enroll(update_id, update_name, update_image, Some(old_slot))
        .await?;
    Ok(Json(json!({ "message": "Student updated successfully" })))
}

async fn delete_student(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .lookup_by_external_id(&id)?
        .ok_or(ApiError::NotFound)?;

    state.engine.delete(id).await?;
    Ok(Json(json!({ "message": "Student deleted successfully" })))
}

#[derive(Deserialize)]
struct RecognizeQuery {
    tolerance: Option<f32>,
}

async fn recognize_face(
    Query(query): Query<RecognizeQuery>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut image_bytes = None;
    while let Some(field) = next_field(&mut multipart).await? {
        if field.0 == "image" {
            image_bytes = Some(field.2);
        }
    }
    let bytes = image_bytes.ok_or_else(|| ApiError::BadRequest("missing field: image".into()))?;
    let image = decode_image(&bytes)?;

    let tolerance = query.tolerance.unwrap_or(state.default_tolerance);
    run_recognition(&state, image, tolerance).await
}

#[derive(Deserialize)]
struct RecognizeBase64Payload {
    image: String,
    tolerance: Option<f32>,
}

async fn recognize_face_base64(
    State(state): State<AppState>,
    Json(payload): Json<RecognizeBase64Payload>,
) -> ApiResult<Json<Value>> {
    let image = decode_base64_image(&payload.image)?;
    let tolerance = payload.tolerance.unwrap_or(state.default_tolerance);
    run_recognition(&state, image, tolerance).await
}

/// Shared recognize path: annotate, log attendance for a resolved identity,
/// return the labeled image.
async fn run_recognition(
    state: &AppState,
    image: RgbImage,
    tolerance: f32,
) -> ApiResult<Json<Value>> {
    let (annotated, outcome) = state.engine.recognize(image, tolerance).await?;

    if outcome.display_name != UNKNOWN && outcome.external_id != UNKNOWN {
        state
            .log
            .append(&outcome.external_id, &outcome.display_name, DEFAULT_STATUS)?;
    }

    Ok(Json(json!({
        "name": outcome.display_name,
        "id": outcome.external_id,
        "image": encode_rgb_base64(&annotated)?,
    })))
}

#[derive(Deserialize)]
struct AttendanceQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    student_id: Option<String>,
    status: Option<String>,
}

async fn get_attendance(
    Query(query): Query<AttendanceQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let filter = AttendanceFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        student_id: query.student_id,
        status: query.status,
    };
    let entries = state.log.query(&filter)?;
    Ok(Json(json!(entries)))
}

#[derive(Deserialize)]
struct MarkAttendancePayload {
    student_id: String,
    student_name: String,
    status: Option<String>,
}

async fn mark_attendance(
    State(state): State<AppState>,
    Json(record): Json<MarkAttendancePayload>,
) -> ApiResult<Json<Value>> {
    let status = record.status.unwrap_or_else(|| DEFAULT_STATUS.to_string());
    state.log.append(&record.student_id, &record.student_name, &status)?;
    Ok(Json(json!({ "message": "Attendance recorded successfully" })))
}

async fn rebuild_dataset(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    // Enqueue on the engine thread and reply immediately; the rebuild's
    // outcome is only observable in the logs and the rebuilt store.
    let engine = state.engine.clone();
    tokio::spawn(async move {
        match engine.rebuild().await {
            Ok(count) => tracing::info!(records = count, "dataset rebuild finished"),
            Err(err) => tracing::error!(error = %err, "dataset rebuild failed"),
        }
    });
    Ok(Json(json!({ "message": "Dataset rebuild started in background" })))
}

/// Pull the next multipart field as (name, text, bytes). Text and bytes are
/// both materialized since callers differ in which they need.
async fn next_field(
    multipart: &mut Multipart,
) -> ApiResult<Option<(String, String, Vec<u8>)>> {
    let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    else {
        return Ok(None);
    };

    let name = field.name().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read field {name}: {e}")))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Some((name, text, bytes.to_vec())))
}

fn decode_image(bytes: &[u8]) -> ApiResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| ApiError::BadRequest(format!("could not decode image: {e}")))
}

fn decode_base64_image(data: &str) -> ApiResult<RgbImage> {
    // Accept data URLs: strip everything up to the first comma.
    let data = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    let bytes = BASE64
        .decode(data)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 image: {e}")))?;
    decode_image(&bytes)
}

fn encode_rgb_base64(image: &RgbImage) -> ApiResult<String> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("jpeg encode failed: {e}")))?;
    Ok(BASE64.encode(&buf))
}

fn stored_to_rgb(stored: &StoredImage) -> ApiResult<RgbImage> {
    stored
        .to_rgb()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("stored reference image is corrupt")))
}

fn encode_stored_base64(stored: &StoredImage) -> ApiResult<String> {
    encode_rgb_base64(&stored_to_rgb(stored)?)
}
