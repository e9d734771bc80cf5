use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ExtractionStatus, ResumeRow};
use crate::state::AppState;
use crate::store::resumes::NewResume;

const MAX_SIZE_BYTES: i64 = 10 * 1024 * 1024;
const ALLOWED_MIME_TYPES: [&str; 2] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// Upload metadata registered after the client finished its direct-to-storage
/// upload. The presigned-upload flow itself lives outside this service.
#[derive(Deserialize)]
pub struct RegisterResumeRequest {
    pub user_id: Uuid,
    pub original_filename: String,
    pub bucket: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

#[derive(Serialize)]
pub struct ResumeView {
    pub id: Uuid,
    pub original_filename: String,
    pub extraction_status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ResumeRow> for ResumeView {
    fn from(row: ResumeRow) -> Self {
        Self {
            id: row.id,
            original_filename: row.original_filename,
            extraction_status: row.extraction_status,
            extraction_error: row.extraction_error,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeView>,
}

fn validate_registration(req: &RegisterResumeRequest) -> Result<(), AppError> {
    if req.original_filename.trim().is_empty()
        || req.bucket.trim().is_empty()
        || req.storage_key.trim().is_empty()
        || req.mime_type.trim().is_empty()
    {
        return Err(AppError::Validation("Invalid payload.".into()));
    }
    if req.size_bytes <= 0 || req.size_bytes > MAX_SIZE_BYTES {
        return Err(AppError::Validation("File too large.".into()));
    }
    if !ALLOWED_MIME_TYPES.contains(&req.mime_type.as_str()) {
        return Err(AppError::Validation("Unsupported file type.".into()));
    }
    // Uploads are keyed under the owner's prefix; anything else is a claim on
    // someone else's object.
    let expected_prefix = format!("resumes/{}/", req.user_id);
    if !req.storage_key.starts_with(&expected_prefix) {
        return Err(AppError::Validation(
            "Storage key does not belong to this user.".into(),
        ));
    }
    Ok(())
}

/// POST /api/v1/resumes
pub async fn handle_register_resume(
    State(state): State<AppState>,
    Json(req): Json<RegisterResumeRequest>,
) -> Result<Response, AppError> {
    validate_registration(&req)?;
    let resume = state
        .resumes
        .insert(
            req.user_id,
            NewResume {
                original_filename: req.original_filename.trim().to_string(),
                bucket: req.bucket,
                storage_key: req.storage_key,
                mime_type: req.mime_type,
                size_bytes: req.size_bytes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ResumeView::from(resume))).into_response())
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let resumes = state.resumes.list(params.user_id).await?;
    Ok(Json(ResumeListResponse {
        resumes: resumes.into_iter().map(ResumeView::from).collect(),
    }))
}

/// GET /api/v1/resumes/:id — extraction-status polling read.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeView>, AppError> {
    let resume = state
        .resumes
        .get(id, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found.".into()))?;
    Ok(Json(resume.into()))
}
