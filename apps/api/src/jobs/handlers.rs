use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::analysis::orchestrator::{CreateJobInput, TriggerOutcome, UpdateJobInput};
use crate::analysis::status::analysis_settled;
use crate::errors::AppError;
use crate::models::job::{JobRow, JobSummaryRow};
use crate::state::AppState;
use crate::store::jobs::Page;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListJobsQuery {
    pub user_id: Uuid,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Distinguishes "field absent" (outer None) from an explicit JSON null
/// (inner None) in PATCH bodies.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub user_id: Uuid,
    pub content: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub source_url: Option<String>,
    pub resume_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    pub user_id: Uuid,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub source_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub resume_id: Option<Option<Uuid>>,
}

#[derive(Deserialize)]
pub struct RunAnalysisRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub force: bool,
}

/// Full job record plus the derived polling predicate.
#[derive(Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: JobRow,
    /// True once neither aspect is `pending`; clients stop polling on this.
    pub analysis_settled: bool,
}

impl From<JobRow> for JobView {
    fn from(job: JobRow) -> Self {
        let analysis_settled = analysis_settled(job.fit_score_status, job.questions_status);
        Self {
            job,
            analysis_settled,
        }
    }
}

#[derive(Serialize)]
pub struct TriggerView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_run_id: Option<Uuid>,
    pub already_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TriggerOutcome> for TriggerView {
    fn from(outcome: TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::Started { analysis_run_id } => Self {
                analysis_run_id: Some(analysis_run_id),
                already_running: false,
                error: None,
            },
            TriggerOutcome::AlreadyRunning => Self {
                analysis_run_id: None,
                already_running: true,
                error: None,
            },
            TriggerOutcome::DispatchFailed { analysis_run_id } => Self {
                analysis_run_id: Some(analysis_run_id),
                already_running: false,
                error: Some("Analysis queued locally but dispatch failed.".to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub struct CreateJobResponse {
    pub job: JobView,
    /// Present when creating with a resume attached implicitly triggered the
    /// first run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TriggerView>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummaryRow>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Response, AppError> {
    let (job, trigger) = state
        .orchestrator
        .create_job(
            req.user_id,
            CreateJobInput {
                title: req.title,
                company: req.company,
                source_url: req.source_url,
                content: req.content,
                resume_id: req.resume_id,
            },
        )
        .await?;
    let body = CreateJobResponse {
        job: job.into(),
        analysis: trigger.map(TriggerView::from),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let (jobs, total) = state.jobs.list(params.user_id, Page { page, limit }).await?;
    Ok(Json(JobListResponse {
        jobs,
        page,
        limit,
        total,
    }))
}

/// GET /api/v1/jobs/:id — the polling read.
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<JobView>, AppError> {
    let job = state
        .jobs
        .get(id, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found.".into()))?;
    Ok(Json(job.into()))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobView>, AppError> {
    let job = state
        .orchestrator
        .update_job(
            id,
            req.user_id,
            UpdateJobInput {
                content: req.content,
                title: req.title,
                company: req.company,
                source_url: req.source_url,
                resume_id: req.resume_id,
            },
        )
        .await?;
    Ok(Json(job.into()))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    if state.jobs.delete(id, params.user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Job not found.".into()))
    }
}

/// POST /api/v1/jobs/:id/analyze/run
pub async fn handle_run_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RunAnalysisRequest>,
) -> Result<Response, AppError> {
    let outcome = state
        .orchestrator
        .request_analysis(id, req.user_id, req.force)
        .await?;
    let status = match outcome {
        TriggerOutcome::DispatchFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    Ok((status, Json(TriggerView::from(outcome))).into_response())
}
