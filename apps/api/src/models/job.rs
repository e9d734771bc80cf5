use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::status::AspectStatus;

/// A job-description record, including the full analysis lifecycle state.
/// This row is the only durable representation of a run: the run id and the
/// two per-aspect status columns, there is no separate runs table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub company: Option<String>,
    pub source_url: Option<String>,
    pub content: String,
    pub resume_id: Option<Uuid>,

    pub analysis_run_id: Option<Uuid>,
    pub analysis_requested_at: Option<DateTime<Utc>>,

    // Fit score aspect
    pub fit_score: Option<f64>,
    pub fit_score_status: Option<AspectStatus>,
    pub fit_score_error: Option<String>,
    pub fit_strong_alignment: Option<Vec<String>>,
    pub fit_weak_spots: Option<Vec<String>>,
    pub fit_areas_to_probe: Option<Vec<String>>,
    pub fit_score_updated_at: Option<DateTime<Utc>>,

    // Questions aspect
    pub questions: Option<Value>,
    pub questions_status: Option<AspectStatus>,
    pub questions_error: Option<String>,
    pub questions_updated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact listing projection: everything a job index page needs, none of the
/// analysis payloads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobSummaryRow {
    pub id: Uuid,
    pub title: Option<String>,
    pub company: Option<String>,
    pub source_url: Option<String>,
    pub resume_id: Option<Uuid>,
    pub fit_score: Option<f64>,
    pub fit_score_status: Option<AspectStatus>,
    pub questions_status: Option<AspectStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
