//! Ownership-scoped job repository.
//!
//! Every read and write is scoped by `(id, user_id)` so cross-user
//! interference is impossible by construction; the row is the unit of
//! mutation and the database's per-row update semantics are the only
//! concurrency control. Worker write-backs are additionally guarded by the
//! expected `analysis_run_id` so a completion from a superseded run is
//! silently dropped instead of clobbering a newer run's state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobRow, JobSummaryRow};

/// Fields for a new job row. Optional text fields arrive already
/// trimmed-or-None from validation.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: Option<String>,
    pub company: Option<String>,
    pub source_url: Option<String>,
    pub content: String,
    pub resume_id: Option<Uuid>,
}

/// Partial update. An outer `None` leaves the column untouched; the inner
/// `Option` carries an explicit clear for nullable columns.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub content: Option<String>,
    pub title: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub source_url: Option<Option<String>>,
    pub resume_id: Option<Option<Uuid>>,
    /// Set when `content` or `resume_id` changes: both aspect statuses go back
    /// to `pending` and every result/error field is cleared in the same
    /// statement, so old results never persist alongside new content.
    pub reset_analysis: bool,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.title.is_none()
            && self.company.is_none()
            && self.source_url.is_none()
            && self.resume_id.is_none()
    }
}

/// Values stamped onto a job when a new analysis run is triggered.
#[derive(Debug, Clone, Copy)]
pub struct RunStamp {
    pub analysis_run_id: Uuid,
    pub requested_at: DateTime<Utc>,
}

/// Pagination window for job listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Successful fit-score payload written back by the worker.
#[derive(Debug, Clone)]
pub struct FitScoreResult {
    pub score: f64,
    pub strong_alignment: Vec<String>,
    pub weak_spots: Vec<String>,
    pub areas_to_probe: Vec<String>,
}

/// Worker write-back for one aspect: a successful payload or an error string.
#[derive(Debug, Clone)]
pub enum AspectResult<T> {
    Ready(T),
    Failed(String),
}

/// Outcome of a guarded worker write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The run id no longer matches (the run was superseded) or the aspect
    /// already left `pending`. The write was dropped.
    Stale,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, new: NewJob) -> Result<JobRow, AppError>;

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<JobRow>, AppError>;

    /// Returns one page of summaries plus the total row count for the user.
    async fn list(&self, user_id: Uuid, page: Page)
        -> Result<(Vec<JobSummaryRow>, i64), AppError>;

    /// Applies a partial update atomically. Returns the updated row, or
    /// `None` when no row matched `(id, user_id)`.
    async fn update(&self, id: Uuid, user_id: Uuid, patch: JobPatch)
        -> Result<Option<JobRow>, AppError>;

    /// Stamps a fresh run id and requested-at, resets both aspects to
    /// `pending` and clears all result/error fields, in one statement.
    /// Returns false when no row matched.
    async fn stamp_run(&self, id: Uuid, user_id: Uuid, stamp: RunStamp) -> Result<bool, AppError>;

    /// Returns false when no row matched.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    /// Worker write-back for the fit-score aspect, guarded on `run_id` and a
    /// still-`pending` status.
    async fn record_fit_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<FitScoreResult>,
    ) -> Result<WriteOutcome, AppError>;

    /// Worker write-back for the questions aspect, same guard.
    async fn record_questions_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<Value>,
    ) -> Result<WriteOutcome, AppError>;
}

/// PostgreSQL-backed implementation.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUMMARY_COLUMNS: &str = "id, title, company, source_url, resume_id, fit_score, \
     fit_score_status, questions_status, created_at, updated_at";

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, user_id: Uuid, new: NewJob) -> Result<JobRow, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (user_id, title, company, source_url, content, resume_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.company)
        .bind(&new.source_url)
        .bind(&new.content)
        .bind(new.resume_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<JobRow>, AppError> {
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<JobSummaryRow>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, JobSummaryRow>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM jobs WHERE user_id = $1 \
             ORDER BY updated_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: JobPatch,
    ) -> Result<Option<JobRow>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE jobs SET updated_at = now()");

        if let Some(content) = patch.content {
            qb.push(", content = ");
            qb.push_bind(content);
        }
        if let Some(title) = patch.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(company) = patch.company {
            qb.push(", company = ");
            qb.push_bind(company);
        }
        if let Some(source_url) = patch.source_url {
            qb.push(", source_url = ");
            qb.push_bind(source_url);
        }
        if let Some(resume_id) = patch.resume_id {
            qb.push(", resume_id = ");
            qb.push_bind(resume_id);
        }
        if patch.reset_analysis {
            qb.push(
                ", fit_score = NULL\
                 , fit_score_status = 'pending'::aspect_status\
                 , fit_score_error = NULL\
                 , fit_strong_alignment = NULL\
                 , fit_weak_spots = NULL\
                 , fit_areas_to_probe = NULL\
                 , fit_score_updated_at = NULL\
                 , questions = NULL\
                 , questions_status = 'pending'::aspect_status\
                 , questions_error = NULL\
                 , questions_updated_at = NULL",
            );
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND user_id = ");
        qb.push_bind(user_id);
        qb.push(" RETURNING *");

        Ok(qb
            .build_query_as::<JobRow>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn stamp_run(&self, id: Uuid, user_id: Uuid, stamp: RunStamp) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                analysis_run_id = $1,
                analysis_requested_at = $2,
                fit_score = NULL,
                fit_score_status = 'pending',
                fit_score_error = NULL,
                fit_strong_alignment = NULL,
                fit_weak_spots = NULL,
                fit_areas_to_probe = NULL,
                fit_score_updated_at = NULL,
                questions = NULL,
                questions_status = 'pending',
                questions_error = NULL,
                questions_updated_at = NULL,
                updated_at = now()
            WHERE id = $3 AND user_id = $4
            "#,
        )
        .bind(stamp.analysis_run_id)
        .bind(stamp.requested_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_fit_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<FitScoreResult>,
    ) -> Result<WriteOutcome, AppError> {
        let affected = match result {
            AspectResult::Ready(fit) => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET
                        fit_score_status = 'ready',
                        fit_score = $1,
                        fit_strong_alignment = $2,
                        fit_weak_spots = $3,
                        fit_areas_to_probe = $4,
                        fit_score_error = NULL,
                        fit_score_updated_at = now(),
                        updated_at = now()
                    WHERE id = $5 AND analysis_run_id = $6 AND fit_score_status = 'pending'
                    "#,
                )
                .bind(fit.score)
                .bind(&fit.strong_alignment)
                .bind(&fit.weak_spots)
                .bind(&fit.areas_to_probe)
                .bind(job_id)
                .bind(run_id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            AspectResult::Failed(error) => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET
                        fit_score_status = 'failed',
                        fit_score_error = $1,
                        fit_score = NULL,
                        fit_strong_alignment = NULL,
                        fit_weak_spots = NULL,
                        fit_areas_to_probe = NULL,
                        fit_score_updated_at = now(),
                        updated_at = now()
                    WHERE id = $2 AND analysis_run_id = $3 AND fit_score_status = 'pending'
                    "#,
                )
                .bind(error)
                .bind(job_id)
                .bind(run_id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            warn!(%job_id, %run_id, "dropping stale fit-score write-back");
            return Ok(WriteOutcome::Stale);
        }
        Ok(WriteOutcome::Applied)
    }

    async fn record_questions_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<Value>,
    ) -> Result<WriteOutcome, AppError> {
        let affected = match result {
            AspectResult::Ready(questions) => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET
                        questions_status = 'ready',
                        questions = $1,
                        questions_error = NULL,
                        questions_updated_at = now(),
                        updated_at = now()
                    WHERE id = $2 AND analysis_run_id = $3 AND questions_status = 'pending'
                    "#,
                )
                .bind(questions)
                .bind(job_id)
                .bind(run_id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            AspectResult::Failed(error) => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET
                        questions_status = 'failed',
                        questions_error = $1,
                        questions = NULL,
                        questions_updated_at = now(),
                        updated_at = now()
                    WHERE id = $2 AND analysis_run_id = $3 AND questions_status = 'pending'
                    "#,
                )
                .bind(error)
                .bind(job_id)
                .bind(run_id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            warn!(%job_id, %run_id, "dropping stale questions write-back");
            return Ok(WriteOutcome::Stale);
        }
        Ok(WriteOutcome::Applied)
    }
}
