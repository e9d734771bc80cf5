//! Ownership-scoped resume repository.
//!
//! The extraction write-back is the contract used by the external
//! text-extraction pipeline: it may only flip `pending → done | failed`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;

/// Metadata registered once a client-side upload has completed. The object
/// bytes themselves never pass through this service.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub original_filename: String,
    pub bucket: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Extraction pipeline write-back: derived text ready, or why it failed.
#[derive(Debug, Clone)]
pub enum ExtractionResult {
    Done,
    Failed(String),
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, new: NewResume) -> Result<ResumeRow, AppError>;

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<ResumeRow>, AppError>;

    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError>;

    /// Flips `extraction_status` out of `pending`. Returns false when the row
    /// is missing or already left `pending`.
    async fn record_extraction(&self, id: Uuid, result: ExtractionResult)
        -> Result<bool, AppError>;
}

/// PostgreSQL-backed implementation.
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn insert(&self, user_id: Uuid, new: NewResume) -> Result<ResumeRow, AppError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes
                (user_id, original_filename, bucket, storage_key, mime_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&new.original_filename)
        .bind(&new.bucket)
        .bind(&new.storage_key)
        .bind(&new.mime_type)
        .bind(new.size_bytes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_extraction(
        &self,
        id: Uuid,
        result: ExtractionResult,
    ) -> Result<bool, AppError> {
        let affected = match result {
            ExtractionResult::Done => {
                sqlx::query(
                    "UPDATE resumes SET extraction_status = 'done', extraction_error = NULL \
                     WHERE id = $1 AND extraction_status = 'pending'",
                )
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            ExtractionResult::Failed(error) => {
                sqlx::query(
                    "UPDATE resumes SET extraction_status = 'failed', extraction_error = $1 \
                     WHERE id = $2 AND extraction_status = 'pending'",
                )
                .bind(error)
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            warn!(resume_id = %id, "extraction write-back matched no pending resume");
            return Ok(false);
        }
        Ok(true)
    }
}
