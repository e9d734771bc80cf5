use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of the derived-text extraction pipeline, independent of any job's
/// analysis status. Flipped from `pending` by an external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "extraction_status", rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Done,
    Failed,
}

/// An uploaded resume file. The bytes live in object storage; this row holds
/// the metadata registered after the client-side upload completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub bucket: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub extraction_status: ExtractionStatus,
    pub extraction_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
