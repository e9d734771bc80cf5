//! In-memory store doubles mirroring the Postgres semantics, including the
//! run-id write-back guards. Used by the orchestrator and store tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::status::{transition_allowed, AspectStatus, StatusEvent};
use crate::errors::AppError;
use crate::models::job::{JobRow, JobSummaryRow};
use crate::models::resume::{ExtractionStatus, ResumeRow};
use crate::store::jobs::{
    AspectResult, FitScoreResult, JobPatch, JobStore, NewJob, Page, RunStamp, WriteOutcome,
};
use crate::store::resumes::{ExtractionResult, NewResume, ResumeStore};

#[derive(Default)]
pub struct MemoryJobStore {
    rows: Mutex<HashMap<Uuid, JobRow>>,
}

impl MemoryJobStore {
    /// Test-side peek that skips the ownership scope.
    pub fn snapshot(&self, id: Uuid) -> Option<JobRow> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

fn reset_aspects(row: &mut JobRow) {
    debug_assert!(transition_allowed(row.fit_score_status, StatusEvent::Reset));
    row.fit_score = None;
    row.fit_score_status = Some(StatusEvent::Reset.target());
    row.fit_score_error = None;
    row.fit_strong_alignment = None;
    row.fit_weak_spots = None;
    row.fit_areas_to_probe = None;
    row.fit_score_updated_at = None;
    row.questions = None;
    row.questions_status = Some(StatusEvent::Reset.target());
    row.questions_error = None;
    row.questions_updated_at = None;
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, user_id: Uuid, new: NewJob) -> Result<JobRow, AppError> {
        let now = Utc::now();
        let row = JobRow {
            id: Uuid::new_v4(),
            user_id,
            title: new.title,
            company: new.company,
            source_url: new.source_url,
            content: new.content,
            resume_id: new.resume_id,
            analysis_run_id: None,
            analysis_requested_at: None,
            fit_score: None,
            fit_score_status: None,
            fit_score_error: None,
            fit_strong_alignment: None,
            fit_weak_spots: None,
            fit_areas_to_probe: None,
            fit_score_updated_at: None,
            questions: None,
            questions_status: None,
            questions_error: None,
            questions_updated_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<JobRow>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .filter(|row| row.user_id == user_id)
            .cloned())
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<JobSummaryRow>, i64), AppError> {
        let rows = self.rows.lock().unwrap();
        let mut owned: Vec<&JobRow> = rows.values().filter(|r| r.user_id == user_id).collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = owned.len() as i64;
        let summaries = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|r| JobSummaryRow {
                id: r.id,
                title: r.title.clone(),
                company: r.company.clone(),
                source_url: r.source_url.clone(),
                resume_id: r.resume_id,
                fit_score: r.fit_score,
                fit_score_status: r.fit_score_status,
                questions_status: r.questions_status,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();
        Ok((summaries, total))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: JobPatch,
    ) -> Result<Option<JobRow>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|row| row.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(content) = patch.content {
            row.content = content;
        }
        if let Some(title) = patch.title {
            row.title = title;
        }
        if let Some(company) = patch.company {
            row.company = company;
        }
        if let Some(source_url) = patch.source_url {
            row.source_url = source_url;
        }
        if let Some(resume_id) = patch.resume_id {
            row.resume_id = resume_id;
        }
        if patch.reset_analysis {
            reset_aspects(row);
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn stamp_run(&self, id: Uuid, user_id: Uuid, stamp: RunStamp) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|row| row.user_id == user_id) else {
            return Ok(false);
        };
        row.analysis_run_id = Some(stamp.analysis_run_id);
        row.analysis_requested_at = Some(stamp.requested_at);
        reset_aspects(row);
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(row) if row.user_id == user_id => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_fit_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<FitScoreResult>,
    ) -> Result<WriteOutcome, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&job_id) else {
            return Ok(WriteOutcome::Stale);
        };
        let event = match &result {
            AspectResult::Ready(_) => StatusEvent::WorkerReady,
            AspectResult::Failed(_) => StatusEvent::WorkerFailed,
        };
        if row.analysis_run_id != Some(run_id) || !transition_allowed(row.fit_score_status, event)
        {
            return Ok(WriteOutcome::Stale);
        }
        match result {
            AspectResult::Ready(fit) => {
                row.fit_score_status = Some(AspectStatus::Ready);
                row.fit_score = Some(fit.score);
                row.fit_strong_alignment = Some(fit.strong_alignment);
                row.fit_weak_spots = Some(fit.weak_spots);
                row.fit_areas_to_probe = Some(fit.areas_to_probe);
                row.fit_score_error = None;
            }
            AspectResult::Failed(error) => {
                row.fit_score_status = Some(AspectStatus::Failed);
                row.fit_score = None;
                row.fit_strong_alignment = None;
                row.fit_weak_spots = None;
                row.fit_areas_to_probe = None;
                row.fit_score_error = Some(error);
            }
        }
        row.fit_score_updated_at = Some(Utc::now());
        row.updated_at = Utc::now();
        Ok(WriteOutcome::Applied)
    }

    async fn record_questions_result(
        &self,
        job_id: Uuid,
        run_id: Uuid,
        result: AspectResult<Value>,
    ) -> Result<WriteOutcome, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&job_id) else {
            return Ok(WriteOutcome::Stale);
        };
        let event = match &result {
            AspectResult::Ready(_) => StatusEvent::WorkerReady,
            AspectResult::Failed(_) => StatusEvent::WorkerFailed,
        };
        if row.analysis_run_id != Some(run_id) || !transition_allowed(row.questions_status, event)
        {
            return Ok(WriteOutcome::Stale);
        }
        match result {
            AspectResult::Ready(questions) => {
                row.questions_status = Some(AspectStatus::Ready);
                row.questions = Some(questions);
                row.questions_error = None;
            }
            AspectResult::Failed(error) => {
                row.questions_status = Some(AspectStatus::Failed);
                row.questions = None;
                row.questions_error = Some(error);
            }
        }
        row.questions_updated_at = Some(Utc::now());
        row.updated_at = Utc::now();
        Ok(WriteOutcome::Applied)
    }
}

#[derive(Default)]
pub struct MemoryResumeStore {
    rows: Mutex<HashMap<Uuid, ResumeRow>>,
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn insert(&self, user_id: Uuid, new: NewResume) -> Result<ResumeRow, AppError> {
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id,
            original_filename: new.original_filename,
            bucket: new.bucket,
            storage_key: new.storage_key,
            mime_type: new.mime_type,
            size_bytes: new.size_bytes,
            extraction_status: ExtractionStatus::Pending,
            extraction_error: None,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .filter(|row| row.user_id == user_id)
            .cloned())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut owned: Vec<ResumeRow> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn record_extraction(
        &self,
        id: Uuid,
        result: ExtractionResult,
    ) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.extraction_status != ExtractionStatus::Pending {
            return Ok(false);
        }
        match result {
            ExtractionResult::Done => {
                row.extraction_status = ExtractionStatus::Done;
                row.extraction_error = None;
            }
            ExtractionResult::Failed(error) => {
                row.extraction_status = ExtractionStatus::Failed;
                row.extraction_error = Some(error);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_job(content: &str, resume_id: Option<Uuid>) -> NewJob {
        NewJob {
            title: Some("Backend Engineer".into()),
            company: None,
            source_url: None,
            content: content.to_string(),
            resume_id,
        }
    }

    fn fit_result() -> FitScoreResult {
        FitScoreResult {
            score: 72.0,
            strong_alignment: vec!["distributed systems".into()],
            weak_spots: vec!["no Kubernetes".into()],
            areas_to_probe: vec!["incident response".into()],
        }
    }

    #[tokio::test]
    async fn content_patch_resets_both_aspects_and_clears_results() {
        let store = MemoryJobStore::default();
        let user = Uuid::new_v4();
        let job = store
            .insert(user, new_job(&"x".repeat(80), Some(Uuid::new_v4())))
            .await
            .unwrap();
        let run = Uuid::new_v4();
        store
            .stamp_run(
                job.id,
                user,
                RunStamp {
                    analysis_run_id: run,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store
            .record_fit_result(job.id, run, AspectResult::Ready(fit_result()))
            .await
            .unwrap();

        let patch = JobPatch {
            content: Some("y".repeat(80)),
            reset_analysis: true,
            ..JobPatch::default()
        };
        let updated = store.update(job.id, user, patch).await.unwrap().unwrap();

        assert_eq!(updated.fit_score_status, Some(AspectStatus::Pending));
        assert_eq!(updated.questions_status, Some(AspectStatus::Pending));
        assert_eq!(updated.fit_score, None);
        assert_eq!(updated.fit_strong_alignment, None);
        assert_eq!(updated.questions, None);
        // The run id itself only changes when a new run is triggered.
        assert_eq!(updated.analysis_run_id, Some(run));
    }

    #[tokio::test]
    async fn cosmetic_patch_leaves_analysis_state_alone() {
        let store = MemoryJobStore::default();
        let user = Uuid::new_v4();
        let job = store
            .insert(user, new_job(&"x".repeat(80), Some(Uuid::new_v4())))
            .await
            .unwrap();
        let run = Uuid::new_v4();
        store
            .stamp_run(
                job.id,
                user,
                RunStamp {
                    analysis_run_id: run,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store
            .record_fit_result(job.id, run, AspectResult::Ready(fit_result()))
            .await
            .unwrap();

        let patch = JobPatch {
            title: Some(Some("Staff Engineer".into())),
            ..JobPatch::default()
        };
        let updated = store.update(job.id, user, patch).await.unwrap().unwrap();

        assert_eq!(updated.title.as_deref(), Some("Staff Engineer"));
        assert_eq!(updated.fit_score_status, Some(AspectStatus::Ready));
        assert_eq!(updated.fit_score, Some(72.0));
    }

    #[tokio::test]
    async fn write_back_with_superseded_run_id_is_dropped() {
        let store = MemoryJobStore::default();
        let user = Uuid::new_v4();
        let job = store
            .insert(user, new_job(&"x".repeat(80), Some(Uuid::new_v4())))
            .await
            .unwrap();

        let old_run = Uuid::new_v4();
        let new_run = Uuid::new_v4();
        for run in [old_run, new_run] {
            store
                .stamp_run(
                    job.id,
                    user,
                    RunStamp {
                        analysis_run_id: run,
                        requested_at: Utc::now(),
                    },
                )
                .await
                .unwrap();
        }

        let stale = store
            .record_fit_result(job.id, old_run, AspectResult::Ready(fit_result()))
            .await
            .unwrap();
        assert_eq!(stale, WriteOutcome::Stale);
        let row = store.snapshot(job.id).unwrap();
        assert_eq!(row.fit_score_status, Some(AspectStatus::Pending));
        assert_eq!(row.fit_score, None);

        let applied = store
            .record_questions_result(
                job.id,
                new_run,
                AspectResult::Ready(json!([{"q": "Tell me about a failed rollout."}])),
            )
            .await
            .unwrap();
        assert_eq!(applied, WriteOutcome::Applied);
    }

    #[tokio::test]
    async fn second_write_back_for_same_run_is_dropped() {
        let store = MemoryJobStore::default();
        let user = Uuid::new_v4();
        let job = store
            .insert(user, new_job(&"x".repeat(80), Some(Uuid::new_v4())))
            .await
            .unwrap();
        let run = Uuid::new_v4();
        store
            .stamp_run(
                job.id,
                user,
                RunStamp {
                    analysis_run_id: run,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let first = store
            .record_fit_result(job.id, run, AspectResult::Failed("model timeout".into()))
            .await
            .unwrap();
        assert_eq!(first, WriteOutcome::Applied);
        let row = store.snapshot(job.id).unwrap();
        assert_eq!(row.fit_score_status, Some(AspectStatus::Failed));
        assert_eq!(row.fit_score_error.as_deref(), Some("model timeout"));

        // Redelivery of the same message must not flip failed -> ready.
        let second = store
            .record_fit_result(job.id, run, AspectResult::Ready(fit_result()))
            .await
            .unwrap();
        assert_eq!(second, WriteOutcome::Stale);
        let row = store.snapshot(job.id).unwrap();
        assert_eq!(row.fit_score_status, Some(AspectStatus::Failed));
    }

    #[tokio::test]
    async fn ownership_scopes_reads_and_deletes() {
        let store = MemoryJobStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let job = store
            .insert(owner, new_job(&"x".repeat(80), None))
            .await
            .unwrap();

        assert!(store.get(job.id, stranger).await.unwrap().is_none());
        assert!(!store.delete(job.id, stranger).await.unwrap());
        assert!(store.get(job.id, owner).await.unwrap().is_some());
        assert!(store.delete(job.id, owner).await.unwrap());
    }

    #[tokio::test]
    async fn extraction_write_back_only_moves_out_of_pending() {
        let store = MemoryResumeStore::default();
        let user = Uuid::new_v4();
        let resume = store
            .insert(
                user,
                NewResume {
                    original_filename: "resume.pdf".into(),
                    bucket: "uploads".into(),
                    storage_key: format!("resumes/{user}/resume.pdf"),
                    mime_type: "application/pdf".into(),
                    size_bytes: 120_000,
                },
            )
            .await
            .unwrap();
        assert_eq!(resume.extraction_status, ExtractionStatus::Pending);

        assert!(store
            .record_extraction(resume.id, ExtractionResult::Done)
            .await
            .unwrap());
        // Already terminal: further flips are rejected.
        assert!(!store
            .record_extraction(resume.id, ExtractionResult::Failed("parse error".into()))
            .await
            .unwrap());
        let row = store.get(resume.id, user).await.unwrap().unwrap();
        assert_eq!(row.extraction_status, ExtractionStatus::Done);
        assert_eq!(row.extraction_error, None);
    }
}
