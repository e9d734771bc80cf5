//! Analysis lifecycle orchestrator.
//!
//! Owns the decision of whether, and how, a resume-to-job analysis run is
//! (re)triggered: prerequisite validation, the idempotence guard against
//! duplicate triggers, stamping the run into the store, and the hand-off to
//! the worker queue. The store write always commits before the queue message
//! is sent, so a worker can never observe a message for a run the store
//! doesn't yet know about.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::queue::{AnalysisQueue, AnalysisTask, TaskType};
use crate::analysis::status::AspectStatus;
use crate::errors::AppError;
use crate::models::job::JobRow;
use crate::store::jobs::{JobPatch, JobStore, NewJob, RunStamp};
use crate::store::resumes::ResumeStore;

/// Minimum trimmed content length for a job description to be analyzable.
pub const MIN_CONTENT_LENGTH: usize = 50;

/// How a trigger request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new run was stamped and its message dispatched.
    Started { analysis_run_id: Uuid },
    /// Both aspects were already pending and `force` was not set; the
    /// existing run id is untouched and no message was sent.
    AlreadyRunning,
    /// The run was stamped but the queue rejected the message. The job stays
    /// `pending` in the store; recovery is an operator-level retry or a
    /// forced re-trigger. Rolling back the stamp instead would risk clobbering
    /// a legitimate concurrent completion.
    DispatchFailed { analysis_run_id: Uuid },
}

/// Raw create payload, pre-validation.
#[derive(Debug, Clone)]
pub struct CreateJobInput {
    pub title: Option<String>,
    pub company: Option<String>,
    pub source_url: Option<String>,
    pub content: String,
    pub resume_id: Option<Uuid>,
}

/// Raw patch payload. Outer `None` means the field was absent from the
/// request; an inner `None` is an explicit null clearing the field.
#[derive(Debug, Clone, Default)]
pub struct UpdateJobInput {
    pub content: Option<Option<String>>,
    pub title: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub source_url: Option<Option<String>>,
    pub resume_id: Option<Option<Uuid>>,
}

pub struct Orchestrator {
    jobs: Arc<dyn JobStore>,
    resumes: Arc<dyn ResumeStore>,
    queue: Arc<dyn AnalysisQueue>,
}

impl Orchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        resumes: Arc<dyn ResumeStore>,
        queue: Arc<dyn AnalysisQueue>,
    ) -> Self {
        Self {
            jobs,
            resumes,
            queue,
        }
    }

    /// Creates a job. When a resume is attached at creation time, the first
    /// analysis run is triggered implicitly through the same path as the
    /// explicit endpoint.
    pub async fn create_job(
        &self,
        user_id: Uuid,
        input: CreateJobInput,
    ) -> Result<(JobRow, Option<TriggerOutcome>), AppError> {
        let content = input.content.trim().to_string();
        if content.chars().count() < MIN_CONTENT_LENGTH {
            return Err(AppError::Validation(format!(
                "Content is required and must be at least {MIN_CONTENT_LENGTH} characters."
            )));
        }
        if let Some(resume_id) = input.resume_id {
            self.require_owned_resume(resume_id, user_id).await?;
        }

        let job = self
            .jobs
            .insert(
                user_id,
                NewJob {
                    title: normalize_optional(input.title),
                    company: normalize_optional(input.company),
                    source_url: normalize_optional(input.source_url),
                    content,
                    resume_id: input.resume_id,
                },
            )
            .await?;
        info!(job_id = %job.id, "job created");

        if job.resume_id.is_none() {
            return Ok((job, None));
        }

        let outcome = self.request_analysis(job.id, user_id, false).await?;
        // Re-read so the caller immediately sees the pending statuses the
        // trigger just stamped.
        let job = self
            .jobs
            .get(job.id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found.".into()))?;
        Ok((job, Some(outcome)))
    }

    /// Applies only explicitly provided fields. A change to `content` or
    /// `resume_id` invalidates prior analysis in the same atomic update, but
    /// never enqueues a new run by itself: re-analysis after an edit is a
    /// separate, explicit trigger.
    pub async fn update_job(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        input: UpdateJobInput,
    ) -> Result<JobRow, AppError> {
        let mut patch = JobPatch::default();

        if let Some(content) = input.content {
            let content = content.map(|c| c.trim().to_string()).unwrap_or_default();
            if content.chars().count() < MIN_CONTENT_LENGTH {
                return Err(AppError::Validation(format!(
                    "Content must be at least {MIN_CONTENT_LENGTH} characters."
                )));
            }
            patch.content = Some(content);
        }
        if let Some(title) = input.title {
            patch.title = Some(title.and_then(non_empty));
        }
        if let Some(company) = input.company {
            patch.company = Some(company.and_then(non_empty));
        }
        if let Some(source_url) = input.source_url {
            patch.source_url = Some(source_url.and_then(non_empty));
        }
        if let Some(resume_id) = input.resume_id {
            if let Some(resume_id) = resume_id {
                self.require_owned_resume(resume_id, user_id).await?;
            }
            patch.resume_id = Some(resume_id);
        }

        if patch.is_empty() {
            return Err(AppError::Validation("No fields to update.".into()));
        }
        patch.reset_analysis = patch.content.is_some() || patch.resume_id.is_some();

        self.jobs
            .update(job_id, user_id, patch)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found.".into()))
    }

    /// Decides whether a new analysis run is warranted and, if so, stamps a
    /// fresh run id and dispatches exactly one message to the worker queue.
    pub async fn request_analysis(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        force: bool,
    ) -> Result<TriggerOutcome, AppError> {
        let job = self
            .jobs
            .get(job_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found.".into()))?;

        if job.resume_id.is_none() {
            return Err(AppError::PreconditionFailed(
                "A resume must be attached before running analysis.".into(),
            ));
        }
        if job.content.trim().chars().count() < MIN_CONTENT_LENGTH {
            return Err(AppError::PreconditionFailed(format!(
                "Job description content must be at least {MIN_CONTENT_LENGTH} characters."
            )));
        }

        // Idempotence guard: an unforced trigger while both aspects already
        // await a worker is a flagged no-op, not a duplicate run.
        if !force
            && job.fit_score_status == Some(AspectStatus::Pending)
            && job.questions_status == Some(AspectStatus::Pending)
        {
            return Ok(TriggerOutcome::AlreadyRunning);
        }

        let analysis_run_id = Uuid::new_v4();
        let stamped = self
            .jobs
            .stamp_run(
                job_id,
                user_id,
                RunStamp {
                    analysis_run_id,
                    requested_at: Utc::now(),
                },
            )
            .await?;
        if !stamped {
            // Deleted between the read and the write.
            return Err(AppError::NotFound("Job not found.".into()));
        }

        let task = AnalysisTask {
            job_id,
            analysis_run_id,
            task_type: TaskType::Both,
            request_id: Uuid::new_v4(),
            force,
        };
        if let Err(e) = self.queue.enqueue(&task).await {
            warn!(%job_id, %analysis_run_id, "run stamped but dispatch failed: {e:#}");
            return Ok(TriggerOutcome::DispatchFailed { analysis_run_id });
        }

        info!(%job_id, %analysis_run_id, force, "analysis run dispatched");
        Ok(TriggerOutcome::Started { analysis_run_id })
    }

    async fn require_owned_resume(&self, resume_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        match self.resumes.get(resume_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Resume not found.".into())),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(non_empty)
}
