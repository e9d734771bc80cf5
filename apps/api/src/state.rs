use std::sync::Arc;

use crate::analysis::orchestrator::Orchestrator;
use crate::config::Config;
use crate::store::jobs::JobStore;
use crate::store::resumes::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The stores and the queue sit behind trait objects so the orchestrator and
/// handlers are backend-agnostic; production wires the Postgres and Redis
/// implementations in `main`.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub resumes: Arc<dyn ResumeStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Kept on state for handlers that need runtime settings; currently only
    /// read at startup.
    #[allow(dead_code)]
    pub config: Config,
}
