//! Status state machine for the two analysis aspects.
//!
//! Each job tracks its fit score and its interview questions independently.
//! An aspect is SQL NULL until the first run is requested, then moves through
//! `pending → ready | failed`. A new run (or a content/resume edit) resets an
//! aspect back to `pending`; nothing else may change a terminal status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-aspect lifecycle status. The "never requested" state is represented as
/// SQL NULL / `Option::None`, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "aspect_status", rename_all = "lowercase")]
pub enum AspectStatus {
    Pending,
    Ready,
    Failed,
}

impl AspectStatus {
    /// Terminal statuses expect no further worker write without a new run.
    pub fn is_terminal(self) -> bool {
        matches!(self, AspectStatus::Ready | AspectStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectStatus::Pending => "pending",
            AspectStatus::Ready => "ready",
            AspectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AspectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The events that may move an aspect status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A new run was stamped, or a content/resume edit invalidated prior
    /// results. Target status is always `pending`.
    Reset,
    /// The worker wrote a successful result. Target status is `ready`.
    WorkerReady,
    /// The worker reported an error. Target status is `failed`.
    WorkerFailed,
}

impl StatusEvent {
    pub fn target(self) -> AspectStatus {
        match self {
            StatusEvent::Reset => AspectStatus::Pending,
            StatusEvent::WorkerReady => AspectStatus::Ready,
            StatusEvent::WorkerFailed => AspectStatus::Failed,
        }
    }
}

/// Whether `event` is a legal move out of `current`.
///
/// Resets are legal from every state: a forced retrigger supersedes a stuck
/// `pending` run with a fresh run id. Worker writes are only legal out of
/// `pending` — there is no `ready → ready` refresh without a new run, and a
/// completion that lost the race to a reset is dropped by the store guard.
pub fn transition_allowed(current: Option<AspectStatus>, event: StatusEvent) -> bool {
    match event {
        StatusEvent::Reset => true,
        StatusEvent::WorkerReady | StatusEvent::WorkerFailed => {
            current == Some(AspectStatus::Pending)
        }
    }
}

/// The combined "is analysis settled" predicate that ends client polling:
/// neither aspect is still awaiting a worker. An aspect that was never
/// requested counts as settled.
pub fn analysis_settled(fit: Option<AspectStatus>, questions: Option<AspectStatus>) -> bool {
    fit.map_or(true, AspectStatus::is_terminal)
        && questions.map_or(true, AspectStatus::is_terminal)
}
