//! The analysis lifecycle core: trigger orchestration, the per-aspect status
//! state machine, and the queue hand-off to the external worker pool.

pub mod orchestrator;
pub mod queue;
pub mod status;
