//! Callbacks into the presentation layer.

use stylecast_client::PostProcessResponse;
use stylecast_core::{AppError, CompositeResult, SessionId};

/// Implemented by whatever shows the pipeline to the user. Called without
/// any orchestrator lock held, so implementations may call back into the
/// orchestrator.
pub trait PipelineEvents: Send + Sync {
    /// The user finished editing before the remote job. `false` once the
    /// job catches up.
    fn waiting_for_job(&self, session_id: SessionId, waiting: bool);

    /// Called exactly once per successful session.
    fn result_ready(&self, result: &CompositeResult);

    fn session_failed(&self, session_id: SessionId, error: &AppError);

    /// Optional refinement of an already delivered result.
    fn refined_ready(&self, session_id: SessionId, refinement: &PostProcessResponse) {
        let _ = (session_id, refinement);
    }
}

/// Logs every event. Useful when nothing needs to react.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl PipelineEvents for TracingEvents {
    fn waiting_for_job(&self, session_id: SessionId, waiting: bool) {
        tracing::info!(session_id = %session_id, waiting = waiting, "Waiting for stylization");
    }

    fn result_ready(&self, result: &CompositeResult) {
        tracing::info!(
            session_id = %result.session_id,
            stylized = result.base.is_stylized(),
            size_bytes = result.data.len(),
            "Result ready"
        );
    }

    fn session_failed(&self, session_id: SessionId, error: &AppError) {
        tracing::error!(session_id = %session_id, error = %error, "Session failed");
    }

    fn refined_ready(&self, session_id: SessionId, refinement: &PostProcessResponse) {
        tracing::info!(
            session_id = %session_id,
            result_url = ?refinement.result_url,
            "Refinement ready"
        );
    }
}
