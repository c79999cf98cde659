//! Session state machine
//!
//! A session runs two tracks side by side: the user's edit steps (crop, then
//! text) and the remote job (submit, then poll). Whichever track finishes
//! last triggers the composite. Every transition returns the [`Effect`] the
//! orchestrator should carry out; actions that must happen once (composite,
//! show) are only ever handed out by a single transition.

use std::sync::Arc;
use stylecast_core::{
    AppError, CompositeBase, CompositeResult, CropSpec, JobFailure, JobId, JobStatus, RemoteJob,
    TextSpec,
};

#[derive(Debug, Clone, PartialEq)]
pub enum UserTrack {
    Cropping,
    EnteringText { crop: CropSpec },
    Done { crop: CropSpec, text: Option<TextSpec> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobTrack {
    Submitting,
    Polling { job_id: JobId },
    Completed { job_id: JobId, result_url: String },
    /// `job_id` is `None` when the submission itself never went through.
    Failed {
        job_id: Option<JobId>,
        failure: JobFailure,
    },
}

impl JobTrack {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobTrack::Completed { .. } | JobTrack::Failed { .. })
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobTrack::Submitting => None,
            JobTrack::Polling { job_id } | JobTrack::Completed { job_id, .. } => Some(job_id),
            JobTrack::Failed { job_id, .. } => job_id.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Phase {
    Editing,
    Compositing,
    Composited(Arc<CompositeResult>),
    Shown(Arc<CompositeResult>),
    Aborted(String),
}

/// What the composite needs from the state, taken exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePlan {
    pub crop: CropSpec,
    pub text: Option<TextSpec>,
    pub base: CompositeBase,
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Crop accepted; show the text step.
    OpenTextStep,
    /// User is done; the job is still running.
    AwaitJob,
    /// Job is done; the user is still editing.
    AwaitUser,
    /// Both tracks are done. Render now.
    Composite(CompositePlan),
    /// Deliver the result to the presentation layer.
    Show(Arc<CompositeResult>),
    /// Late or duplicate notification.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{action} is not allowed while {state}")]
    OutOfOrder {
        action: &'static str,
        state: &'static str,
    },
    #[error("session was aborted: {0}")]
    Aborted(String),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidTransition(err.to_string())
    }
}

/// The seven progress flags of a session, derived from its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlags {
    pub file_loaded: bool,
    pub crop_complete: bool,
    pub job_submitted: bool,
    pub job_complete: bool,
    pub text_complete: bool,
    pub composite_complete: bool,
    pub result_shown: bool,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    user: UserTrack,
    job: JobTrack,
    phase: Phase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            user: UserTrack::Cropping,
            job: JobTrack::Submitting,
            phase: Phase::Editing,
        }
    }

    pub fn user(&self) -> &UserTrack {
        &self.user
    }

    pub fn job(&self) -> &JobTrack {
        &self.job
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn crop(&self) -> Option<&CropSpec> {
        match &self.user {
            UserTrack::Cropping => None,
            UserTrack::EnteringText { crop } | UserTrack::Done { crop, .. } => Some(crop),
        }
    }

    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            file_loaded: true,
            crop_complete: !matches!(self.user, UserTrack::Cropping),
            job_submitted: !matches!(self.job, JobTrack::Submitting),
            job_complete: self.job.is_terminal(),
            text_complete: matches!(self.user, UserTrack::Done { .. }),
            composite_complete: matches!(self.phase, Phase::Composited(_) | Phase::Shown(_)),
            result_shown: matches!(self.phase, Phase::Shown(_)),
        }
    }

    fn state_name(&self) -> &'static str {
        match (&self.phase, &self.user) {
            (Phase::Editing, UserTrack::Cropping) => "cropping",
            (Phase::Editing, UserTrack::EnteringText { .. }) => "entering text",
            (Phase::Editing, UserTrack::Done { .. }) => "waiting for the job",
            (Phase::Compositing, _) => "compositing",
            (Phase::Composited(_), _) => "composited",
            (Phase::Shown(_), _) => "showing the result",
            (Phase::Aborted(_), _) => "aborted",
        }
    }

    fn ensure_live(&self) -> Result<(), TransitionError> {
        match &self.phase {
            Phase::Aborted(reason) => Err(TransitionError::Aborted(reason.clone())),
            _ => Ok(()),
        }
    }

    pub fn finish_crop(&mut self, crop: CropSpec) -> Result<Effect, TransitionError> {
        self.ensure_live()?;
        match self.user {
            UserTrack::Cropping => {
                self.user = UserTrack::EnteringText { crop };
                Ok(Effect::OpenTextStep)
            }
            _ => Err(TransitionError::OutOfOrder {
                action: "finishing the crop",
                state: self.state_name(),
            }),
        }
    }

    pub fn finish_text(&mut self, text: Option<TextSpec>) -> Result<Effect, TransitionError> {
        self.ensure_live()?;
        let crop = match &self.user {
            UserTrack::EnteringText { crop } => *crop,
            _ => {
                return Err(TransitionError::OutOfOrder {
                    action: "finishing the text",
                    state: self.state_name(),
                })
            }
        };
        self.user = UserTrack::Done { crop, text };
        Ok(self.try_composite().unwrap_or(Effect::AwaitJob))
    }

    pub fn job_submitted(&mut self, job_id: JobId) -> Effect {
        if matches!(self.job, JobTrack::Submitting) && matches!(self.phase, Phase::Editing) {
            self.job = JobTrack::Polling { job_id };
            Effect::AwaitUser
        } else {
            Effect::Ignored
        }
    }

    /// Records the terminal job outcome. A second terminal notification is
    /// ignored.
    pub fn job_finished(&mut self, job: RemoteJob) -> Effect {
        if self.job.is_terminal() || !matches!(self.phase, Phase::Editing) {
            return Effect::Ignored;
        }
        let job_id = job.id.or_else(|| self.job.job_id().cloned());
        self.job = match (job.status, job.result_url) {
            (JobStatus::Completed, Some(result_url)) => JobTrack::Completed {
                job_id: job_id.unwrap_or_else(|| JobId(String::new())),
                result_url,
            },
            (JobStatus::Completed, None) => JobTrack::Failed {
                job_id,
                failure: JobFailure::MissingResult,
            },
            (JobStatus::Failed, _) => JobTrack::Failed {
                job_id,
                failure: job
                    .failure
                    .unwrap_or_else(|| JobFailure::Rejected("unknown failure".to_string())),
            },
            (JobStatus::Pending, _) => return Effect::Ignored,
        };
        self.try_composite().unwrap_or(Effect::AwaitUser)
    }

    /// Hands out the composite plan when both tracks are done. Moves the
    /// phase to `Compositing`, so the plan is handed out once.
    fn try_composite(&mut self) -> Option<Effect> {
        if !matches!(self.phase, Phase::Editing) {
            return None;
        }
        let UserTrack::Done { crop, text } = &self.user else {
            return None;
        };
        let base = match &self.job {
            JobTrack::Completed { result_url, .. } => CompositeBase::Stylized {
                result_url: result_url.clone(),
            },
            JobTrack::Failed { failure, .. } => CompositeBase::Original {
                reason: failure.to_string(),
            },
            JobTrack::Submitting | JobTrack::Polling { .. } => return None,
        };
        let plan = CompositePlan {
            crop: *crop,
            text: text.clone(),
            base,
            job_id: self.job.job_id().cloned(),
        };
        self.phase = Phase::Compositing;
        Some(Effect::Composite(plan))
    }

    pub fn composite_finished(&mut self, result: CompositeResult) -> Effect {
        match self.phase {
            Phase::Compositing => {
                let result = Arc::new(result);
                self.phase = Phase::Composited(Arc::clone(&result));
                Effect::Show(result)
            }
            _ => Effect::Ignored,
        }
    }

    /// Returns `true` the first time only.
    pub fn mark_shown(&mut self) -> bool {
        match &self.phase {
            Phase::Composited(result) => {
                self.phase = Phase::Shown(Arc::clone(result));
                true
            }
            _ => false,
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.phase = Phase::Aborted(reason.into());
    }

    pub fn result(&self) -> Option<Arc<CompositeResult>> {
        match &self.phase {
            Phase::Composited(result) | Phase::Shown(result) => Some(Arc::clone(result)),
            _ => None,
        }
    }
}
