//! Stylecast pipeline
//!
//! Coordinates the remote stylization job with the user's local crop and
//! text steps and merges both into one final image per session.
//!
//! ```text
//! file selected ─┬─> crop ──> text ──┐
//!                └─> submit ──> poll ─┴─> composite ──> result_ready
//! ```

pub mod events;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use events::{PipelineEvents, TracingEvents};
pub use orchestrator::Orchestrator;
pub use session::{SelectedFile, SourceImage, UploadSession};
pub use state::{
    CompositePlan, Effect, JobTrack, Phase, SessionFlags, SessionState, TransitionError,
    UserTrack,
};
