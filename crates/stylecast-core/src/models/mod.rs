//! Domain models
//!
//! Plain data passed between the crop engine, text compositor, remote job
//! client and orchestrator. The orchestrator owns the mutable session; every
//! other component works on copies of these values.

pub mod composite;
pub mod crop;
pub mod fingerprint;
pub mod job;
pub mod text;

pub use composite::{CompositeBase, CompositeResult, OutputFormat};
pub use crop::{AspectRatio, CropSpec};
pub use fingerprint::Fingerprint;
pub use job::{JobFailure, JobId, JobStatus, RemoteJob};
pub use text::{TextPosition, TextSpec};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Identifies one upload session. A new id is issued every time the user
/// selects a photo, so late results from a replaced session can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}
