use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use stylecast_core::{AppError, Fingerprint, SessionId};
use stylecast_processing::CompositeInputs;

use crate::state::{CompositePlan, SessionState};

/// A photo picked by the user, before decoding.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub data: Bytes,
    /// Last-modified time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>, modified_ms: i64) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            modified_ms,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, AppError> {
        let data = tokio::fs::read(path).await?;
        let metadata = tokio::fs::metadata(path).await?;
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, data, modified_ms))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_file(&self.name, self.data.len() as u64, self.modified_ms)
    }
}

/// Raw bytes plus the decoded image.
#[derive(Clone)]
pub struct SourceImage {
    pub data: Bytes,
    pub image: Arc<DynamicImage>,
}

impl SourceImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub struct UploadSession {
    pub id: SessionId,
    pub file_name: String,
    pub fingerprint: Fingerprint,
    pub source: SourceImage,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(id: SessionId, file: &SelectedFile, image: DynamicImage) -> Self {
        Self {
            id,
            file_name: file.name.clone(),
            fingerprint: file.fingerprint(),
            source: SourceImage {
                data: file.data.clone(),
                image: Arc::new(image),
            },
            state: SessionState::new(),
            created_at: Utc::now(),
        }
    }

    pub fn composite_inputs(&self, plan: CompositePlan) -> CompositeInputs {
        CompositeInputs {
            session_id: self.id,
            original: Arc::clone(&self.source.image),
            crop: plan.crop,
            text: plan.text,
            base: plan.base,
        }
    }
}
