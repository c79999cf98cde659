//! Wire types for the stylization service.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use stylecast_core::config::WatermarkConfig;
use stylecast_core::{CropSpec, JobId, TextSpec};

/// `POST /transform`
#[derive(Debug, Clone, Serialize)]
pub struct TransformRequest {
    /// `data:<mime>;base64,<payload>`
    pub image: String,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkOptions {
    pub text: String,
    pub opacity: f32,
    pub position: String,
}

impl From<&WatermarkConfig> for WatermarkOptions {
    fn from(config: &WatermarkConfig) -> Self {
        Self {
            text: config.text.clone(),
            opacity: config.opacity,
            position: config.position.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformResponse {
    #[serde(rename = "jobId", alias = "job_id", alias = "id")]
    pub job_id: JobId,
}

/// `GET /status/{jobId}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, rename = "resultUrl", alias = "result_url", alias = "output")]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn pending() -> Self {
        Self {
            status: "pending".to_string(),
            result_url: None,
            error: None,
        }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            status: "completed".to_string(),
            result_url: Some(result_url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            result_url: None,
            error: Some(error.into()),
        }
    }
}

/// `POST /post-process`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessRequest {
    pub job_id: JobId,
    /// Product size label, e.g. `3x4`.
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextSpec>,
    pub crop: CropSpec,
}

/// Post-process output. Only `resultUrl` is interpreted; everything else is
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostProcessResponse {
    #[serde(default, rename = "resultUrl", alias = "result_url")]
    pub result_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Encodes image bytes as a data URL, sniffing the content type.
pub fn to_data_url(data: &[u8]) -> String {
    let mime = image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg");
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}
