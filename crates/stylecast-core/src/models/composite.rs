use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::SessionId;

/// Encoding of the final composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(anyhow::anyhow!("Unsupported output format: {}", s)),
        }
    }
}

/// Which image the composite was built on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CompositeBase {
    /// The remote stylized result.
    Stylized { result_url: String },
    /// The user's original photo, used when no stylized result was available.
    Original { reason: String },
}

impl CompositeBase {
    pub fn is_stylized(&self) -> bool {
        matches!(self, CompositeBase::Stylized { .. })
    }
}

/// The final image handed downstream. Exactly one is produced per session
/// and it is never modified afterwards.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub session_id: SessionId,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub base: CompositeBase,
    pub created_at: DateTime<Utc>,
}

impl CompositeResult {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
