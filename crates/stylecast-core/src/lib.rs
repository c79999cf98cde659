//! Stylecast Core Library
//!
//! This crate provides the domain models, error types and configuration that
//! are shared by the processing, client and pipeline crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ClientConfig, OutputFormat, PipelineConfig, PollConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    AspectRatio, CompositeBase, CompositeResult, CropSpec, Fingerprint, JobFailure, JobId,
    JobStatus, RemoteJob, SessionId, TextPosition, TextSpec,
};
