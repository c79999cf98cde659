//! Shared constants

/// Style selector sent with every transform request unless configured otherwise.
pub const DEFAULT_STYLE: &str = "pixar";

/// Default base URL of the stylization service.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

pub const POLL_BASE_DELAY_MS: u64 = 1_000;
pub const POLL_MAX_DELAY_MS: u64 = 10_000;
pub const POLL_MAX_ATTEMPTS: u32 = 30;

pub const SUBMIT_MAX_RETRIES: u32 = 3;
pub const SUBMIT_BASE_DELAY_MS: u64 = 1_000;

/// Fingerprint records older than this are purged from the client.
pub const IN_FLIGHT_TTL_SECS: u64 = 300;

pub const POST_PROCESS_MAX_RETRIES: u32 = 2;
pub const POST_PROCESS_BASE_DELAY_MS: u64 = 1_000;

pub const HTTP_TIMEOUT_SECS: u64 = 60;
pub const MAX_UPLOAD_SIZE_MB: usize = 20;
pub const JPEG_QUALITY: u8 = 90;
/// Longest side of the photo uploaded for stylization.
pub const MAX_SUBMIT_DIMENSION: u32 = 2048;

/// Placeholder shown in text previews when no names were entered.
pub const PREVIEW_PLACEHOLDER: &str = "YOUR NAMES";
