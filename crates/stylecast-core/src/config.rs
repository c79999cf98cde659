//! Configuration module
//!
//! Settings for the remote job client and the pipeline, read from
//! environment variables with defaults. Binaries call `dotenvy::dotenv()`
//! before [`PipelineConfig::from_env`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::models::AspectRatio;

pub use crate::models::OutputFormat;

/// Status polling schedule: `min(base_delay * 2^attempt, max_delay)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(POLL_BASE_DELAY_MS),
            max_delay: Duration::from_millis(POLL_MAX_DELAY_MS),
            max_attempts: POLL_MAX_ATTEMPTS,
        }
    }
}

/// Overlay watermark requested from the stylization service.
#[derive(Clone, Debug, PartialEq)]
pub struct WatermarkConfig {
    pub text: String,
    pub opacity: f32,
    pub position: String,
}

/// Remote job client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub style: String,
    pub http_timeout: Duration,
    pub submit_max_retries: u32,
    pub submit_base_delay: Duration,
    pub in_flight_ttl: Duration,
    pub post_process_max_retries: u32,
    pub post_process_base_delay: Duration,
    pub watermark: Option<WatermarkConfig>,
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            style: DEFAULT_STYLE.to_string(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            submit_max_retries: SUBMIT_MAX_RETRIES,
            submit_base_delay: Duration::from_millis(SUBMIT_BASE_DELAY_MS),
            in_flight_ttl: Duration::from_secs(IN_FLIGHT_TTL_SECS),
            post_process_max_retries: POST_PROCESS_MAX_RETRIES,
            post_process_base_delay: Duration::from_millis(POST_PROCESS_BASE_DELAY_MS),
            watermark: None,
            poll: PollConfig::default(),
        }
    }
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub client: ClientConfig,
    pub default_ratio: AspectRatio,
    pub output_format: OutputFormat,
    pub jpeg_quality: u8,
    pub max_upload_size_bytes: usize,
    /// Composite over the original photo when the remote job fails.
    pub fallback_to_original: bool,
    pub post_process_enabled: bool,
    pub font_path: Option<PathBuf>,
    pub accent_font_path: Option<PathBuf>,
    pub environment: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            default_ratio: AspectRatio::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: JPEG_QUALITY,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            fallback_to_original: true,
            post_process_enabled: false,
            font_path: None,
            accent_font_path: None,
            environment: "development".to_string(),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool_or(value: Option<String>, default: bool) -> bool {
    value
        .map(|s| s.trim().to_lowercase())
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PipelineConfig::default();
        let client_defaults = defaults.client.clone();

        let watermark = lookup("WATERMARK_TEXT")
            .filter(|s| !s.trim().is_empty())
            .map(|text| WatermarkConfig {
                text,
                opacity: parse_or(lookup("WATERMARK_OPACITY"), 0.5),
                position: lookup("WATERMARK_POSITION")
                    .unwrap_or_else(|| "bottom_right".to_string())
                    .to_lowercase(),
            });

        let poll = PollConfig {
            base_delay: Duration::from_millis(parse_or(
                lookup("POLL_BASE_DELAY_MS"),
                POLL_BASE_DELAY_MS,
            )),
            max_delay: Duration::from_millis(parse_or(
                lookup("POLL_MAX_DELAY_MS"),
                POLL_MAX_DELAY_MS,
            )),
            max_attempts: parse_or(lookup("POLL_MAX_ATTEMPTS"), POLL_MAX_ATTEMPTS),
        };

        let client = ClientConfig {
            api_url: lookup("STYLECAST_API_URL")
                .unwrap_or(client_defaults.api_url)
                .trim_end_matches('/')
                .to_string(),
            api_token: lookup("STYLECAST_API_TOKEN").filter(|s| !s.is_empty()),
            style: lookup("STYLECAST_STYLE").unwrap_or(client_defaults.style),
            http_timeout: Duration::from_secs(parse_or(
                lookup("STYLECAST_HTTP_TIMEOUT_SECS"),
                HTTP_TIMEOUT_SECS,
            )),
            submit_max_retries: parse_or(lookup("SUBMIT_MAX_RETRIES"), SUBMIT_MAX_RETRIES),
            submit_base_delay: client_defaults.submit_base_delay,
            in_flight_ttl: Duration::from_secs(parse_or(
                lookup("IN_FLIGHT_TTL_SECS"),
                IN_FLIGHT_TTL_SECS,
            )),
            post_process_max_retries: parse_or(
                lookup("POST_PROCESS_MAX_RETRIES"),
                POST_PROCESS_MAX_RETRIES,
            ),
            post_process_base_delay: client_defaults.post_process_base_delay,
            watermark,
            poll,
        };

        let default_ratio = match lookup("DEFAULT_ASPECT_RATIO") {
            Some(value) => value.parse()?,
            None => defaults.default_ratio,
        };
        let output_format = match lookup("OUTPUT_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.output_format,
        };

        let config = PipelineConfig {
            client,
            default_ratio,
            output_format,
            jpeg_quality: parse_or(lookup("JPEG_QUALITY"), JPEG_QUALITY),
            max_upload_size_bytes: parse_or(lookup("MAX_UPLOAD_SIZE_MB"), MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
            fallback_to_original: parse_bool_or(lookup("FALLBACK_TO_ORIGINAL"), true),
            post_process_enabled: parse_bool_or(lookup("POST_PROCESS_ENABLED"), false),
            font_path: lookup("FONT_PATH").map(PathBuf::from),
            accent_font_path: lookup("ACCENT_FONT_PATH").map(PathBuf::from),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.client.api_url.starts_with("http://")
            || self.client.api_url.starts_with("https://"))
        {
            return Err(anyhow::anyhow!(
                "STYLECAST_API_URL must be an http(s) URL, got {}",
                self.client.api_url
            ));
        }

        if self.client.poll.max_attempts == 0 {
            return Err(anyhow::anyhow!("POLL_MAX_ATTEMPTS must be at least 1"));
        }

        if self.client.poll.base_delay > self.client.poll.max_delay {
            return Err(anyhow::anyhow!(
                "POLL_BASE_DELAY_MS must not exceed POLL_MAX_DELAY_MS"
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if let Some(watermark) = &self.client.watermark {
            if !(0.0..=1.0).contains(&watermark.opacity) {
                return Err(anyhow::anyhow!(
                    "WATERMARK_OPACITY must be between 0.0 and 1.0"
                ));
            }
        }

        if self.is_production() && !self.client.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "STYLECAST_API_URL must use https in production"
            ));
        }

        Ok(())
    }
}
