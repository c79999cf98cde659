use anyhow::Context;
use std::path::{Path, PathBuf};
use stylecast_client::PostProcessResponse;
use stylecast_core::{AppError, CompositeResult, ErrorMetadata, OutputFormat, SessionId};
use stylecast_pipeline::PipelineEvents;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI. Logs go to stderr so JSON printed on
/// stdout stays parseable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        let console_fmt = tracing_subscriber::fmt::layer()
            .event_format(Format::default().compact().with_target(false))
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .init();
    }
}

/// Pipeline notifications forwarded to the command loop.
#[derive(Debug)]
pub enum PipelineEvent {
    Waiting(bool),
    Ready(CompositeResult),
    Failed {
        message: String,
        hint: Option<&'static str>,
    },
    Refined(Option<String>),
}

/// [`PipelineEvents`] that forwards everything into a channel.
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PipelineEvent) {
        // Receiver gone means the command already finished
        let _ = self.tx.send(event);
    }
}

impl PipelineEvents for ChannelEvents {
    fn waiting_for_job(&self, _session_id: SessionId, waiting: bool) {
        self.send(PipelineEvent::Waiting(waiting));
    }

    fn result_ready(&self, result: &CompositeResult) {
        self.send(PipelineEvent::Ready(result.clone()));
    }

    fn session_failed(&self, _session_id: SessionId, error: &AppError) {
        self.send(PipelineEvent::Failed {
            message: error.user_message(),
            hint: error.suggested_action(),
        });
    }

    fn refined_ready(&self, _session_id: SessionId, refinement: &PostProcessResponse) {
        self.send(PipelineEvent::Refined(refinement.result_url.clone()));
    }
}

/// Parses a `WIDTHxHEIGHT` viewport such as `800x600`.
pub fn parse_viewport(value: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .with_context(|| format!("Viewport must look like 800x600, got {:?}", value))?;
    let w: u32 = w.trim().parse().context("Invalid viewport width")?;
    let h: u32 = h.trim().parse().context("Invalid viewport height")?;
    if w == 0 || h == 0 {
        anyhow::bail!("Viewport dimensions must be positive");
    }
    Ok((w, h))
}

/// `photo.jpg` -> `photo.stylecast.png` next to the input.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}.stylecast.{}", stem, format.extension()))
}
