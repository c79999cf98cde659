//! Stylecast CLI: stylize a photo, crop it and overlay names.
//!
//! Set STYLECAST_API_URL (and STYLECAST_API_TOKEN if the service needs one).
//! FONT_PATH must point at a TrueType/OpenType font for the `run` command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stylecast_cli::{default_output_path, init_tracing, parse_viewport, ChannelEvents, PipelineEvent};
use stylecast_client::JobClient;
use stylecast_core::{AspectRatio, JobId, PipelineConfig, TextPosition, TextSpec};
use stylecast_pipeline::{Orchestrator, SelectedFile};
use stylecast_processing::{codec, CropEngine, FontBook};

/// How long `run` keeps listening for a refinement after the result.
const REFINEMENT_WAIT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "stylecast", about = "Stylized photo keepsakes from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stylize a photo, crop it and render the names onto the result
    Run {
        /// Path to the photo
        file: PathBuf,
        /// Aspect ratio: 3:4 or 5:7
        #[arg(long)]
        ratio: Option<AspectRatio>,
        /// First name
        #[arg(long, default_value = "")]
        name1: String,
        /// Second name
        #[arg(long, default_value = "")]
        name2: String,
        /// Optional line under the names
        #[arg(long)]
        subtitle: Option<String>,
        /// top, center or bottom
        #[arg(long, default_value = "bottom")]
        position: TextPosition,
        /// Text color as #RRGGBB
        #[arg(long)]
        color: Option<String>,
        /// Horizontal drag of the photo under the crop window, in pixels
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        drag_x: f64,
        /// Vertical drag of the photo under the crop window, in pixels
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        drag_y: f64,
        /// Where to write the result (defaults to <name>.stylecast.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also save the cropped preview shown during the text step
        #[arg(long)]
        preview_out: Option<PathBuf>,
    },
    /// Compute a crop without contacting the service
    Crop {
        /// Path to the photo
        file: PathBuf,
        /// Aspect ratio: 3:4 or 5:7
        #[arg(long)]
        ratio: Option<AspectRatio>,
        /// Display area as WIDTHxHEIGHT
        #[arg(long, default_value = "800x600")]
        viewport: String,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        drag_x: f64,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        drag_y: f64,
    },
    /// Poll an existing job until it finishes
    Status {
        /// Job id returned by the service
        job_id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.is_production());

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            ratio,
            name1,
            name2,
            subtitle,
            position,
            color,
            drag_x,
            drag_y,
            out,
            preview_out,
        } => {
            let mut text = TextSpec::new(name1, name2).with_position(position);
            if let Some(subtitle) = subtitle {
                text = text.with_subtitle(subtitle);
            }
            if let Some(color) = color {
                text.color = color;
            }
            let out = out.unwrap_or_else(|| default_output_path(&file, config.output_format));
            let request = RunRequest {
                file,
                ratio,
                drag: (drag_x, drag_y),
                text,
                out,
                preview_out,
            };
            run(config, request).await?;
        }
        Commands::Crop {
            file,
            ratio,
            viewport,
            drag_x,
            drag_y,
        } => {
            let (viewport_w, viewport_h) = parse_viewport(&viewport)?;
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let image = codec::decode(&data)?;
            let mut engine = CropEngine::open(
                image.width(),
                image.height(),
                viewport_w,
                viewport_h,
                ratio.unwrap_or(config.default_ratio),
            )?;
            engine.drag(drag_x, drag_y);
            print_json(&engine.apply())?;
        }
        Commands::Status { job_id } => {
            let client = JobClient::from_config(config.client.clone())?;
            let job = client.poll(&JobId(job_id)).await;
            print_json(&job)?;
        }
    }

    Ok(())
}

struct RunRequest {
    file: PathBuf,
    ratio: Option<AspectRatio>,
    drag: (f64, f64),
    text: TextSpec,
    out: PathBuf,
    preview_out: Option<PathBuf>,
}

async fn run(config: PipelineConfig, request: RunRequest) -> anyhow::Result<()> {
    let font_path = config
        .font_path
        .clone()
        .context("FONT_PATH must be set to render text")?;
    let fonts = FontBook::from_paths(&font_path, config.accent_font_path.as_deref())?;

    let client = Arc::new(JobClient::from_config(config.client.clone())?);
    let janitor = client.spawn_janitor(Duration::from_secs(60));
    let post_process = config.post_process_enabled;

    let (events, mut rx) = ChannelEvents::new();
    let orchestrator = Orchestrator::new(config, client, Arc::new(fonts), Arc::new(events));

    let file = SelectedFile::from_path(&request.file)
        .await
        .with_context(|| format!("Failed to read {}", request.file.display()))?;
    let mut engine = orchestrator.on_file_selected(file).await?;
    if let Some(ratio) = request.ratio {
        engine.set_ratio(ratio);
    }
    engine.drag(request.drag.0, request.drag.1);

    let preview = orchestrator.on_crop_finished(Some(engine.apply())).await?;
    if let Some(path) = &request.preview_out {
        preview
            .save(path)
            .with_context(|| format!("Failed to write preview to {}", path.display()))?;
    }

    orchestrator.on_text_finished(Some(request.text)).await?;

    let result = loop {
        match rx.recv().await {
            Some(PipelineEvent::Waiting(true)) => {
                tracing::info!("Waiting for the stylized photo");
            }
            Some(PipelineEvent::Ready(result)) => break result,
            Some(PipelineEvent::Failed { message, hint }) => match hint {
                Some(hint) => anyhow::bail!("{} ({})", message, hint),
                None => anyhow::bail!("{}", message),
            },
            Some(_) => {}
            None => anyhow::bail!("Pipeline stopped without a result"),
        }
    };

    tokio::fs::write(&request.out, &result.data)
        .await
        .with_context(|| format!("Failed to write {}", request.out.display()))?;
    print_json(&serde_json::json!({
        "output": request.out,
        "width": result.width,
        "height": result.height,
        "format": result.format,
        "base": result.base,
    }))?;

    if post_process && result.base.is_stylized() {
        match tokio::time::timeout(REFINEMENT_WAIT, async {
            loop {
                match rx.recv().await {
                    Some(PipelineEvent::Refined(url)) => return url,
                    Some(_) => {}
                    None => return None,
                }
            }
        })
        .await
        {
            Ok(Some(url)) => print_json(&serde_json::json!({ "refined_url": url }))?,
            Ok(None) => tracing::info!("No refinement available"),
            Err(_) => tracing::warn!("Timed out waiting for refinement"),
        }
    }

    janitor.abort();
    Ok(())
}
