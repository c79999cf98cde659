//! Shared fixtures for orchestrator tests.

#![allow(dead_code)]

use bytes::Bytes;
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stylecast_client::test_helpers::ScriptedTransport;
use stylecast_client::{JobClient, PostProcessResponse};
use stylecast_core::{AppError, CompositeResult, OutputFormat, PipelineConfig, SessionId};
use stylecast_pipeline::{Orchestrator, PipelineEvents};
use stylecast_processing::codec;
use stylecast_processing::test_helpers::MonoCanvasProvider;
use tokio::sync::Notify;

pub const RESULT_URL: &str = "https://cdn.example.com/results/job-1.png";

#[derive(Debug, Clone)]
pub enum Recorded {
    Waiting(SessionId, bool),
    Ready(CompositeResult),
    Failed(SessionId, String),
    Refined(SessionId, Option<String>),
}

#[derive(Default)]
pub struct RecordingEvents {
    log: Mutex<Vec<Recorded>>,
    changed: Notify,
}

impl RecordingEvents {
    fn push(&self, event: Recorded) {
        self.log.lock().unwrap().push(event);
        self.changed.notify_waiters();
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<CompositeResult> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Ready(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn waiting(&self) -> Vec<bool> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Waiting(_, waiting) => Some(waiting),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Failed(_, message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn refinements(&self) -> Vec<Option<String>> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Refined(_, url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Waits until `check` holds for the recorded events.
    pub async fn wait_for<F>(&self, check: F)
    where
        F: Fn(&RecordingEvents) -> bool,
    {
        let wait = async {
            loop {
                let changed = self.changed.notified();
                if check(self) {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(3600), wait)
            .await
            .expect("timed out waiting for pipeline events");
    }

    pub async fn wait_for_result(&self) -> CompositeResult {
        self.wait_for(|events| !events.results().is_empty()).await;
        self.results().remove(0)
    }
}

impl PipelineEvents for RecordingEvents {
    fn waiting_for_job(&self, session_id: SessionId, waiting: bool) {
        self.push(Recorded::Waiting(session_id, waiting));
    }

    fn result_ready(&self, result: &CompositeResult) {
        self.push(Recorded::Ready(result.clone()));
    }

    fn session_failed(&self, session_id: SessionId, error: &AppError) {
        self.push(Recorded::Failed(session_id, error.to_string()));
    }

    fn refined_ready(&self, session_id: SessionId, refinement: &PostProcessResponse) {
        self.push(Recorded::Refined(session_id, refinement.result_url.clone()));
    }
}

pub fn png(width: u32, height: u32) -> Bytes {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([120, 90, 60, 255]),
    ));
    codec::encode(&image, OutputFormat::Png, 90).unwrap()
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub transport: Arc<ScriptedTransport>,
    pub events: Arc<RecordingEvents>,
    pub canvases: Arc<MonoCanvasProvider>,
}

pub fn harness(config: PipelineConfig, transport: ScriptedTransport) -> Harness {
    let transport = Arc::new(transport);
    let client = Arc::new(JobClient::new(transport.clone(), config.client.clone()));
    let events = Arc::new(RecordingEvents::default());
    let canvases = Arc::new(MonoCanvasProvider::new());
    let orchestrator = Orchestrator::new(config, client, canvases.clone(), events.clone());
    Harness {
        orchestrator,
        transport,
        events,
        canvases,
    }
}

/// Polls `check` until it holds.
pub async fn wait_until<F>(check: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(3600), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}
