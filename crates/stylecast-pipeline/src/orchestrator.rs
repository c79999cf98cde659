//! Pipeline orchestrator
//!
//! Owns the current [`UploadSession`]. User steps arrive as method calls;
//! the remote job runs in a spawned task that reports back by session id,
//! so results for a replaced session are dropped. The session lock is never
//! held across an `.await`, and presentation callbacks run with no lock held.

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use stylecast_client::JobClient;
use stylecast_core::constants::MAX_SUBMIT_DIMENSION;
use stylecast_core::{
    AppError, CompositeBase, CompositeResult, CropSpec, ErrorMetadata, Fingerprint, JobFailure,
    JobId, LogLevel, PipelineConfig, RemoteJob, SessionId, TextSpec,
};
use stylecast_processing::{codec, default_crop, CanvasProvider, CompositeInputs, CropEngine, FinalCompositor};
use tokio::task::{AbortHandle, JoinError};

use crate::events::PipelineEvents;
use crate::session::{SelectedFile, SourceImage, UploadSession};
use crate::state::{Effect, SessionFlags};

fn join_error(err: JoinError) -> AppError {
    AppError::Internal(format!("Background task failed: {}", err))
}

struct Inner {
    config: PipelineConfig,
    client: Arc<JobClient>,
    compositor: Arc<FinalCompositor>,
    events: Arc<dyn PipelineEvents>,
    current: Mutex<Option<UploadSession>>,
    job_track: Mutex<Option<AbortHandle>>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        client: Arc<JobClient>,
        canvases: Arc<dyn CanvasProvider>,
        events: Arc<dyn PipelineEvents>,
    ) -> Self {
        let compositor = Arc::new(FinalCompositor::new(
            canvases,
            config.output_format,
            config.jpeg_quality,
        ));
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                compositor,
                events,
                current: Mutex::new(None),
                job_track: Mutex::new(None),
            }),
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn lock(&self) -> MutexGuard<'_, Option<UploadSession>> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_job_track(&self, handle: Option<AbortHandle>) {
        let previous = std::mem::replace(
            &mut *self
                .inner
                .job_track
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            handle,
        );
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|session| session.id)
    }

    /// Progress flags of the current session.
    pub fn snapshot(&self) -> Option<SessionFlags> {
        self.lock().as_ref().map(|session| session.state.flags())
    }

    pub fn result(&self) -> Option<Arc<CompositeResult>> {
        self.lock().as_ref().and_then(|session| session.state.result())
    }

    /// Drops the current session. Late results of its job are discarded.
    pub fn reset(&self) {
        self.discard_current("reset");
    }

    fn discard_current(&self, reason: &str) {
        let previous = self.lock().take();
        self.replace_job_track(None);
        if let Some(session) = previous {
            tracing::info!(
                session_id = %session.id,
                reason = reason,
                "Session discarded"
            );
        }
    }

    /// Starts a new session for `file`, replacing any current one, and
    /// kicks off the remote job. Returns a crop engine over the photo at the
    /// default ratio.
    pub async fn on_file_selected(&self, file: SelectedFile) -> Result<CropEngine, AppError> {
        let session_id = SessionId::new();
        self.discard_current("replaced by a new photo");

        let image = match self.load(&file).await {
            Ok(image) => image,
            Err(err) => {
                log_session_error(session_id, &err);
                self.inner.events.session_failed(session_id, &err);
                return Err(err);
            }
        };

        let (width, height) = image.dimensions();
        let engine = CropEngine::open_unscaled(width, height, self.inner.config.default_ratio)?;
        let session = UploadSession::new(session_id, &file, image);
        let fingerprint = session.fingerprint.clone();
        let source = session.source.clone();

        tracing::info!(
            session_id = %session_id,
            file_name = %file.name,
            fingerprint = %fingerprint,
            width = width,
            height = height,
            "Session started"
        );

        *self.lock() = Some(session);
        let handle = self.spawn_job_track(session_id, source, fingerprint);
        self.replace_job_track(Some(handle));
        Ok(engine)
    }

    async fn load(&self, file: &SelectedFile) -> Result<DynamicImage, AppError> {
        if file.data.is_empty() {
            return Err(AppError::InvalidInput("Selected file is empty".to_string()));
        }
        let limit = self.inner.config.max_upload_size_bytes;
        if file.data.len() > limit {
            return Err(AppError::PayloadTooLarge {
                size: file.data.len(),
                limit,
            });
        }
        let data = file.data.clone();
        tokio::task::spawn_blocking(move || codec::decode(&data))
            .await
            .map_err(join_error)?
    }

    fn spawn_job_track(
        &self,
        session_id: SessionId,
        source: SourceImage,
        fingerprint: Fingerprint,
    ) -> AbortHandle {
        let weak = Arc::downgrade(&self.inner);
        let client = Arc::clone(&self.inner.client);
        let quality = self.inner.config.jpeg_quality;

        tokio::spawn(async move {
            let job = match upload_bytes(&source, quality).await {
                Ok(upload) => match client.submit(upload, &fingerprint).await {
                    Ok(job_id) => {
                        if let Some(this) = Self::upgrade(&weak) {
                            this.on_job_submitted(session_id, job_id.clone());
                        }
                        client.poll(&job_id).await
                    }
                    Err(err) => RemoteJob::failed(None, JobFailure::Unreachable(err.to_string())),
                },
                Err(err) => RemoteJob::failed(
                    None,
                    JobFailure::Unreachable(format!("Could not prepare upload: {}", err)),
                ),
            };

            if let Some(this) = Self::upgrade(&weak) {
                this.on_job_finished(session_id, job).await;
            }
        })
        .abort_handle()
    }

    fn on_job_submitted(&self, session_id: SessionId, job_id: JobId) {
        let mut current = self.lock();
        if let Some(session) = current.as_mut().filter(|s| s.id == session_id) {
            tracing::debug!(session_id = %session_id, job_id = %job_id, "Polling job");
            session.state.job_submitted(job_id);
        }
    }

    /// Terminal job outcome from the job track. Composites if the user is
    /// already done.
    async fn on_job_finished(&self, session_id: SessionId, job: RemoteJob) {
        let work = {
            let mut current = self.lock();
            let Some(session) = current.as_mut().filter(|s| s.id == session_id) else {
                tracing::debug!(
                    session_id = %session_id,
                    "Discarding job result for a replaced session"
                );
                return;
            };
            match session.state.job_finished(job) {
                Effect::Composite(plan) => {
                    let job_id = plan.job_id.clone();
                    Some((session.composite_inputs(plan), job_id))
                }
                Effect::AwaitUser => {
                    tracing::info!(session_id = %session_id, "Job finished before the user");
                    None
                }
                _ => {
                    tracing::debug!(session_id = %session_id, "Ignoring duplicate job result");
                    None
                }
            }
        };

        if let Some((inputs, job_id)) = work {
            self.inner.events.waiting_for_job(session_id, false);
            if let Err(err) = self.composite(inputs, job_id).await {
                tracing::debug!(session_id = %session_id, error = %err, "Composite failed");
            }
        }
    }

    /// Accepts the crop (`None` uses the centered default) and returns the
    /// cropped preview for the text step.
    pub async fn on_crop_finished(&self, crop: Option<CropSpec>) -> Result<RgbaImage, AppError> {
        let (crop, original) = {
            let mut current = self.lock();
            let session = current
                .as_mut()
                .ok_or_else(|| AppError::InvalidInput("No photo selected".to_string()))?;
            let (width, height) = session.source.dimensions();
            let crop = match crop {
                Some(crop)
                    if crop.source_width == width
                        && crop.source_height == height
                        && crop.is_within_source() =>
                {
                    crop
                }
                Some(_) => {
                    return Err(AppError::InvalidInput(
                        "Crop does not fit the selected photo".to_string(),
                    ))
                }
                None => default_crop(width, height, self.inner.config.default_ratio),
            };
            session.state.finish_crop(crop)?;
            tracing::info!(
                session_id = %session.id,
                ratio = %crop.ratio,
                x = crop.x,
                y = crop.y,
                width = crop.width,
                height = crop.height,
                "Crop accepted"
            );
            (crop, Arc::clone(&session.source.image))
        };

        let compositor = Arc::clone(&self.inner.compositor);
        tokio::task::spawn_blocking(move || {
            compositor.preview(&original, &crop, &TextSpec::new("", ""))
        })
        .await
        .map_err(join_error)?
    }

    /// Accepts the overlay text (`None` or blank names mean no overlay).
    /// Composites right away if the job is done, otherwise reports that the
    /// user is waiting.
    pub async fn on_text_finished(&self, text: Option<TextSpec>) -> Result<(), AppError> {
        let text = text.and_then(TextSpec::normalized);
        if let Some(text) = &text {
            text.rgba()?;
        }

        let (session_id, work) = {
            let mut current = self.lock();
            let session = current
                .as_mut()
                .ok_or_else(|| AppError::InvalidInput("No photo selected".to_string()))?;
            let work = match session.state.finish_text(text)? {
                Effect::Composite(plan) => {
                    let job_id = plan.job_id.clone();
                    Some((session.composite_inputs(plan), job_id))
                }
                _ => None,
            };
            (session.id, work)
        };

        match work {
            Some((inputs, job_id)) => self.composite(inputs, job_id).await,
            None => {
                tracing::info!(session_id = %session_id, "Waiting for stylization job");
                self.inner.events.waiting_for_job(session_id, true);
                Ok(())
            }
        }
    }

    /// Renders and delivers the result. Runs at most once per session.
    async fn composite(
        &self,
        inputs: CompositeInputs,
        job_id: Option<JobId>,
    ) -> Result<(), AppError> {
        let session_id = inputs.session_id;
        let fallback = self.inner.config.fallback_to_original;

        let stylized = match &inputs.base {
            CompositeBase::Stylized { result_url } => self.fetch_stylized(session_id, result_url).await,
            CompositeBase::Original { reason } => {
                tracing::warn!(
                    session_id = %session_id,
                    reason = %reason,
                    "Stylization unavailable"
                );
                None
            }
        };

        if stylized.is_none() && !fallback {
            let reason = match &inputs.base {
                CompositeBase::Original { reason } => reason.clone(),
                CompositeBase::Stylized { .. } => "stylized result could not be loaded".to_string(),
            };
            let err = AppError::Remote(reason);
            self.fail(session_id, &err);
            return Err(err);
        }

        let crop = inputs.crop;
        let text = inputs.text.clone();
        let compositor = Arc::clone(&self.inner.compositor);
        let outcome = tokio::task::spawn_blocking(move || compositor.compose(&inputs, stylized.as_ref()))
            .await
            .map_err(join_error)
            .and_then(|result| result);

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.fail(session_id, &err);
                return Err(err);
            }
        };

        let show = {
            let mut current = self.lock();
            match current.as_mut().filter(|s| s.id == session_id) {
                Some(session) => match session.state.composite_finished(result) {
                    Effect::Show(result) => Some(result),
                    _ => None,
                },
                None => None,
            }
        };
        let Some(result) = show else {
            tracing::debug!(session_id = %session_id, "Dropping composite for a replaced session");
            return Ok(());
        };

        self.inner.events.result_ready(&result);
        if let Some(session) = self.lock().as_mut().filter(|s| s.id == session_id) {
            session.state.mark_shown();
        }
        tracing::info!(
            session_id = %session_id,
            stylized = result.base.is_stylized(),
            "Result shown"
        );

        if self.inner.config.post_process_enabled && result.base.is_stylized() {
            if let Some(job_id) = job_id {
                self.spawn_post_process(session_id, job_id, crop, text);
            }
        }
        Ok(())
    }

    async fn fetch_stylized(&self, session_id: SessionId, url: &str) -> Option<DynamicImage> {
        let data: Bytes = match self.inner.client.download(url).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    session_id = %session_id,
                    result_url = %url,
                    error = %err,
                    "Failed to download stylized result"
                );
                return None;
            }
        };
        match tokio::task::spawn_blocking(move || codec::decode(&data)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(err)) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %err,
                    "Stylized result is not a readable image"
                );
                None
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Decode task failed");
                None
            }
        }
    }

    fn spawn_post_process(
        &self,
        session_id: SessionId,
        job_id: JobId,
        crop: CropSpec,
        text: Option<TextSpec>,
    ) {
        let weak = Arc::downgrade(&self.inner);
        let client = Arc::clone(&self.inner.client);
        tokio::spawn(async move {
            let Some(refinement) = client
                .post_process(&job_id, crop.ratio, text.as_ref(), &crop)
                .await
            else {
                return;
            };
            let Some(this) = Self::upgrade(&weak) else {
                return;
            };
            if this.current_session_id() == Some(session_id) {
                this.inner.events.refined_ready(session_id, &refinement);
            }
        });
    }

    fn fail(&self, session_id: SessionId, err: &AppError) {
        let aborted = {
            let mut current = self.lock();
            match current.as_mut().filter(|s| s.id == session_id) {
                Some(session) => {
                    session.state.abort(err.to_string());
                    true
                }
                None => false,
            }
        };
        if aborted {
            log_session_error(session_id, err);
            self.inner.events.session_failed(session_id, err);
        }
    }
}

fn log_session_error(session_id: SessionId, err: &AppError) {
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(session_id = %session_id, error = %err, error_code = code, "Session failed");
        }
        LogLevel::Warn => {
            tracing::warn!(session_id = %session_id, error = %err, error_code = code, "Session failed");
        }
        LogLevel::Error => {
            tracing::error!(session_id = %session_id, error = %err, error_code = code, "Session failed");
        }
    }
}

/// The original bytes unless the photo is larger than the service accepts,
/// in which case a downscaled JPEG.
async fn upload_bytes(source: &SourceImage, quality: u8) -> Result<Bytes, AppError> {
    let (width, height) = source.dimensions();
    if width.max(height) <= MAX_SUBMIT_DIMENSION {
        return Ok(source.data.clone());
    }
    let image = Arc::clone(&source.image);
    tokio::task::spawn_blocking(move || codec::prepare_upload(&image, MAX_SUBMIT_DIMENSION, quality))
        .await
        .map_err(join_error)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stylecast_client::test_helpers::ScriptedTransport;
    use stylecast_core::OutputFormat;
    use stylecast_processing::test_helpers::MonoCanvasProvider;

    #[derive(Default)]
    struct Counter {
        results: AtomicUsize,
        failures: AtomicUsize,
    }

    impl PipelineEvents for Counter {
        fn waiting_for_job(&self, _session_id: SessionId, _waiting: bool) {}

        fn result_ready(&self, _result: &CompositeResult) {
            self.results.fetch_add(1, Ordering::SeqCst);
        }

        fn session_failed(&self, _session_id: SessionId, _error: &AppError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn png(width: u32, height: u32) -> Bytes {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 100, 50, 255]),
        ));
        codec::encode(&image, OutputFormat::Png, 90).unwrap()
    }

    fn setup() -> (Orchestrator, Arc<ScriptedTransport>, Arc<Counter>) {
        let transport = Arc::new(ScriptedTransport::new().with_status_gate());
        let config = PipelineConfig::default();
        let client = Arc::new(JobClient::new(transport.clone(), config.client.clone()));
        let events = Arc::new(Counter::default());
        let orchestrator = Orchestrator::new(
            config,
            client,
            Arc::new(MonoCanvasProvider::new()),
            events.clone(),
        );
        (orchestrator, transport, events)
    }

    #[tokio::test]
    async fn test_duplicate_job_completion_shows_once() {
        let (orchestrator, transport, events) = setup();
        transport.set_download("https://cdn.example.com/a.png", png(80, 60));

        orchestrator
            .on_file_selected(SelectedFile::new("a.png", png(160, 120), 1))
            .await
            .unwrap();
        let session_id = orchestrator.current_session_id().unwrap();
        orchestrator.on_crop_finished(None).await.unwrap();
        orchestrator
            .on_text_finished(Some(TextSpec::new("Ana", "Jon")))
            .await
            .unwrap();

        let done = RemoteJob::completed(JobId::from("job-1"), "https://cdn.example.com/a.png".into());
        orchestrator.on_job_finished(session_id, done.clone()).await;
        orchestrator.on_job_finished(session_id, done).await;

        assert_eq!(events.results.load(Ordering::SeqCst), 1);
        let flags = orchestrator.snapshot().unwrap();
        assert!(flags.composite_complete && flags.result_shown);
        assert!(orchestrator.result().unwrap().base.is_stylized());
    }

    #[tokio::test]
    async fn test_stale_job_result_is_discarded() {
        let (orchestrator, _transport, events) = setup();

        orchestrator
            .on_file_selected(SelectedFile::new("first.png", png(100, 100), 1))
            .await
            .unwrap();
        let stale = orchestrator.current_session_id().unwrap();
        orchestrator
            .on_file_selected(SelectedFile::new("second.png", png(120, 100), 2))
            .await
            .unwrap();
        assert_ne!(orchestrator.current_session_id(), Some(stale));

        orchestrator
            .on_job_finished(
                stale,
                RemoteJob::completed(JobId::from("job-1"), "https://cdn.example.com/x.png".into()),
            )
            .await;

        let flags = orchestrator.snapshot().unwrap();
        assert!(!flags.job_complete);
        assert_eq!(events.results.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let (orchestrator, transport, events) = setup();
        let mut config = orchestrator.config().clone();
        config.max_upload_size_bytes = 10;
        let orchestrator = Orchestrator::new(
            config,
            Arc::clone(&orchestrator.inner.client),
            Arc::new(MonoCanvasProvider::new()),
            events.clone(),
        );

        let err = orchestrator
            .on_file_selected(SelectedFile::new("big.png", png(50, 50), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));
        assert_eq!(events.failures.load(Ordering::SeqCst), 1);
        assert_eq!(transport.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_steps_without_session_are_rejected() {
        let (orchestrator, _transport, _events) = setup();
        assert!(orchestrator.on_crop_finished(None).await.is_err());
        assert!(orchestrator.on_text_finished(None).await.is_err());
        assert!(orchestrator.snapshot().is_none());
    }
}
