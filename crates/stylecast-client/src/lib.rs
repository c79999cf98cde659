//! Client for the remote stylization service.
//!
//! [`JobClient`] submits a photo, polls the resulting job with capped
//! exponential backoff and optionally requests a post-process refinement.
//! Submissions are deduplicated by [`Fingerprint`]: concurrent callers share
//! one in-flight request, and a successful submission is remembered until it
//! is purged.

pub mod api;
pub mod error;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stylecast_core::{
    AspectRatio, ClientConfig, CropSpec, Fingerprint, JobFailure, JobId, JobStatus, RemoteJob,
    TextSpec,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub use api::{PostProcessRequest, PostProcessResponse, StatusResponse, TransformRequest};
pub use error::ClientError;
pub use transport::{HttpTransport, TransformTransport};

/// `min(base * 2^attempt, cap)`
pub fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt)).min(cap)
}

type SharedSubmission = Shared<BoxFuture<'static, Result<JobId, Arc<ClientError>>>>;

struct InFlight {
    started_at: Instant,
    submission: SharedSubmission,
}

type SharedPoll = Shared<BoxFuture<'static, RemoteJob>>;

pub struct JobClient {
    transport: Arc<dyn TransformTransport>,
    config: ClientConfig,
    in_flight: Mutex<HashMap<Fingerprint, InFlight>>,
    polls: Mutex<HashMap<JobId, SharedPoll>>,
}

impl JobClient {
    pub fn new(transport: Arc<dyn TransformTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            in_flight: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Client over [`HttpTransport`] built from the configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<Fingerprint, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of remembered submissions.
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Submits `image` for stylization, at most once per fingerprint.
    pub async fn submit(&self, image: Bytes, fingerprint: &Fingerprint) -> Result<JobId, ClientError> {
        let submission = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get(fingerprint) {
                Some(entry) => {
                    tracing::debug!(
                        fingerprint = %fingerprint,
                        "Joining existing submission"
                    );
                    entry.submission.clone()
                }
                None => {
                    let submission = self.start_submission(image, fingerprint.clone());
                    in_flight.insert(
                        fingerprint.clone(),
                        InFlight {
                            started_at: Instant::now(),
                            submission: submission.clone(),
                        },
                    );
                    submission
                }
            }
        };

        match submission.await {
            Ok(job_id) => Ok(job_id),
            Err(err) => {
                // Forget the failure so a later attempt submits again
                let mut in_flight = self.lock_in_flight();
                let failed = in_flight
                    .get(fingerprint)
                    .and_then(|entry| entry.submission.peek())
                    .is_some_and(|outcome| outcome.is_err());
                if failed {
                    in_flight.remove(fingerprint);
                }
                Err(ClientError::Submission(err))
            }
        }
    }

    fn start_submission(&self, image: Bytes, fingerprint: Fingerprint) -> SharedSubmission {
        let transport = Arc::clone(&self.transport);
        let style = self.config.style.clone();
        let watermark = self.config.watermark.as_ref().map(Into::into);
        let max_retries = self.config.submit_max_retries;
        let base_delay = self.config.submit_base_delay;
        let max_delay = self.config.poll.max_delay;

        async move {
            let request = TransformRequest {
                image: api::to_data_url(&image),
                style,
                watermark,
            };
            let mut attempt = 0;
            loop {
                match transport.submit(&request).await {
                    Ok(job_id) => {
                        tracing::info!(
                            fingerprint = %fingerprint,
                            job_id = %job_id,
                            attempts = attempt + 1,
                            "Stylization job submitted"
                        );
                        return Ok(job_id);
                    }
                    Err(err) if attempt < max_retries && err.is_transient() => {
                        let delay = backoff_delay(base_delay, max_delay, attempt);
                        tracing::warn!(
                            fingerprint = %fingerprint,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Submission failed, retrying"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        tracing::error!(
                            fingerprint = %fingerprint,
                            attempts = attempt + 1,
                            error = %err,
                            "Submission failed"
                        );
                        return Err(Arc::new(err));
                    }
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock_polls(&self) -> MutexGuard<'_, HashMap<JobId, SharedPoll>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Polls `job_id` until it is terminal or the attempt budget is spent.
    ///
    /// Concurrent callers for the same job join one polling loop, so the
    /// service sees a single status sequence. Transport errors consume an
    /// attempt. Exhausting the budget yields a failed job with
    /// [`JobFailure::TimedOut`].
    pub async fn poll(&self, job_id: &JobId) -> RemoteJob {
        let shared = {
            let mut polls = self.lock_polls();
            match polls.get(job_id) {
                Some(running) => {
                    tracing::debug!(job_id = %job_id, "Joining running poll");
                    running.clone()
                }
                None => {
                    let started = self.start_poll(job_id.clone());
                    polls.insert(job_id.clone(), started.clone());
                    started
                }
            }
        };

        let job = shared.await;
        let mut polls = self.lock_polls();
        let finished = polls
            .get(job_id)
            .is_some_and(|running| running.peek().is_some());
        if finished {
            polls.remove(job_id);
        }
        job
    }

    fn start_poll(&self, job_id: JobId) -> SharedPoll {
        let transport = Arc::clone(&self.transport);
        let poll = self.config.poll.clone();

        async move {
            for attempt in 0..poll.max_attempts {
                match transport.status(&job_id).await {
                    Ok(response) => match JobStatus::from_wire(&response.status) {
                        Some(JobStatus::Completed) => {
                            tracing::info!(
                                job_id = %job_id,
                                attempts = attempt + 1,
                                "Stylization job completed"
                            );
                            return match response.result_url {
                                Some(url) => RemoteJob::completed(job_id.clone(), url),
                                None => RemoteJob::failed(Some(job_id.clone()), JobFailure::MissingResult),
                            };
                        }
                        Some(JobStatus::Failed) => {
                            let message = response
                                .error
                                .unwrap_or_else(|| format!("job {}", response.status.to_lowercase()));
                            tracing::warn!(
                                job_id = %job_id,
                                error = %message,
                                "Stylization job failed"
                            );
                            return RemoteJob::failed(
                                Some(job_id.clone()),
                                JobFailure::Rejected(message),
                            );
                        }
                        Some(JobStatus::Pending) => {
                            tracing::debug!(
                                job_id = %job_id,
                                attempt = attempt + 1,
                                status = %response.status,
                                "Waiting for stylization job"
                            );
                        }
                        None => {
                            tracing::warn!(
                                job_id = %job_id,
                                status = %response.status,
                                "Unknown job status"
                            );
                        }
                    },
                    Err(err) => {
                        tracing::warn!(
                            job_id = %job_id,
                            attempt = attempt + 1,
                            error = %err,
                            "Status check failed"
                        );
                    }
                }

                if attempt + 1 < poll.max_attempts {
                    sleep(backoff_delay(poll.base_delay, poll.max_delay, attempt)).await;
                }
            }

            tracing::warn!(
                job_id = %job_id,
                attempts = poll.max_attempts,
                "Stylization job timed out"
            );
            RemoteJob::failed(
                Some(job_id.clone()),
                JobFailure::TimedOut {
                    attempts: poll.max_attempts,
                },
            )
        }
        .boxed()
        .shared()
    }

    /// Submits and polls. Never fails: problems reaching the service are
    /// reported as a failed job.
    pub async fn wait_for_completion(&self, image: Bytes, fingerprint: &Fingerprint) -> RemoteJob {
        let job_id = match self.submit(image, fingerprint).await {
            Ok(job_id) => job_id,
            Err(err) => return RemoteJob::failed(None, JobFailure::Unreachable(err.to_string())),
        };
        self.poll(&job_id).await
    }

    /// Requests the refinement pass. Best effort: returns `None` after the
    /// retry budget is spent.
    pub async fn post_process(
        &self,
        job_id: &JobId,
        ratio: AspectRatio,
        text: Option<&TextSpec>,
        crop: &CropSpec,
    ) -> Option<PostProcessResponse> {
        let request = PostProcessRequest {
            job_id: job_id.clone(),
            size: ratio.size_label().to_string(),
            text: text.cloned(),
            crop: *crop,
        };
        let max_retries = self.config.post_process_max_retries;

        let mut attempt = 0;
        loop {
            match self.transport.post_process(&request).await {
                Ok(response) => {
                    tracing::info!(job_id = %job_id, "Post-process completed");
                    return Some(response);
                }
                Err(err) if attempt < max_retries => {
                    let delay = backoff_delay(
                        self.config.post_process_base_delay,
                        self.config.poll.max_delay,
                        attempt,
                    );
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = attempt + 1,
                        error = %err,
                        "Post-process failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        job_id = %job_id,
                        error = %err,
                        "Post-process failed, keeping primary result"
                    );
                    return None;
                }
            }
        }
    }

    pub async fn download(&self, url: &str) -> Result<Bytes, ClientError> {
        self.transport.download(url).await
    }

    /// Drops remembered submissions older than the configured TTL. Returns
    /// how many were removed.
    pub fn purge_stale(&self) -> usize {
        let ttl = self.config.in_flight_ttl;
        let mut in_flight = self.lock_in_flight();
        let before = in_flight.len();
        in_flight.retain(|_, entry| entry.started_at.elapsed() < ttl);
        before - in_flight.len()
    }

    /// Runs [`purge_stale`](Self::purge_stale) every `interval` until the
    /// client is dropped.
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(client) = weak.upgrade() else {
                    tracing::debug!("Job client dropped, stopping janitor");
                    break;
                };
                let removed = client.purge_stale();
                if removed > 0 {
                    tracing::debug!(removed = removed, "Purged stale submissions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedTransport;
    use stylecast_core::PollConfig;

    fn config() -> ClientConfig {
        ClientConfig {
            poll: PollConfig {
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
                max_attempts: 30,
            },
            ..ClientConfig::default()
        }
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint::from_file("photo.jpg", 1024, 1_700_000_000_000)
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(10);
        let delays: Vec<u64> = (0..6)
            .map(|attempt| backoff_delay(base, cap, attempt).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(backoff_delay(base, cap, 64), cap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submissions_share_one_request() {
        let transport = Arc::new(
            ScriptedTransport::new().with_submit_delay(Duration::from_millis(500)),
        );
        let client = JobClient::new(transport.clone(), config());
        let fp = fingerprint();

        let (a, b, c) = tokio::join!(
            client.submit(Bytes::from_static(b"img"), &fp),
            client.submit(Bytes::from_static(b"img"), &fp),
            client.submit(Bytes::from_static(b"img"), &fp),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(transport.submit_calls(), 1);

        // Completed submissions stay remembered
        client.submit(Bytes::from_static(b"img"), &fp).await.unwrap();
        assert_eq!(transport.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_is_forgotten() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(ClientError::Status {
            code: 400,
            body: "bad image".into(),
        }));
        let client = JobClient::new(transport.clone(), config());
        let fp = fingerprint();

        let err = client.submit(Bytes::from_static(b"img"), &fp).await.unwrap_err();
        assert!(matches!(err, ClientError::Submission(_)));
        assert_eq!(client.in_flight_count(), 0);

        client.submit(Bytes::from_static(b"img"), &fp).await.unwrap();
        assert_eq!(transport.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_submission_errors_are_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(ClientError::Http("connection reset".into())));
        transport.push_submit(Err(ClientError::Status {
            code: 502,
            body: String::new(),
        }));
        let client = JobClient::new(transport.clone(), config());

        let started = Instant::now();
        client
            .submit(Bytes::from_static(b"img"), &fingerprint())
            .await
            .unwrap();
        assert_eq!(transport.submit_calls(), 3);
        // 1s + 2s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_gives_up_after_retry_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..10 {
            transport.push_submit(Err(ClientError::Http("down".into())));
        }
        let client = JobClient::new(transport.clone(), config());

        assert!(client
            .submit(Bytes::from_static(b"img"), &fingerprint())
            .await
            .is_err());
        // One attempt plus three retries
        assert_eq!(transport.submit_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_follows_backoff_schedule() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..4 {
            transport.push_status(Ok(StatusResponse::pending()));
        }
        transport.push_status(Ok(StatusResponse::completed("https://cdn.example.com/r.png")));
        let client = JobClient::new(transport.clone(), config());

        let started = Instant::now();
        let job = client.poll(&JobId::from("job-1")).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_url.as_deref(), Some("https://cdn.example.com/r.png"));
        assert_eq!(transport.status_calls(), 5);
        // 1 + 2 + 4 + 8
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = JobClient::new(transport.clone(), config());

        let job = client.poll(&JobId::from("job-slow")).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure, Some(JobFailure::TimedOut { attempts: 30 }));
        assert_eq!(transport.status_calls(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_transport_errors_consume_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(Err(ClientError::Http("reset".into())));
        transport.push_status(Err(ClientError::Decode("garbage".into())));
        transport.push_status(Ok(StatusResponse::completed("https://cdn.example.com/ok.png")));
        let client = JobClient::new(transport.clone(), config());

        let job = client.poll(&JobId::from("job-2")).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(transport.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reports_remote_failure_and_missing_result() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(Ok(StatusResponse::failed("nsfw content")));
        let client = JobClient::new(transport.clone(), config());
        let job = client.poll(&JobId::from("job-3")).await;
        assert_eq!(
            job.failure,
            Some(JobFailure::Rejected("nsfw content".to_string()))
        );

        transport.push_status(Ok(StatusResponse {
            status: "succeeded".into(),
            result_url: None,
            error: None,
        }));
        let job = client.poll(&JobId::from("job-4")).await;
        assert_eq!(job.failure, Some(JobFailure::MissingResult));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_polls_share_one_loop() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(Ok(StatusResponse::pending()));
        transport.push_status(Ok(StatusResponse::pending()));
        transport.push_status(Ok(StatusResponse::completed("https://cdn.example.com/5.png")));
        let client = Arc::new(JobClient::new(transport.clone(), config()));
        let job_id = JobId::from("job-5");

        let first = {
            let client = Arc::clone(&client);
            let job_id = job_id.clone();
            tokio::spawn(async move { client.poll(&job_id).await })
        };
        // First loop is now sleeping between attempts
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.status_calls(), 1);

        let second = client.poll(&job_id).await;
        let first = first.await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(transport.status_calls(), 3);

        // A finished poll is not reused
        transport.push_status(Ok(StatusResponse::failed("expired")));
        let again = client.poll(&job_id).await;
        assert_eq!(again.failure, Some(JobFailure::Rejected("expired".to_string())));
        assert_eq!(transport.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_completion_maps_submit_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(ClientError::Status {
            code: 401,
            body: "unauthorized".into(),
        }));
        let client = JobClient::new(transport.clone(), config());

        let job = client
            .wait_for_completion(Bytes::from_static(b"img"), &fingerprint())
            .await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.id.is_none());
        assert!(matches!(job.failure, Some(JobFailure::Unreachable(_))));
        assert_eq!(transport.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_process_retries_then_gives_up() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_post_process(Err(ClientError::Http("down".into())));
        }
        let client = JobClient::new(transport.clone(), config());
        let crop = CropSpec {
            x: 0.0,
            y: 0.0,
            width: 300.0,
            height: 400.0,
            source_width: 300,
            source_height: 500,
            ratio: AspectRatio::ThreeByFour,
        };

        let started = Instant::now();
        let result = client
            .post_process(&JobId::from("job-6"), AspectRatio::ThreeByFour, None, &crop)
            .await;
        assert!(result.is_none());
        assert_eq!(transport.post_process_calls(), 3);
        // 1s + 2s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_stale_and_janitor() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = Arc::new(JobClient::new(transport.clone(), config()));
        client
            .submit(Bytes::from_static(b"img"), &fingerprint())
            .await
            .unwrap();
        assert_eq!(client.purge_stale(), 0);

        let janitor = client.spawn_janitor(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(client.in_flight_count(), 0);

        drop(client);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(janitor.is_finished());
    }
}
