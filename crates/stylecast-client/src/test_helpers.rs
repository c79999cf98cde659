//! In-memory transport for tests
//!
//! Responses are queued per endpoint and consumed in order. When a queue is
//! empty the transport answers with a default: a fresh job id for submit,
//! `pending` for status, an empty object for post-process. An optional gate
//! holds status responses until the test releases them.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use stylecast_core::JobId;
use tokio::sync::Semaphore;

use crate::api::{PostProcessRequest, PostProcessResponse, StatusResponse, TransformRequest};
use crate::error::ClientError;
use crate::transport::TransformTransport;

#[derive(Default)]
pub struct ScriptedTransport {
    submits: Mutex<VecDeque<Result<JobId, ClientError>>>,
    statuses: Mutex<VecDeque<Result<StatusResponse, ClientError>>>,
    post_processes: Mutex<VecDeque<Result<PostProcessResponse, ClientError>>>,
    downloads: Mutex<HashMap<String, Bytes>>,
    submit_delay: Option<Duration>,
    status_gate: Option<Arc<Semaphore>>,
    submit_count: AtomicUsize,
    status_count: AtomicUsize,
    post_process_count: AtomicUsize,
    download_count: AtomicUsize,
    last_submit: Mutex<Option<TransformRequest>>,
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Status calls block until [`release_status`](Self::release_status)
    /// hands out a permit.
    pub fn with_status_gate(mut self) -> Self {
        self.status_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release_status(&self, count: usize) {
        if let Some(gate) = &self.status_gate {
            gate.add_permits(count);
        }
    }

    pub fn push_submit(&self, result: Result<JobId, ClientError>) {
        self.submits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_status(&self, result: Result<StatusResponse, ClientError>) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_post_process(&self, result: Result<PostProcessResponse, ClientError>) {
        self.post_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn set_download(&self, url: impl Into<String>, data: Bytes) {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), data);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }

    pub fn post_process_calls(&self) -> usize {
        self.post_process_count.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_count.load(Ordering::SeqCst)
    }

    pub fn last_submit(&self) -> Option<TransformRequest> {
        self.last_submit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TransformTransport for ScriptedTransport {
    async fn submit(&self, request: &TransformRequest) -> Result<JobId, ClientError> {
        let call = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .last_submit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        pop(&self.submits).unwrap_or_else(|| Ok(JobId(format!("job-{}", call))))
    }

    async fn status(&self, _job_id: &JobId) -> Result<StatusResponse, ClientError> {
        if let Some(gate) = &self.status_gate {
            gate.acquire()
                .await
                .map_err(|e| ClientError::Http(e.to_string()))?
                .forget();
        }
        self.status_count.fetch_add(1, Ordering::SeqCst);
        pop(&self.statuses).unwrap_or_else(|| Ok(StatusResponse::pending()))
    }

    async fn post_process(
        &self,
        _request: &PostProcessRequest,
    ) -> Result<PostProcessResponse, ClientError> {
        self.post_process_count.fetch_add(1, Ordering::SeqCst);
        pop(&self.post_processes).unwrap_or_else(|| {
            Ok(PostProcessResponse {
                result_url: None,
                extra: serde_json::Map::new(),
            })
        })
    }

    async fn download(&self, url: &str) -> Result<Bytes, ClientError> {
        self.download_count.fetch_add(1, Ordering::SeqCst);
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                code: 404,
                body: format!("no scripted download for {}", url),
            })
    }
}
