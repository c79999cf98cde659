//! Transport seam between the job client and the stylization service.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use stylecast_core::{ClientConfig, JobId};

use crate::api::{
    PostProcessRequest, PostProcessResponse, StatusResponse, TransformRequest, TransformResponse,
};
use crate::error::ClientError;

#[async_trait]
pub trait TransformTransport: Send + Sync {
    async fn submit(&self, request: &TransformRequest) -> Result<JobId, ClientError>;

    async fn status(&self, job_id: &JobId) -> Result<StatusResponse, ClientError>;

    async fn post_process(
        &self,
        request: &PostProcessRequest,
    ) -> Result<PostProcessResponse, ClientError>;

    async fn download(&self, url: &str) -> Result<Bytes, ClientError>;
}

/// reqwest-backed transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.api_url, config.api_token.clone(), config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::Status {
            code: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TransformTransport for HttpTransport {
    async fn submit(&self, request: &TransformRequest) -> Result<JobId, ClientError> {
        let url = self.build_url("/transform");
        let response = self
            .apply_auth(self.client.post(&url).json(request))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: TransformResponse = response.json().await?;
        Ok(body.job_id)
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusResponse, ClientError> {
        let url = self.build_url(&format!("/status/{}", job_id));
        let response = self.apply_auth(self.client.get(&url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn post_process(
        &self,
        request: &PostProcessRequest,
    ) -> Result<PostProcessResponse, ClientError> {
        let url = self.build_url("/post-process");
        let response = self
            .apply_auth(self.client.post(&url).json(request))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Result URLs usually point at a CDN, so no auth header is sent.
    async fn download(&self, url: &str) -> Result<Bytes, ClientError> {
        let response = self.client.get(url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(server: &mockito::Server, token: Option<&str>) -> HttpTransport {
        HttpTransport::new(
            &server.url(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> TransformRequest {
        TransformRequest {
            image: "data:image/jpeg;base64,AAAA".into(),
            style: "pixar".into(),
            watermark: None,
        }
    }

    #[tokio::test]
    async fn test_submit_posts_json_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transform")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "style": "pixar",
                "image": "data:image/jpeg;base64,AAAA"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jobId":"job-42"}"#)
            .create_async()
            .await;

        let job_id = transport(&server, Some("secret"))
            .submit(&request())
            .await
            .unwrap();
        assert_eq!(job_id, JobId::from("job-42"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transform")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = transport(&server, None)
            .submit(&request())
            .await
            .unwrap_err();
        match err {
            ClientError::Status { code, body } => {
                assert_eq!(code, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_parses_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/status/job-7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"Completed","resultUrl":"https://cdn.example.com/7.png"}"#)
            .create_async()
            .await;

        let status = transport(&server, None)
            .status(&JobId::from("job-7"))
            .await
            .unwrap();
        assert_eq!(status.status, "Completed");
        assert_eq!(
            status.result_url.as_deref(),
            Some("https://cdn.example.com/7.png")
        );
    }

    #[tokio::test]
    async fn test_status_malformed_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/status/job-8")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = transport(&server, None)
            .status(&JobId::from("job-8"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/results/1.png")
            .with_status(200)
            .with_body(vec![1u8, 2, 3])
            .create_async()
            .await;

        let url = format!("{}/results/1.png", server.url());
        let data = transport(&server, None).download(&url).await.unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);
    }
}
