use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::config::{PROBE_TIMEOUT, REQUEST_TIMEOUT};
use crate::error::{CaptionError, Result};
use crate::types::RawResponse;

/// HTTP seam between the pipeline stages and the network.
///
/// Every method resolves to the remote status (and body) when the server
/// answered at all; `Err(CaptionError::Network)` means the request never got
/// a response. Interpreting statuses is the stages' job, not the transport's.
pub trait Transport: Send + Sync {
    /// Issue a HEAD request and return the status code.
    fn head(&self, url: &str) -> impl Future<Output = Result<u16>> + Send;

    /// Issue a GET request and return the status code. The body is discarded.
    fn get(&self, url: &str) -> impl Future<Output = Result<u16>> + Send;

    /// POST a JSON body with a bearer credential.
    fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> impl Future<Output = Result<RawResponse>> + Send;

    /// PUT raw bytes with the given `Content-Type`.
    fn put_bytes(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            request_timeout: REQUEST_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    async fn finish(resp: reqwest::Response) -> RawResponse {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        RawResponse { status, body }
    }
}

fn network(context: String, err: reqwest::Error) -> CaptionError {
    CaptionError::Network {
        context,
        message: err.to_string(),
    }
}

impl Transport for HttpTransport {
    async fn head(&self, url: &str) -> Result<u16> {
        let resp = self
            .http
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| network(format!("HEAD {} failed", url), e))?;
        Ok(resp.status().as_u16())
    }

    async fn get(&self, url: &str) -> Result<u16> {
        let resp = self
            .http
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| network(format!("GET {} failed", url), e))?;
        Ok(resp.status().as_u16())
    }

    async fn post_json(&self, url: &str, bearer: &str, body: &Value) -> Result<RawResponse> {
        let resp = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
            .json(body)
            .send()
            .await
            .map_err(|e| network(format!("Cannot reach caption pipeline at {}", url), e))?;
        let raw = Self::finish(resp).await;
        tracing::debug!(url, status = raw.status, "pipeline POST");
        Ok(raw)
    }

    async fn put_bytes(&self, url: &str, content_type: &str, bytes: &[u8]) -> Result<RawResponse> {
        let resp = self
            .http
            .put(url)
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| network("Failed to transfer image bytes".into(), e))?;
        let raw = Self::finish(resp).await;
        tracing::debug!(status = raw.status, len = bytes.len(), "presigned PUT");
        Ok(raw)
    }
}
