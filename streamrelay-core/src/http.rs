//! HTTP client abstraction for outbound notifications
//!
//! The notifier only ever needs a single POST, so the trait is that narrow.
//! Production code uses [`DefaultHttpClient`] (reqwest); tests swap in mocks
//! that record requests and hand back canned status codes.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use crate::Error;

/// Status and body of a completed request. Non-2xx is still `Ok` here; the
/// caller decides what counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// `Err` only for transport failures (DNS, connect, timeout, ...).
    async fn post(
        &self,
        url: String,
        body: String,
        content_type: Option<&'static str>,
    ) -> Result<HttpResponse, Error>;
}

#[derive(Clone, Default)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn post(
        &self,
        url: String,
        body: String,
        content_type: Option<&'static str>,
    ) -> Result<HttpResponse, Error> {
        let mut request = self.client.post(&url).body(body);
        if let Some(ct) = content_type {
            request = request.header(CONTENT_TYPE, ct);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
