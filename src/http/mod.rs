//! Direct HTTP access used by the native, player-API and watch-page strategies.

use async_trait::async_trait;
use std::time::Duration;

use crate::anti_detection::IDENTITY_POOL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status line in the form yt-dlp prints, so phrase matching treats both alike
    pub fn status_text(&self) -> String {
        let reason = match self.status {
            403 => "Forbidden",
            404 => "Not Found",
            410 => "Gone",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unexpected Status",
        };
        format!("HTTP Error {}: {}", self.status, reason)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(IDENTITY_POOL[0].user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
        let response = request.send().await.map_err(|e| map_reqwest_error(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| map_reqwest_error(url, e))?;
        tracing::debug!("{} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

fn with_headers(mut request: reqwest::RequestBuilder, headers: &[(String, String)]) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout { url: url.to_string() }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        let request = with_headers(self.client.get(url), headers);
        self.send(url, request).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let request = with_headers(self.client.post(url), headers).json(body);
        self.send(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{self, Signal};

    #[test]
    fn test_status_text_feeds_classification() {
        let response = HttpResponse {
            status: 429,
            body: String::new(),
        };
        assert!(!response.is_success());
        assert!(signals::has_signal(&response.status_text(), Signal::RateLimited));

        let forbidden = HttpResponse {
            status: 403,
            body: String::new(),
        };
        assert!(signals::has_signal(&forbidden.status_text(), Signal::AccessDenied));
    }

    #[test]
    fn test_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
