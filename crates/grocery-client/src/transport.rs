//! Transport seam between the resource client and the network
//!
//! `HttpClient` builds an `HttpRequest` and hands it to a `Transport`. The
//! production transport is `ReqwestTransport`; tests and offline mode use
//! `FakeGroceryServer` from the `fake` module.

use async_trait::async_trait;
use grocery_api::{ClientError, Result};
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// A fully built wire request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Status and raw body of a wire response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs exactly one network exchange per call. Implementations never retry.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(timeout);
        }
        #[cfg(target_arch = "wasm32")]
        let _ = timeout;

        let client = builder.build().map_err(|e| ClientError::Transport {
            message: format!("Failed to create HTTP client: {}", e),
            timeout: false,
        })?;
        Ok(Self { client })
    }

    /// Turn a reqwest failure into a `Transport` error with a hint about the cause.
    fn map_reqwest_error(e: reqwest::Error, method: &Method, url: &Url) -> ClientError {
        let timeout = e.is_timeout();
        let hint = if timeout {
            "timeout - request took too long"
        } else if is_connect(&e) {
            "connection error - check network connectivity and DNS resolution"
        } else if e.is_request() {
            "request error - malformed request"
        } else if e.is_body() {
            "body error - failed to read or write the body"
        } else {
            let details = format!("{:?}", e);
            if details.contains("certificate") || details.contains("TLS") {
                "TLS/certificate error"
            } else if e.is_redirect() {
                "redirect error"
            } else {
                "transport error"
            }
        };

        ClientError::Transport {
            message: format!("{} {}: {}: {}", method, url, hint, e),
            timeout,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn is_connect(e: &reqwest::Error) -> bool {
    e.is_connect()
}

#[cfg(target_arch = "wasm32")]
fn is_connect(_e: &reqwest::Error) -> bool {
    false
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = Self::map_reqwest_error(e, &method, &url);
            error!("[ReqwestTransport] {}", err);
            err
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_reqwest_error(e, &method, &url))?;

        debug!(
            "[ReqwestTransport] {} {} -> {} ({} bytes)",
            method,
            url,
            status,
            body.len()
        );
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(200, Vec::new()).is_success());
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(199, Vec::new()).is_success());
        assert!(!HttpResponse::new(301, Vec::new()).is_success());
        assert!(!HttpResponse::new(500, Vec::new()).is_success());
    }

    #[test]
    fn test_transport_creation() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
