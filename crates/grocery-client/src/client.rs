use grocery_api::{ClientError, Result};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::resource::{HttpMethod, Resource};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

/// Longest body excerpt kept in `Server` errors
const MAX_ERROR_BODY_LEN: usize = 500;

/// Executes `Resource` descriptors: builds the wire request, attaches the
/// default headers, performs one transport call and decodes the JSON reply.
///
/// Calls share no mutable state besides the credential read, so any number of
/// `load`s may run concurrently on one client.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    validate_status: bool,
}

impl HttpClient {
    /// Client backed by reqwest, using the timeout from `config`.
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(
            Arc::new(transport),
            credentials,
            config.validate_status,
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        validate_status: bool,
    ) -> Self {
        Self {
            transport,
            credentials,
            validate_status,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub async fn load<T: DeserializeOwned>(&self, resource: &Resource<T>) -> Result<T> {
        let request = self.build_request(resource).await?;
        let method = request.method.clone();
        let url = request.url.clone();

        debug!("[HttpClient] {} {}", method, url);
        let response = self.transport.execute(request).await.map_err(|e| {
            error!("[HttpClient] {} {} failed: {}", method, url, e);
            e
        })?;

        if self.validate_status && !response.is_success() {
            let err = ClientError::Server {
                status: response.status,
                body: body_excerpt(&response.body),
            };
            error!("[HttpClient] {} {}: {}", method, url, err);
            return Err(err);
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            let err = ClientError::Decode {
                type_name: resource.response_type_name().to_string(),
                message: e.to_string(),
            };
            error!(
                "[HttpClient] {} {}: {} - Response (first 200): {}",
                method,
                url,
                err,
                String::from_utf8_lossy(&response.body)
                    .chars()
                    .take(200)
                    .collect::<String>()
            );
            err
        })
    }

    /// Run `resource` and drop the decoded value.
    pub async fn load_discarding<T: DeserializeOwned>(&self, resource: &Resource<T>) -> Result<()> {
        self.load(resource).await.map(|_| ())
    }

    async fn build_request<T>(&self, resource: &Resource<T>) -> Result<HttpRequest> {
        let url = resource.request_url()?;
        let (method, body) = match resource.method() {
            HttpMethod::Delete => (Method::DELETE, None),
            HttpMethod::Get(_) => (Method::GET, None),
            HttpMethod::Post(body) => (Method::POST, body.clone()),
        };

        Ok(HttpRequest {
            method,
            url,
            headers: self.default_headers().await?,
            body,
        })
    }

    /// Evaluated on every call so a sign-in or sign-out is seen by the next request.
    async fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.credentials.token().await {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                ClientError::InvalidRequest {
                    message: format!("Stored token is not a valid header value: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > MAX_ERROR_BODY_LEN {
        format!(
            "{}... (truncated)",
            text.chars().take(MAX_ERROR_BODY_LEN).collect::<String>()
        )
    } else {
        text.into_owned()
    }
}
