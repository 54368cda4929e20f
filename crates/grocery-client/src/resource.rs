//! Typed description of one HTTP operation
//!
//! A `Resource<T>` says what to call (URL and verb with its payload) and what
//! to decode the reply into. Building one performs no I/O; the only failure at
//! construction time is encoding a JSON body.

use grocery_api::{ClientError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    /// No body, the URL identifies the entity to remove
    Delete,
    /// Query items appended to the URL in order
    Get(Vec<(String, String)>),
    /// Pre-serialized body; `None` is a valid empty post
    Post(Option<Vec<u8>>),
}

impl HttpMethod {
    pub fn name(&self) -> &'static str {
        match self {
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get(_) => "GET",
            HttpMethod::Post(_) => "POST",
        }
    }
}

pub struct Resource<T> {
    url: Url,
    method: HttpMethod,
    // fn() -> T keeps Resource Send + Sync regardless of T
    _response: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Resource<T> {
    pub fn new(url: Url, method: HttpMethod) -> Self {
        Self {
            url,
            method,
            _response: PhantomData,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(url, HttpMethod::Get(Vec::new()))
    }

    pub fn get_with_query<K, V>(url: Url, query: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let query = query
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(url, HttpMethod::Get(query))
    }

    pub fn delete(url: Url) -> Self {
        Self::new(url, HttpMethod::Delete)
    }

    pub fn post(url: Url, body: Option<Vec<u8>>) -> Self {
        Self::new(url, HttpMethod::Post(body))
    }

    /// POST with `body` encoded as JSON.
    pub fn post_json<B: Serialize + ?Sized>(url: Url, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| ClientError::Encode {
            message: e.to_string(),
        })?;
        Ok(Self::post(url, Some(bytes)))
    }
}

impl<T> Resource<T> {
    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    /// The URL actually sent on the wire.
    ///
    /// For `Get` the query items replace any query already on the URL, so an
    /// empty list sends no query at all. A URL that cannot carry a query
    /// yields `InvalidUrl` rather than a silently rewritten address.
    pub fn request_url(&self) -> Result<Url> {
        match &self.method {
            HttpMethod::Get(query) if !query.is_empty() => {
                if self.url.cannot_be_a_base() {
                    return Err(ClientError::InvalidUrl {
                        url: self.url.to_string(),
                        reason: "URL cannot carry query items".to_string(),
                    });
                }
                let mut url = self.url.clone();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                Ok(url)
            }
            HttpMethod::Get(_) => {
                let mut url = self.url.clone();
                url.set_query(None);
                Ok(url)
            }
            _ => Ok(self.url.clone()),
        }
    }

    /// Body bytes, only ever present for `Post`.
    pub fn body(&self) -> Option<&[u8]> {
        match &self.method {
            HttpMethod::Post(body) => body.as_deref(),
            _ => None,
        }
    }

    pub fn response_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url.as_str())
            .field("method", &self.method.name())
            .field("response", &std::any::type_name::<T>())
            .finish()
    }
}
