use std::rc::Rc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Default per-request timeout for [`HttpTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The parts of an HTTP response the resolvers look at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Builder style helper for attaching a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse a header as a number, ignoring surrounding whitespace.
    pub fn header_num<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.header(name).and_then(|v| v.trim().parse().ok())
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// A request that never produced a response (DNS, TLS, timeout, reset).
#[derive(Debug, thiserror::Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Blocking HTTP seam used by the resolvers.
///
/// Any answer from the server, whatever its status, is an `Ok`; only requests
/// that got no answer at all are errors.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> std::result::Result<HttpResponse, TransportError>;

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> std::result::Result<HttpResponse, TransportError> {
        (**self).get(url, query)
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, TransportError> {
        (**self).post_json(url, query, body)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> std::result::Result<HttpResponse, TransportError> {
        (**self).get(url, query)
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, TransportError> {
        (**self).post_json(url, query, body)
    }
}

/// [`Transport`] backed by a `reqwest` blocking client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self { client })
    }

    fn finish(
        url: &str,
        sent: reqwest::Result<reqwest::blocking::Response>,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let resp = sent.map_err(|e| TransportError::new(url, e.to_string()))?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .text()
            .map_err(|e| TransportError::new(url, e.to_string()))?;
        debug!(url, status, bytes = body.len(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> std::result::Result<HttpResponse, TransportError> {
        Self::finish(url, self.client.get(url).query(query).send())
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, TransportError> {
        Self::finish(url, self.client.post(url).query(query).json(body).send())
    }
}
