//! Outbound HTTP transport for push requests.
//!
//! The [`crate::dispatch::Dispatcher`] only assembles a [`PushRequest`];
//! performing I/O is the job of a [`Transport`]. [`HttpTransport`] is the
//! reqwest-backed implementation; tests substitute their own.
//!
//! The transport reports success for 2xx responses and a `Rejected` error
//! otherwise. It does not interpret status codes further (410 Gone, 429 Too
//! Many Requests, ...): that policy belongs to the caller.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};

use crate::config::Config;
use crate::error::{PushError, Result};

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushBody {
    /// UTF-8 JSON text (legacy path).
    Json(String),
    /// Raw bytes (encrypted path).
    Bytes(Vec<u8>),
}

impl PushBody {
    /// Body bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Json(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully assembled push request, ready for a [`Transport`].
#[derive(Debug, Clone)]
pub struct PushRequest {
    method: Method,
    url: Url,
    headers: Vec<(&'static str, String)>,
    body: PushBody,
}

impl PushRequest {
    /// Start a `POST` request with an empty body.
    pub(crate) fn post(url: Url) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: Vec::new(),
            body: PushBody::Bytes(Vec::new()),
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub(crate) fn body(mut self, body: PushBody) -> Self {
        self.body = body;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// Value of the first header called `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request body.
    pub fn payload(&self) -> &PushBody {
        &self.body
    }
}

/// A successful response from the push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    /// HTTP status code (2xx).
    pub status: u16,
    /// Response body, as text.
    pub body: String,
}

/// Performs push requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Rejected` for non-2xx responses, or
    /// `PushError::Http` if the request could not be completed.
    async fn execute(&self, request: PushRequest) -> Result<PushResponse>;
}

/// reqwest-backed [`Transport`].
///
/// Reuse one instance across sends for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client with the configured timeout and user agent.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PushRequest) -> Result<PushResponse> {
        let PushRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let host = url.host_str().unwrap_or("<no host>").to_string();

        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder = match body {
            PushBody::Json(text) => builder.body(text),
            PushBody::Bytes(bytes) => builder.body(bytes),
        };

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            log::info!("[WebPush] Delivered to {} (HTTP {})", host, status.as_u16());
            Ok(PushResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[WebPush] {} rejected push (HTTP {})", host, status.as_u16());
            Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
