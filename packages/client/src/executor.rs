//! HTTP execution abstraction.
//!
//! The client hands fully prepared requests to a [`Transport`]. Production
//! code uses [`ReqwestTransport`]; tests swap in the mock below so dispatch
//! logic can be exercised without network calls.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::runtime::Runtime;

use crate::handle::Cancel;
use crate::types::{Credentials, Exchange, Method};

/// A request with its URL resolved and body serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: Method,

    /// Absolute URL including the query string.
    pub url: String,

    pub headers: Vec<(String, String)>,

    pub body: Option<Vec<u8>>,

    pub credentials: Option<Credentials>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The exchange never produced a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("could not connect: {message}")]
    Connect { message: String },

    /// The cancel signal fired before the exchange completed.
    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {message}")]
    Other { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            TransportError::Timeout { message }
        } else if error.is_connect() {
            TransportError::Connect { message }
        } else {
            TransportError::Other { message }
        }
    }
}

/// Trait for executing HTTP requests.
///
/// Implementations can use real HTTP clients or mock responses for testing.
pub trait Transport: Send + Sync {
    /// Perform one exchange. Any HTTP status counts as a response; only
    /// failures to obtain one are errors.
    ///
    /// Once `cancel` fires the exchange must be abandoned and
    /// [`TransportError::Cancelled`] returned without waiting for the response.
    fn execute(
        &self,
        request: &PreparedRequest,
        cancel: &Cancel,
    ) -> Result<Exchange, TransportError>;
}

/// Production transport using reqwest's async client on its own runtime.
///
/// Callers block on the runtime; a cancel drops the in-flight request
/// future, closing its connection.
pub struct ReqwestTransport {
    client: Client,
    runtime: Option<Runtime>,
}

impl ReqwestTransport {
    /// Create a new transport that gives up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, crate::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("phile-transport")
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            runtime: Some(runtime),
        })
    }

    async fn send(&self, request: &PreparedRequest) -> Result<Exchange, TransportError> {
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|e| TransportError::Other {
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::try_from(value.as_str()).map_err(|e| TransportError::Other {
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, &request.url);
        req_builder = req_builder.headers(headers);

        if let Some(credentials) = &request.credentials {
            req_builder =
                req_builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.clone());
        }

        let response = req_builder.send().await?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }
        log::debug!("{} {} -> {}", request.method, request.url, status);

        let body = response.bytes().await?.to_vec();

        Ok(Exchange::new(
            request.method,
            request.url.clone(),
            status,
            status_text,
            resp_headers,
            body,
        ))
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: &PreparedRequest,
        cancel: &Cancel,
    ) -> Result<Exchange, TransportError> {
        let runtime = self.runtime.as_ref().ok_or_else(|| TransportError::Other {
            message: "transport is shut down".to_string(),
        })?;

        runtime.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("{} {} cancelled in flight", request.method, request.url);
                    Err(TransportError::Cancelled)
                }
                result = self.send(request) => result,
            }
        })
    }
}

impl Drop for ReqwestTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
