//! The transport capability.
//!
//! The core's only dependency on an HTTP stack is the [`Transport`] trait:
//! `execute(request) → response`. [`ReqwestTransport`] is the default
//! implementation; tests and embedders substitute their own. The core adds
//! no implicit timeouts; deadline policy belongs to the transport, and its
//! timeout failures surface as [`TransportError::Timeout`].

use {
    super::message::{Headers, HttpRequest, HttpResponse, Method},
    async_trait::async_trait,
    thiserror::Error,
};

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("malformed http response: {0}")]
    MalformedResponse(String),
}

/// Executes one HTTP exchange.
///
/// Implementations must be shareable across concurrent operations; the
/// client holds the transport behind an `Arc`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a shared [`reqwest::Client`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a pre-configured client, e.g. one carrying proxy or timeout
    /// settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.target_uri());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            let value = value.to_str().map_err(|_| {
                TransportError::MalformedResponse(format!(
                    "non-ascii value in response header '{name}'"
                ))
            })?;
            headers = headers.with(name.as_str(), value);
        }
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(HttpResponse::new(status, headers, body))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::MalformedResponse(err.to_string())
    }
}
