//! The network boundary.
//!
//! The client never talks to the network directly. It hands each
//! [`OutgoingRequest`] to a [`Transport`]; [`ReqwestTransport`] is the
//! default implementation and tests substitute their own.

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::error::{BoxError, ManagementError, ManagementResult};
use crate::request::OutgoingRequest;
use crate::response::Response;
use async_trait::async_trait;
use reqwest::Client as HttpClient;

use std::fmt;
use std::time::Duration;

/// Performs one network exchange.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `request` and return the response head with an unread body.
    ///
    /// Any error returned here is a transport-level failure. Error statuses
    /// are not failures at this layer.
    async fn send(&self, request: &OutgoingRequest) -> Result<Response, BoxError>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    /// Wrap an existing HTTP client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Build an HTTP client with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] if the TLS backend cannot
    /// be initialized.
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> ManagementResult<Self> {
        let http = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| ManagementError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(http))
    }

    /// Build an HTTP client with [`DEFAULT_CONNECT_TIMEOUT`] and [`DEFAULT_READ_TIMEOUT`].
    pub fn with_default_timeouts() -> ManagementResult<Self> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutgoingRequest) -> Result<Response, BoxError> {
        let mut builder = self
            .http
            .request(request.method.into(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        Ok(response.into())
    }
}

/// Run one attempt, mapping any failure to [`ManagementError::Transport`].
pub async fn execute(
    transport: &dyn Transport,
    request: &OutgoingRequest,
) -> ManagementResult<Response> {
    transport
        .send(request)
        .await
        .map_err(ManagementError::Transport)
}
