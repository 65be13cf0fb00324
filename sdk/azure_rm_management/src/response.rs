//! Response handling: body buffering and error classification.

use crate::error::{truncate_message, ApiError, BoxError, ManagementError, ManagementResult};
use crate::models::{ErrorDetail, ErrorResponse};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use std::fmt;

/// Response header carrying the ARM correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-ms-request-id";

/// A response payload that can be drained exactly once.
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the payload to the end, releasing the underlying stream.
    async fn read_all(self: Box<Self>) -> Result<Bytes, BoxError>;
}

#[async_trait]
impl ResponseBody for reqwest::Response {
    async fn read_all(self: Box<Self>) -> Result<Bytes, BoxError> {
        Ok((*self).bytes().await?)
    }
}

#[async_trait]
impl ResponseBody for Bytes {
    async fn read_all(self: Box<Self>) -> Result<Bytes, BoxError> {
        Ok(*self)
    }
}

/// A response whose body has not been read yet.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Box<dyn ResponseBody>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }

    /// Build an already-buffered response.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), body.into())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `x-ms-request-id` header, if the server sent one.
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }

    /// Read the whole body. The response is consumed, so its stream is
    /// released whether or not the read succeeds.
    pub async fn read_body(self) -> ManagementResult<Bytes> {
        self.body.read_all().await.map_err(ManagementError::BodyRead)
    }
}

impl From<reqwest::Response> for Response {
    fn from(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        Self::new(status, headers, response)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Decides whether an error-range body is a recognized API error.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    /// Return `None` when the body is not a known error envelope.
    fn classify(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<ApiError>;
}

/// Parses the Resource Manager error envelope.
///
/// Accepts both `{"error": {"code", "message"}}` and a bare
/// `{"code", "message"}` object. When the message is missing the raw body
/// is used instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureErrorClassifier;

impl ErrorClassifier for AzureErrorClassifier {
    fn classify(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<ApiError> {
        let detail = serde_json::from_slice::<ErrorResponse>(body)
            .map(|r| r.error)
            .or_else(|_| serde_json::from_slice::<ErrorDetail>(body))
            .ok()?;

        let message = match detail.message {
            Some(message) => message,
            None => String::from_utf8_lossy(body).into_owned(),
        };

        Some(ApiError {
            status: status.as_u16(),
            code: detail.code,
            message: truncate_message(&message),
            request_id: headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        })
    }
}

/// Turn a buffered error-range response into the error it represents.
pub(crate) fn interpret_error(
    classifier: &dyn ErrorClassifier,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> ManagementError {
    match classifier.classify(status, headers, body) {
        Some(api_error) => api_error.into(),
        None => ManagementError::Http {
            status: status.as_u16(),
            message: truncate_message(&String::from_utf8_lossy(body)),
        },
    }
}
