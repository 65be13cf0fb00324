//! Outgoing request construction.

use crate::config::ClientConfig;
use crate::error::{ManagementError, ManagementResult};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use url::Url;

use std::fmt;
use std::str::FromStr;

/// Header carrying the API version when one is configured.
pub const MS_VERSION_HEADER: &str = "x-ms-version";

/// Content type attached to every request, with or without a body.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// HTTP methods used by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ManagementError;

    fn from_str(s: &str) -> ManagementResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "" => Err(ManagementError::missing("method")),
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(ManagementError::InvalidArgument(format!(
                "unsupported method {other}"
            ))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully formed request, reused unchanged across retry attempts.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Build a request with the standard headers attached.
///
/// `Content-Type: application/json` is set even when there is no body.
///
/// # Errors
///
/// Returns [`ManagementError::InvalidArgument`] when `method` or `url` is
/// empty, the method is not GET/PUT/DELETE, or the URL does not parse.
pub fn build_request(
    config: &ClientConfig,
    url: &str,
    method: &str,
    body: Option<Bytes>,
) -> ManagementResult<OutgoingRequest> {
    let method: Method = method.parse()?;
    if url.is_empty() {
        return Err(ManagementError::missing("url"));
    }
    let url = Url::parse(url)
        .map_err(|e| ManagementError::InvalidArgument(format!("invalid url {url:?}: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value(&config.user_agent)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    if let Some(version) = &config.api_version {
        headers.insert(
            HeaderName::from_static(MS_VERSION_HEADER),
            header_value(version)?,
        );
    }

    Ok(OutgoingRequest {
        method,
        url,
        headers,
        body,
    })
}

fn header_value(value: &str) -> ManagementResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ManagementError::InvalidArgument(format!("invalid header value {value:?}")))
}
