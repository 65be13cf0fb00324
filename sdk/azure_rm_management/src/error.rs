use thiserror::Error;

/// Boxed error produced by a [`Transport`](crate::transport::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when talking to the Azure Resource Manager API.
#[derive(Error, Debug)]
pub enum ManagementError {
    /// A required credential or configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A call parameter was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request failed at the transport level (connection, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// The API returned a recognized error envelope.
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The API returned an error status with a body that is not an error envelope.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    BodyRead(#[source] BoxError),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ManagementError {
    pub(crate) fn missing(param: &str) -> Self {
        Self::InvalidArgument(format!("parameter {param} is not specified"))
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry loop is allowed to re-attempt after this error.
    ///
    /// Configuration, argument, body-read and cancellation errors are always terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Api { .. } | Self::Http { .. }
        )
    }
}

impl From<ApiError> for ManagementError {
    fn from(err: ApiError) -> Self {
        Self::Api {
            status: err.status,
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        }
    }
}

/// A structured failure decoded from an error-range response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

/// Result type alias for management operations.
pub type ManagementResult<T> = std::result::Result<T, ManagementError>;

/// Maximum length for error messages built from response bodies.
const MAX_ERROR_MESSAGE_LEN: usize = 1000;

const REDACTED: &str = "[REDACTED]";

/// Redact every value following `marker` up to the next delimiter.
fn redact_after(result: &mut String, marker: &str) {
    let mut search_start = 0;
    while let Some(relative_pos) = result[search_start..].find(marker) {
        let value_start = search_start + relative_pos + marker.len();
        if result[value_start..].starts_with(REDACTED) {
            search_start = value_start + REDACTED.len();
            continue;
        }

        let value_end = result[value_start..]
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '&'))
            .map_or(result.len(), |pos| value_start + pos);

        if value_end > value_start {
            result.replace_range(value_start..value_end, REDACTED);
            search_start = value_start + REDACTED.len();
        } else {
            search_start = value_start;
        }
    }
}

/// Remove bearer tokens and client secrets from a message.
pub(crate) fn sanitize_error_message(msg: &str) -> String {
    let mut result = msg.to_string();
    redact_after(&mut result, "Bearer ");
    redact_after(&mut result, "client_secret=");
    result
}

/// Sanitize, then truncate a message to [`MAX_ERROR_MESSAGE_LEN`] bytes on a char boundary.
pub(crate) fn truncate_message(msg: &str) -> String {
    let sanitized = sanitize_error_message(msg);
    if sanitized.len() <= MAX_ERROR_MESSAGE_LEN {
        return sanitized;
    }

    let mut cut = MAX_ERROR_MESSAGE_LEN;
    while !sanitized.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated)", &sanitized[..cut])
}
