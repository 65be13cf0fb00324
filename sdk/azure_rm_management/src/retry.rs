//! Bounded retry of a single logical operation.
//!
//! [`send_with_retry`] runs an [`OutgoingRequest`] through the transport,
//! turns error-range responses into errors, and re-sends the same request
//! while the retry budget lasts. The budget is a plain counter owned by the
//! call, so concurrent operations never share it.

use crate::error::{ManagementError, ManagementResult};
use crate::request::OutgoingRequest;
use crate::response::{interpret_error, ErrorClassifier, Response};
use crate::transport::{execute, Transport};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use std::time::Duration;

/// Number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Upper bound for a single backoff delay, before jitter.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Determines if an HTTP status code represents a transient error.
///
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Delay before the first retry. Zero retries immediately.
    /// Otherwise retries back off exponentially (2^attempt * initial_backoff) with ±25% jitter.
    pub initial_backoff: Duration,
    /// Retry every error status. When off, only [`is_retriable_status`] codes are retried.
    pub retry_any_error_status: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::ZERO,
            retry_any_error_status: true,
        }
    }
}

impl RetryPolicy {
    /// Immediate retries, up to `max_retries`.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Exponential backoff with jitter, retrying only transient statuses.
    pub fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            retry_any_error_status: false,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::immediate(0)
    }

    /// Whether a failed attempt may be retried, budget permitting.
    ///
    /// Starts from [`ManagementError::is_retryable`] and, for status-bearing
    /// errors, narrows to transient statuses unless the policy retries any
    /// error status.
    pub fn should_retry(&self, err: &ManagementError) -> bool {
        if !err.is_retryable() {
            return false;
        }
        err.status()
            .map_or(true, |status| self.retry_any_error_status || is_retriable_status(status))
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(retry);
        let base_backoff = self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF);
        // jitter_factor is in range [0.75, 1.25] for ±25% variation
        let jitter = 0.75 + fastrand::f64() * 0.5;
        base_backoff.mul_f64(jitter)
    }
}

/// Collaborators used by [`send_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    pub transport: &'a dyn Transport,
    pub classifier: &'a dyn ErrorClassifier,
    pub policy: &'a RetryPolicy,
    /// Error statuses returned as plain responses instead of errors.
    pub accepted_statuses: &'a [StatusCode],
}

/// Send `request`, retrying up to `retries` more times.
///
/// At most `retries + 1` attempts are made. Transport failures and error
/// statuses allowed by the policy consume one retry each; body read failures
/// are terminal. When the budget runs out the last error is returned.
///
/// # Errors
///
/// Returns [`ManagementError::Cancelled`] if `cancel` fires while a request
/// or a backoff delay is in flight.
pub async fn send_with_retry(
    ctx: &RetryContext<'_>,
    request: &OutgoingRequest,
    retries: u32,
    cancel: &CancellationToken,
) -> ManagementResult<Response> {
    let mut remaining = retries;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        tracing::debug!(attempt, remaining, method = %request.method, url = %request.url, "sending request");

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ManagementError::Cancelled),
            outcome = attempt_once(ctx, request) => outcome,
        };

        let err = match outcome {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if remaining == 0 || !ctx.policy.should_retry(&err) {
            tracing::debug!(attempt, error = %err, "giving up");
            return Err(err);
        }

        tracing::warn!(attempt, remaining, error = %err, "request failed, retrying");

        let delay = ctx.policy.backoff(attempt - 1);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ManagementError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
        remaining -= 1;
    }
}

async fn attempt_once(
    ctx: &RetryContext<'_>,
    request: &OutgoingRequest,
) -> ManagementResult<Response> {
    let response = execute(ctx.transport, request).await?;
    let status = response.status();
    tracing::debug!(status = status.as_u16(), request_id = ?response.request_id(), "received response");

    if status.as_u16() < 400 || ctx.accepted_statuses.contains(&status) {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let body = response.read_body().await?;
    Err(interpret_error(ctx.classifier, status, &headers, &body))
}
