//! Retry policy: pure logic for whether/when to retry an attempt.
//!
//! Deliberately has no knowledge of HTTP or of the scheduling mode (worker pool vs.
//! cooperative async) — it only answers "should this retry" and "how long to wait".
//! [`crate::executor`] composes this over [`crate::client::HttpClientFacade`].

use std::collections::HashSet;
use std::time::Duration;

use crate::client::TransportErrorKind;
use crate::error::{Error, Result};

/// Default status codes considered transient and worth retrying.
const DEFAULT_RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Configuration determining which failures retry and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    retry_statuses: HashSet<u16>,
    retry_errors: HashSet<TransportErrorKind>,
}

impl RetryPolicy {
    /// Start building a `RetryPolicy` with the spec's defaults:
    /// `max_retries=0`, `backoff_base=0`, `backoff_max=0`, retryable statuses
    /// `{500,502,503,504}`, retryable transport errors = connect/read timeout,
    /// connection refused/reset, DNS failure.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total number of attempts a logical request may make: `max_retries + 1`.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// The configured maximum retry count.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True iff `code` is in the configured set of retryable statuses.
    #[must_use]
    pub fn should_retry_status(&self, code: u16) -> bool {
        self.retry_statuses.contains(&code)
    }

    /// True iff `kind` is in the configured set of retryable transport errors.
    #[must_use]
    pub fn should_retry_error(&self, kind: TransportErrorKind) -> bool {
        self.retry_errors.contains(&kind)
    }

    /// Delay before the `attempt`-th retry (0-indexed): `min(backoff_base * 2^attempt, backoff_max)`.
    ///
    /// `attempt=0` yields `backoff_base` itself, not zero — there is always a nonzero
    /// pause between a failed first attempt and its retry.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_base.saturating_mul(1 << attempt.min(31));
        scaled.min(self.backoff_max)
    }
}

/// Builder for [`RetryPolicy`], validating invariants at `build()` time.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    retry_statuses: HashSet<u16>,
    retry_errors: HashSet<TransportErrorKind>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            retry_statuses: DEFAULT_RETRY_STATUSES.into_iter().collect(),
            retry_errors: [
                TransportErrorKind::ConnectTimeout,
                TransportErrorKind::ReadTimeout,
                TransportErrorKind::ConnectionRefused,
                TransportErrorKind::ConnectionReset,
                TransportErrorKind::DnsFailure,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RetryPolicyBuilder {
    /// Set the maximum number of retry attempts.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay (used for `attempt=0`).
    #[must_use]
    pub const fn backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Set the backoff cap.
    #[must_use]
    pub const fn backoff_max(mut self, backoff_max: Duration) -> Self {
        self.backoff_max = backoff_max;
        self
    }

    /// Replace the set of retryable HTTP status codes.
    #[must_use]
    pub fn retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_statuses = statuses.into_iter().collect();
        self
    }

    /// Replace the set of retryable transport error kinds.
    #[must_use]
    pub fn retry_errors(mut self, errors: impl IntoIterator<Item = TransportErrorKind>) -> Self {
        self.retry_errors = errors.into_iter().collect();
        self
    }

    /// Validate and construct the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `backoff_max < backoff_base`.
    pub fn build(self) -> Result<RetryPolicy> {
        if self.backoff_max < self.backoff_base {
            return Err(Error::InvalidConfig(format!(
                "backoff_max ({:?}) must be >= backoff_base ({:?})",
                self.backoff_max, self.backoff_base
            )));
        }

        Ok(RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            backoff_max: self.backoff_max,
            retry_statuses: self.retry_statuses,
            retry_errors: self.retry_errors,
        })
    }
}
