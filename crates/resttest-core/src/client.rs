//! HTTP Client Facade: a connection-pooled transport behind a single `issue` call.
//!
//! Wraps a [`reqwest::Client`] configured for keep-alive. One facade is constructed per
//! dispatch and shared across every concurrent execution of that dispatch — the pool is
//! sized to be at least as large as the dispatcher's concurrency cap so that no request
//! pays for a fresh TCP/TLS handshake it didn't need to.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Method, StatusCode};
use tracing::debug;

use crate::error::{Error, Result};

/// Default idle timeout for pooled connections.
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Closed enumeration of transport failure classes.
///
/// Distinguishes the handful of failure modes the retry policy needs to reason about;
/// anything that doesn't fit cleanly becomes [`TransportErrorKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection attempt itself timed out.
    ConnectTimeout,
    /// The connection was established but reading the response timed out.
    ReadTimeout,
    /// The peer actively refused the connection.
    ConnectionRefused,
    /// The peer reset an established connection.
    ConnectionReset,
    /// Hostname resolution failed.
    DnsFailure,
    /// TLS handshake or certificate validation failed.
    TlsError,
    /// Any other transport failure not covered by the above.
    Other,
}

impl TransportErrorKind {
    /// Short machine-readable tag, used as `AttemptRecord.error` on exhaustion.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::ReadTimeout => "read_timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::ConnectionReset => "connection_reset",
            Self::DnsFailure => "dns_failure",
            Self::TlsError => "tls_error",
            Self::Other => "other",
        }
    }

    fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest doesn't distinguish connect vs. read timeout in its public API;
            // `is_connect()` narrows it to the connect phase.
            return if err.is_connect() {
                Self::ConnectTimeout
            } else {
                Self::ReadTimeout
            };
        }
        if err.is_connect() {
            let message = err.to_string();
            if message.contains("dns error") || message.contains("failed to lookup address") {
                return Self::DnsFailure;
            }
            if message.contains("refused") {
                return Self::ConnectionRefused;
            }
            return Self::Other;
        }
        if err.is_request() {
            let message = err.to_string();
            if message.contains("reset") {
                return Self::ConnectionReset;
            }
        }
        if err.to_string().contains("tls") || err.to_string().contains("certificate") {
            return Self::TlsError;
        }
        Self::Other
    }
}

/// A drained, owned HTTP response — status, headers, and a fully-read body.
///
/// Draining the body up front means validators never pay a surprise I/O cost when
/// they inspect it, and latency measurements include the full response transfer.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, insertion order preserved.
    pub headers: Vec<(String, String)>,
    /// Fully-drained response body.
    pub body: Vec<u8>,
}

/// Configuration for the pooled transport underlying [`HttpClientFacade`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Idle-connection timeout for the pool.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections kept open per host.
    pub pool_max_idle_per_host: usize,
}

impl ClientConfig {
    /// Build a config sized for a dispatcher with the given concurrency cap: the pool
    /// never holds fewer idle connections per host than requests may be in flight.
    #[must_use]
    pub fn for_concurrency(concurrency: usize) -> Self {
        Self {
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: concurrency.max(1),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_concurrency(1)
    }
}

/// Shared HTTP client wrapper. Cheap to clone — the underlying `reqwest::Client` is
/// reference-counted internally and the connection pool is shared across clones.
#[derive(Debug, Clone)]
pub struct HttpClientFacade {
    http: Client,
}

impl HttpClientFacade {
    /// Build a facade with the given pool configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the underlying transport cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = ClientBuilder::new()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|err| Error::InvalidConfig(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { http })
    }

    /// Issue one request and fully drain its response, enforcing `timeout` as the total
    /// per-attempt deadline (connect + send + receive).
    pub async fn issue(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportErrorKind> {
        let mut request = self.http.request(method, url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(url, "issuing request");

        let response = request.send().await.map_err(|err| {
            debug!(url, error = %err, "transport error");
            TransportErrorKind::classify(&err)
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportErrorKind::classify(&err))?
            .to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// True iff `status` is one of the standard retryable server-error codes.
///
/// Exposed for callers that want the engine's default classification without
/// constructing a full [`crate::retry::RetryPolicy`] (e.g. quick defaults in tests).
#[must_use]
pub fn is_default_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
