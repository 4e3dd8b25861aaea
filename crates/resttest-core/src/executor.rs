//! Single-Request Executor: one logical request (a request-with-retries), one record.
//!
//! Written once and shared by both dispatchers — what differs between parallel-workers
//! and cooperative-async is only *how* "sleep" and "now" are implemented, not the retry
//! algorithm itself. This mirrors the retry-layer-over-inner-service pattern the core
//! crate uses elsewhere: the executor doesn't know or care which scheduler is calling it.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::client::HttpClientFacade;
use crate::retry::RetryPolicy;
use crate::spec::TestSpec;
use crate::types::AttemptRecord;
use crate::validator::{ResponseView, Validator};

/// A cooperative or blocking sleep, injected by the calling dispatcher.
///
/// Parallel-workers passes a blocking `std::thread::sleep`; cooperative-async passes
/// `tokio::time::sleep`. The executor itself never chooses.
pub type SleepFn<'a> = Box<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'a>;

/// Run one logical request against `spec`, retrying per `policy`, using `client` for
/// transport and `sleep` for backoff delays.
///
/// `validators` run once, only on the response that is ultimately kept (never on a
/// response that triggered a retry), short-circuiting on the first failure.
pub async fn execute<C>(
    spec: &TestSpec,
    policy: &RetryPolicy,
    client: &HttpClientFacade,
    validators: &[Box<dyn Validator<C>>],
    context: &mut C,
    sleep: &SleepFn<'_>,
) -> AttemptRecord {
    let method = parse_method(spec.method());
    let mut attempt: u32 = 0;
    let mut retries: u32 = 0;

    loop {
        let t_start = Instant::now();
        let outcome = client
            .issue(
                method.clone(),
                spec.url(),
                spec.headers(),
                spec.body().map(<[u8]>::to_vec),
                spec.timeout(),
            )
            .await;

        match outcome {
            Err(kind) => {
                let exhausted = attempt >= policy.max_retries();
                let retryable = policy.should_retry_error(kind);
                if !exhausted && retryable {
                    let delay = policy.backoff(attempt);
                    debug!(
                        url = spec.url(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = kind.as_str(),
                        "retrying after transport error"
                    );
                    sleep(delay).await;
                    attempt += 1;
                    retries += 1;
                    continue;
                }

                let elapsed_ms = elapsed_ms_since(t_start);
                if retryable {
                    warn!(url = spec.url(), retries, "retry attempts exhausted");
                } else {
                    debug!(url = spec.url(), error = kind.as_str(), "non-retryable transport error");
                }
                return AttemptRecord::transport_failure(elapsed_ms, retries, kind.as_str());
            }
            Ok(response) => {
                let exhausted = attempt >= policy.max_retries();
                let retryable_status = policy.should_retry_status(response.status);
                if !exhausted && retryable_status {
                    let delay = policy.backoff(attempt);
                    debug!(
                        url = spec.url(),
                        attempt,
                        status = response.status,
                        delay_ms = delay.as_millis(),
                        "retrying after retryable status"
                    );
                    sleep(delay).await;
                    attempt += 1;
                    retries += 1;
                    continue;
                }

                let elapsed_ms = elapsed_ms_since(t_start);
                let status_ok = spec.expected_status().contains(&response.status);
                let view = ResponseView::from(&response);

                let mut failing_validator = None;
                for validator in validators {
                    if !validator.validate(&view, context) {
                        failing_validator = Some(validator.name().to_string());
                        break;
                    }
                }

                let passed = status_ok && failing_validator.is_none();
                if retries > 0 {
                    info!(url = spec.url(), retries, "request succeeded after retries");
                }

                return AttemptRecord::new(response.status, elapsed_ms, passed, retries, failing_validator);
            }
        }
    }
}

fn elapsed_ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn parse_method(method: &str) -> Method {
    method.parse().unwrap_or(Method::GET)
}
