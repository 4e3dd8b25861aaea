//! # resttest-core
//!
//! The execution engine behind a declarative HTTP API test and load-generation tool:
//! retry policy, pooled HTTP client, single-request executor, the two concurrent
//! dispatchers (parallel-workers and cooperative-async), and the run aggregator that
//! turns a dispatch's attempt records into latency/throughput statistics.
//!
//! ## Modules
//!
//! - [`error`] - the crate's error taxonomy
//! - [`retry`] - retry/backoff policy, independent of HTTP and of scheduling mode
//! - [`client`] - pooled HTTP transport and transport-error classification
//! - [`validator`] - the response-validation capability interface
//! - [`spec`] - `TestSpec`/`PerformanceSpec` and their validating builders
//! - [`types`] - `AttemptRecord` and `PerfSummary`
//! - [`executor`] - the mode-agnostic single-request retry loop
//! - [`dispatch`] - the parallel-workers and cooperative-async dispatchers
//! - [`aggregate`] - statistics over a dispatch's attempt records

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Statistics over a dispatch's attempt records.
pub mod aggregate;
/// Pooled HTTP transport and transport-error classification.
pub mod client;
/// The parallel-workers and cooperative-async dispatchers.
pub mod dispatch;
/// The crate's error taxonomy.
pub mod error;
/// The mode-agnostic single-request retry loop.
pub mod executor;
/// Retry/backoff policy, independent of HTTP and of scheduling mode.
pub mod retry;
/// `TestSpec`/`PerformanceSpec` and their validating builders.
pub mod spec;
/// `AttemptRecord` and `PerfSummary`.
pub mod types;
/// The response-validation capability interface.
pub mod validator;

pub use error::{Error, Result};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use client::HttpClientFacade;
use retry::RetryPolicy;
use spec::{OutputFormat, TestSpec};
use types::PerfSummary;
use validator::Validator;

/// Run a performance test end to end: dispatch `spec.performance()`'s `repeat`
/// executions under its configured mode and concurrency cap, aggregate the resulting
/// `AttemptRecord`s into a [`PerfSummary`], and write the optional JSON artifact.
///
/// This is the engine's single entry point for a performance run, tying together the
/// dispatcher and the run aggregator the way a caller otherwise would by hand. `cancel`
/// is the run's external cancel signal (§5) — once it fires, the dispatcher stops
/// starting new executions and the summary is computed over whatever completed.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `spec` was not built with a `performance`
/// configuration.
pub async fn run_performance_test<C>(
    spec: Arc<TestSpec>,
    policy: Arc<RetryPolicy>,
    client: Arc<HttpClientFacade>,
    validators: Arc<Vec<Box<dyn Validator<C>>>>,
    cancel: CancellationToken,
) -> Result<PerfSummary>
where
    C: Default + Send + 'static,
{
    let performance = spec
        .performance()
        .cloned()
        .ok_or_else(|| Error::InvalidConfig(format!("test '{}' has no performance configuration", spec.name())))?;

    let outcome = dispatch::dispatch(Arc::clone(&spec), &performance, policy, client, validators, cancel).await;

    let summary = aggregate::summarize(
        &outcome.records,
        outcome.wall_time_sec,
        performance.rps_mode(),
        performance.threshold_ms(),
        performance.percentiles(),
    );

    if let (Some(path), Some(OutputFormat::Json)) = (performance.output_file(), performance.output_format()) {
        aggregate::write_json_artifact(&summary, path);
    }

    Ok(summary)
}
