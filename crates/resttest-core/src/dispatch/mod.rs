//! Dispatchers: fan out `repeat` executions of a test under a concurrency cap.
//!
//! Both implementations share one contract (§4.4 of the data model): given a spec, a
//! retry policy, and `concurrency`, invoke the Single-Request Executor exactly `repeat`
//! times with no more than `concurrency` in flight, and return records in completion
//! order. What differs is only the scheduling primitive — OS threads here, cooperative
//! tasks there — the retry/backoff/validation algorithm itself lives once, in
//! [`crate::executor`].
//!
//! Both also accept a [`CancellationToken`]: once signaled, the dispatcher stops
//! submitting new work and waits for whatever's already in flight to finish or fail.
//! There is no forced termination of running I/O beyond the per-request `timeout`.

/// Single-threaded cooperative scheduler with a bounded concurrency gate.
pub mod cooperative;
/// Fixed pool of OS threads pulling from a shared work queue.
pub mod workers;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::HttpClientFacade;
use crate::retry::RetryPolicy;
use crate::spec::{DispatchMode, PerformanceSpec, TestSpec};
use crate::types::AttemptRecord;
use crate::validator::Validator;

/// The records and timing produced by one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// One record per completed execution, in completion order.
    pub records: Vec<AttemptRecord>,
    /// Wall-clock elapsed for the fan-out, captured around the dispatcher itself.
    pub wall_time_sec: f64,
}

/// Run `performance.repeat()` executions of `spec` under `performance.mode()`.
///
/// `cancel` is the dispatch's external cancel signal: once it fires, no new executions
/// are started, but anything already in flight runs to completion or error.
pub async fn dispatch<C>(
    spec: Arc<TestSpec>,
    performance: &PerformanceSpec,
    policy: Arc<RetryPolicy>,
    client: Arc<HttpClientFacade>,
    validators: Arc<Vec<Box<dyn Validator<C>>>>,
    cancel: CancellationToken,
) -> DispatchOutcome
where
    C: Default + Send + 'static,
{
    match performance.mode() {
        DispatchMode::ParallelWorkers => workers::run(
            spec,
            performance.repeat(),
            performance.concurrency(),
            policy,
            client,
            validators,
            cancel,
        ),
        DispatchMode::CooperativeAsync => {
            cooperative::run(
                spec,
                performance.repeat(),
                performance.concurrency(),
                policy,
                client,
                validators,
                cancel,
            )
            .await
        }
    }
}

/// Best-effort extraction of a human-readable message from a caught panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send + 'static)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
