//! Cooperative-Async Dispatcher (`mode=cooperative-async`).
//!
//! A single-threaded-cooperative scheduling model: every execution is a `tokio` task,
//! gated by a `Semaphore` sized to `concurrency` so that at most `concurrency` requests
//! are ever in flight. Backoff sleeps use `tokio::time::sleep`, a suspension point rather
//! than a blocking one — a blocking sleep here would be a correctness bug, not just a
//! performance one, since it would stall every other task sharing the executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::HttpClientFacade;
use crate::executor::{self, SleepFn};
use crate::retry::RetryPolicy;
use crate::spec::TestSpec;
use crate::types::AttemptRecord;
use crate::validator::Validator;

use super::{panic_message, DispatchOutcome};

/// Run `repeat` executions of `spec` with no more than `concurrency` in flight at once.
///
/// A panicking task is caught via its `JoinHandle` and turned into a failed record —
/// appended after the records collected in completion order, since a panicked task never
/// reaches the point of reporting its own outcome. Once `cancel` fires, the spawn loop
/// stops scheduling new tasks, and any task still waiting on the concurrency gate bails
/// out without ever issuing its request; a task already past the gate runs its executor
/// to completion.
pub async fn run<C>(
    spec: Arc<TestSpec>,
    repeat: u32,
    concurrency: u32,
    policy: Arc<RetryPolicy>,
    client: Arc<HttpClientFacade>,
    validators: Arc<Vec<Box<dyn Validator<C>>>>,
    cancel: CancellationToken,
) -> DispatchOutcome
where
    C: Default + Send + 'static,
{
    let t_start = Instant::now();
    let gate = Arc::new(Semaphore::new(concurrency.max(1) as usize));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<AttemptRecord>();

    let mut tasks = Vec::with_capacity(repeat as usize);
    for _ in 0..repeat {
        if cancel.is_cancelled() {
            info!("cancellation observed, no further tasks will be scheduled");
            break;
        }

        let gate = Arc::clone(&gate);
        let spec = Arc::clone(&spec);
        let policy = Arc::clone(&policy);
        let client = Arc::clone(&client);
        let validators = Arc::clone(&validators);
        let result_tx = result_tx.clone();
        let cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let permit = tokio::select! {
                permit = gate.acquire_owned() => {
                    permit.expect("semaphore is never closed during a dispatch")
                }
                () = cancel.cancelled() => {
                    info!("cancellation observed while waiting for a concurrency slot");
                    return;
                }
            };
            let mut context = C::default();
            let sleep: SleepFn<'_> = cooperative_sleep();
            let record = executor::execute(&spec, &policy, &client, &validators, &mut context, &sleep).await;
            drop(permit);
            let _ = result_tx.send(record);
        });
        tasks.push(task);
    }
    drop(result_tx);

    let mut records = Vec::with_capacity(repeat as usize);
    while let Some(record) = result_rx.recv().await {
        records.push(record);
    }

    for task in tasks {
        if let Err(join_error) = task.await {
            if join_error.is_panic() {
                let payload = join_error.into_panic();
                let message = panic_message(payload.as_ref());
                error!(error = %message, "task panicked while executing request");
                records.push(AttemptRecord::new(0, 0.0, false, 0, Some(format!("panic: {message}"))));
            } else {
                error!("task was cancelled before completing");
            }
        }
    }

    let wall_time_sec = t_start.elapsed().as_secs_f64();
    info!(repeat, concurrency, wall_time_sec, "cooperative-async dispatch complete");

    DispatchOutcome { records, wall_time_sec }
}

fn cooperative_sleep<'a>() -> SleepFn<'a> {
    Box::new(|delay: Duration| Box::pin(tokio::time::sleep(delay)))
}
