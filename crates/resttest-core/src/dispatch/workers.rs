//! Parallel-Workers Dispatcher (`mode=parallel-workers`).
//!
//! A fixed pool of OS threads pulls from a shared work queue; each thread runs the
//! executor synchronously, blocking on network I/O and on backoff sleeps. There is no
//! `rayon`/`threadpool`/`crossbeam` anywhere upstream of this crate, so the pool is built
//! directly on `std::thread` and `std::sync::mpsc` — the literal reading of "native OS
//! threads" rather than an added dependency.

use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::HttpClientFacade;
use crate::executor::{self, SleepFn};
use crate::retry::RetryPolicy;
use crate::spec::TestSpec;
use crate::types::AttemptRecord;
use crate::validator::Validator;

use super::{panic_message, DispatchOutcome};

/// Run `repeat` executions of `spec` across up to `concurrency` worker threads.
///
/// `repeat == 0` returns an empty outcome without spawning any work. A panic inside a
/// worker while executing one request is caught and turned into a failed record rather
/// than propagated, so one bad request cannot take down the run. Once `cancel` fires, a
/// worker that has just pulled a work item drops it instead of starting the executor;
/// whatever's already running finishes normally since the per-attempt retry loop itself
/// doesn't observe the token.
pub fn run<C>(
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

    if repeat == 0 {
        return DispatchOutcome {
            records: Vec::new(),
            wall_time_sec: t_start.elapsed().as_secs_f64(),
        };
    }

    let worker_count = concurrency.min(repeat).max(1) as usize;

    let (work_tx, work_rx) = mpsc::channel::<()>();
    for _ in 0..repeat {
        work_tx.send(()).expect("receiver is held open until every work item is queued");
    }
    drop(work_tx);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let (result_tx, result_rx) = mpsc::channel::<AttemptRecord>();

    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let spec = Arc::clone(&spec);
        let policy = Arc::clone(&policy);
        let client = Arc::clone(&client);
        let validators = Arc::clone(&validators);
        let cancel = cancel.clone();

        let handle = std::thread::Builder::new()
            .name(format!("resttest-worker-{worker_id}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to start worker runtime");

                loop {
                    if cancel.is_cancelled() {
                        info!(worker = worker_id, "cancellation observed, no new work will be started");
                        break;
                    }

                    let next = {
                        let rx = work_rx.lock().expect("work queue mutex poisoned");
                        rx.recv()
                    };
                    if next.is_err() {
                        break;
                    }

                    if cancel.is_cancelled() {
                        info!(worker = worker_id, "cancellation observed, dropping unstarted work item");
                        break;
                    }

                    let record = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        runtime.block_on(async {
                            let mut context = C::default();
                            let sleep: SleepFn<'_> = blocking_sleep();
                            executor::execute(&spec, &policy, &client, &validators, &mut context, &sleep).await
                        })
                    }))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        error!(worker = worker_id, error = %message, "worker panicked while executing request");
                        AttemptRecord::new(0, 0.0, false, 0, Some(format!("panic: {message}")))
                    });

                    if result_tx.send(record).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn worker thread");

        handles.push(handle);
    }
    drop(result_tx);

    let mut records = Vec::with_capacity(repeat as usize);
    while let Ok(record) = result_rx.recv() {
        records.push(record);
    }

    for handle in handles {
        let _ = handle.join();
    }

    let wall_time_sec = t_start.elapsed().as_secs_f64();
    info!(repeat, concurrency, wall_time_sec, "parallel-workers dispatch complete");

    DispatchOutcome { records, wall_time_sec }
}

fn blocking_sleep<'a>() -> SleepFn<'a> {
    Box::new(|delay: Duration| Box::pin(async move { std::thread::sleep(delay) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::spec::TestSpec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn empty_repeat_returns_no_records() {
        let spec = Arc::new(TestSpec::builder("noop", "GET", "http://unused").build().unwrap());
        let policy = Arc::new(RetryPolicy::builder().build().unwrap());
        let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(1)).unwrap());
        let validators: Arc<Vec<Box<dyn Validator<()>>>> = Arc::new(Vec::new());

        let outcome = run(spec, 0, 5, policy, client, validators, CancellationToken::new());

        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn runs_every_repeat_and_caps_concurrency_at_repeat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let spec = Arc::new(
            TestSpec::builder("ok", "GET", format!("{}/ok", server.uri()))
                .build()
                .unwrap(),
        );
        let policy = Arc::new(RetryPolicy::builder().build().unwrap());
        let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(3)).unwrap());
        let validators: Arc<Vec<Box<dyn Validator<()>>>> = Arc::new(Vec::new());

        let outcome = run(spec, 3, 50, policy, client, validators, CancellationToken::new());

        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.records.iter().all(|r| r.passed));
    }

    #[tokio::test]
    async fn cancellation_stops_new_work_without_failing_in_flight_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let spec = Arc::new(
            TestSpec::builder("ok", "GET", format!("{}/ok", server.uri()))
                .build()
                .unwrap(),
        );
        let policy = Arc::new(RetryPolicy::builder().build().unwrap());
        let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(1)).unwrap());
        let validators: Arc<Vec<Box<dyn Validator<()>>>> = Arc::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run(spec, 20, 1, policy, client, validators, cancel);

        assert_eq!(outcome.records.len(), 0);
    }
}
