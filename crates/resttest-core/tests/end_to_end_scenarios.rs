//! End-to-end scenarios exercising the full pipeline: spec → dispatcher → executor →
//! HTTP client → run aggregator, against a real (mock) HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resttest_core::aggregate::summarize;
use resttest_core::client::{ClientConfig, HttpClientFacade};
use resttest_core::dispatch;
use resttest_core::retry::RetryPolicy;
use resttest_core::spec::{DispatchMode, PerformanceSpec, RpsMode, TestSpec};
use resttest_core::validator::Validator;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn no_validators() -> Arc<Vec<Box<dyn Validator<()>>>> {
    Arc::new(Vec::new())
}

/// S1: server returns 200 always; ten requests, five workers, no retries expected.
#[tokio::test]
async fn happy_path_parallel_workers() {
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
    let performance = PerformanceSpec::builder(10, DispatchMode::ParallelWorkers)
        .concurrency(5)
        .build()
        .unwrap();
    let policy = Arc::new(RetryPolicy::builder().max_retries(3).build().unwrap());
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(5)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;

    assert_eq!(outcome.records.len(), 10);
    let summary = summarize(&outcome.records, outcome.wall_time_sec, RpsMode::Wall, None, &[]);
    assert_eq!(summary.total, 10);
    assert_eq!(summary.passed, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total_retries, 0);
}

/// S2: server returns 503 once then 200; single in-flight request, one retry expected,
/// and the reported latency should reflect only the final (successful) attempt.
#[tokio::test]
async fn retry_then_success_reports_only_final_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let spec = Arc::new(
        TestSpec::builder("flaky", "GET", format!("{}/flaky", server.uri()))
            .build()
            .unwrap(),
    );
    let performance = PerformanceSpec::builder(1, DispatchMode::ParallelWorkers)
        .concurrency(1)
        .build()
        .unwrap();
    let policy = Arc::new(
        RetryPolicy::builder()
            .max_retries(2)
            .backoff_base(Duration::from_millis(10))
            .backoff_max(Duration::from_millis(50))
            .build()
            .unwrap(),
    );
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(1)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.status, 200);
    assert!(record.passed);
    assert_eq!(record.retries, 1);
}

/// S3: server returns 500 always; retries exhaust and every record fails.
#[tokio::test]
async fn retry_exhaustion_fails_every_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let spec = Arc::new(
        TestSpec::builder("down", "GET", format!("{}/down", server.uri()))
            .build()
            .unwrap(),
    );
    let performance = PerformanceSpec::builder(3, DispatchMode::ParallelWorkers)
        .concurrency(3)
        .build()
        .unwrap();
    let policy = Arc::new(
        RetryPolicy::builder()
            .max_retries(2)
            .backoff_base(Duration::from_millis(5))
            .backoff_max(Duration::from_millis(20))
            .build()
            .unwrap(),
    );
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(3)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;

    let summary = summarize(&outcome.records, outcome.wall_time_sec, RpsMode::Wall, None, &[]);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.total_retries, 6);
    for record in &outcome.records {
        assert_eq!(record.status, 500);
        assert_eq!(record.retries, 2);
    }
}

/// S4: a 404 is not in the default retryable set and not in `expected_status`; the
/// record fails immediately with zero retries.
#[tokio::test]
async fn non_retryable_status_fails_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let spec = Arc::new(
        TestSpec::builder("missing", "GET", format!("{}/missing", server.uri()))
            .build()
            .unwrap(),
    );
    let performance = PerformanceSpec::builder(1, DispatchMode::ParallelWorkers)
        .concurrency(1)
        .build()
        .unwrap();
    let policy = Arc::new(RetryPolicy::builder().max_retries(5).build().unwrap());
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(1)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].status, 404);
    assert!(!outcome.records[0].passed);
    assert_eq!(outcome.records[0].retries, 0);
}

struct FixedDelay {
    delays_ms: Vec<u64>,
    next: AtomicUsize,
}

impl Respond for FixedDelay {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms[index % self.delays_ms.len()];
        ResponseTemplate::new(200).set_delay(Duration::from_millis(delay))
    }
}

/// S5: ten sequential requests with known delays; percentile interpolation should match
/// the reference linear-interpolation formula.
#[tokio::test]
async fn percentiles_interpolate_across_sequential_requests() {
    let server = MockServer::start().await;
    let delays_ms = vec![10, 10, 10, 10, 10, 10, 10, 10, 10, 100];

    Mock::given(method("GET"))
        .and(path("/timed"))
        .respond_with(FixedDelay {
            delays_ms,
            next: AtomicUsize::new(0),
        })
        .mount(&server)
        .await;

    let spec = Arc::new(
        TestSpec::builder("timed", "GET", format!("{}/timed", server.uri()))
            .build()
            .unwrap(),
    );
    let performance = PerformanceSpec::builder(10, DispatchMode::ParallelWorkers)
        .concurrency(1)
        .percentiles([50, 95, 99])
        .build()
        .unwrap();
    let policy = Arc::new(RetryPolicy::builder().build().unwrap());
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(1)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;
    let summary = summarize(
        &outcome.records,
        outcome.wall_time_sec,
        RpsMode::Wall,
        None,
        performance.percentiles(),
    );

    assert_eq!(summary.total, 10);
    assert!((summary.percentiles["p50"] - 10.0).abs() < 1.0);
    assert!((summary.percentiles["p95"] - 59.5).abs() < 5.0);
    assert!((summary.percentiles["p99"] - 91.9).abs() < 5.0);
}

/// S6: a cooperative-async dispatch with concurrency=5 over 50 requests must never let
/// the mock server observe more than 5 handlers in flight at once.
#[tokio::test]
async fn concurrency_cap_is_enforced_under_cooperative_async() {
    let server = MockServer::start().await;
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    struct Tracker {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }
    impl Respond for Tracker {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            self.current.fetch_sub(1, Ordering::SeqCst);
            ResponseTemplate::new(200)
        }
    }

    Mock::given(method("GET"))
        .and(path("/bounded"))
        .respond_with(Tracker {
            current: Arc::clone(&current),
            peak: Arc::clone(&peak),
        })
        .mount(&server)
        .await;

    let spec = Arc::new(
        TestSpec::builder("bounded", "GET", format!("{}/bounded", server.uri()))
            .build()
            .unwrap(),
    );
    let performance = PerformanceSpec::builder(50, DispatchMode::CooperativeAsync)
        .concurrency(5)
        .build()
        .unwrap();
    let policy = Arc::new(RetryPolicy::builder().build().unwrap());
    let client = Arc::new(HttpClientFacade::new(ClientConfig::for_concurrency(5)).unwrap());

    let outcome = dispatch::dispatch(spec, &performance, policy, client, no_validators(), CancellationToken::new()).await;

    assert_eq!(outcome.records.len(), 50);
    assert!(peak.load(Ordering::SeqCst) <= 5);
}
