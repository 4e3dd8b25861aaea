//! Test and performance specifications: the immutable input to a dispatch.
//!
//! `TestSpec`/`PerformanceSpec` are plain data — construction validates the invariants
//! from the data model (non-empty `expected_status`, `concurrency >= 1`, etc.) eagerly,
//! the same way the reference workspace validates its client configuration, so a caller
//! never hands the dispatcher something it would have to reject mid-run.

use std::collections::HashSet;
use std::time::Duration;

use validator::ValidationError;

use crate::error::{Error, Result};

/// How a performance run fans out its `repeat` executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// A bounded pool of OS threads, each blocking on I/O and on backoff sleeps.
    ParallelWorkers,
    /// A single-threaded cooperative scheduler with a bounded in-flight gate.
    CooperativeAsync,
}

/// How throughput (`rps`) is computed from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpsMode {
    /// `total / wall_time_sec`.
    Wall,
    /// `1000 / avg_ms`, isolating server latency from concurrency effects.
    Response,
}

impl Default for RpsMode {
    fn default() -> Self {
        Self::Wall
    }
}

/// Artifact serialization format for an optional summary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON, 2-space indented.
    Json,
}

/// Performance-mode configuration for a `TestSpec`.
#[derive(Debug, Clone)]
pub struct PerformanceSpec {
    repeat: u32,
    concurrency: u32,
    mode: DispatchMode,
    threshold_ms: Option<f64>,
    rps_mode: RpsMode,
    percentiles: Vec<u8>,
    output_file: Option<String>,
    output_format: Option<OutputFormat>,
}

impl PerformanceSpec {
    /// Start building a performance spec for `repeat` requests under `mode`.
    #[must_use]
    pub fn builder(repeat: u32, mode: DispatchMode) -> PerformanceSpecBuilder {
        PerformanceSpecBuilder {
            repeat,
            concurrency: 1,
            mode,
            threshold_ms: None,
            rps_mode: RpsMode::default(),
            percentiles: Vec::new(),
            output_file: None,
            output_format: None,
        }
    }

    /// Total number of requests to issue.
    #[must_use]
    pub const fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Maximum number of requests in flight at once. Never exceeds `repeat`.
    #[must_use]
    pub const fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Dispatch mode.
    #[must_use]
    pub const fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Optional latency threshold, milliseconds.
    #[must_use]
    pub const fn threshold_ms(&self) -> Option<f64> {
        self.threshold_ms
    }

    /// Throughput computation mode.
    #[must_use]
    pub const fn rps_mode(&self) -> RpsMode {
        self.rps_mode
    }

    /// Requested percentiles, in the order they were configured.
    #[must_use]
    pub fn percentiles(&self) -> &[u8] {
        &self.percentiles
    }

    /// Artifact output path, if configured.
    #[must_use]
    pub fn output_file(&self) -> Option<&str> {
        self.output_file.as_deref()
    }

    /// Artifact output format, if configured.
    #[must_use]
    pub const fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }
}

/// Builder for [`PerformanceSpec`], validating invariants at `build()` time.
#[derive(Debug, Clone)]
pub struct PerformanceSpecBuilder {
    repeat: u32,
    concurrency: u32,
    mode: DispatchMode,
    threshold_ms: Option<f64>,
    rps_mode: RpsMode,
    percentiles: Vec<u8>,
    output_file: Option<String>,
    output_format: Option<OutputFormat>,
}

impl PerformanceSpecBuilder {
    /// Set the concurrency cap.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set a latency threshold, milliseconds.
    #[must_use]
    pub const fn threshold_ms(mut self, threshold_ms: f64) -> Self {
        self.threshold_ms = Some(threshold_ms);
        self
    }

    /// Set the throughput computation mode.
    #[must_use]
    pub const fn rps_mode(mut self, rps_mode: RpsMode) -> Self {
        self.rps_mode = rps_mode;
        self
    }

    /// Set the requested percentiles (each must be in `[0, 100]`).
    #[must_use]
    pub fn percentiles(mut self, percentiles: impl IntoIterator<Item = u8>) -> Self {
        self.percentiles = percentiles.into_iter().collect();
        self
    }

    /// Configure a JSON artifact sink.
    #[must_use]
    pub fn output_json(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self.output_format = Some(OutputFormat::Json);
        self
    }

    /// Validate and construct the spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `repeat == 0`, `concurrency == 0`, or any
    /// requested percentile is outside `[0, 100]`. `concurrency` is capped at `repeat`
    /// per the dispatcher tie-break rule, not rejected.
    pub fn build(mut self) -> Result<PerformanceSpec> {
        if self.repeat == 0 {
            return Err(Error::InvalidConfig("repeat must be >= 1".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be >= 1".into()));
        }
        if let Some(bad) = self.percentiles.iter().find(|&&p| p > 100) {
            return Err(Error::InvalidConfig(format!(
                "percentile {bad} is out of range [0, 100]"
            )));
        }

        self.concurrency = self.concurrency.min(self.repeat);

        Ok(PerformanceSpec {
            repeat: self.repeat,
            concurrency: self.concurrency,
            mode: self.mode,
            threshold_ms: self.threshold_ms,
            rps_mode: self.rps_mode,
            percentiles: self.percentiles,
            output_file: self.output_file,
            output_format: self.output_format,
        })
    }
}

/// An HTTP API test case: a request plus its expected-status and validator checks.
#[derive(Debug, Clone)]
pub struct TestSpec {
    name: String,
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    expected_status: HashSet<u16>,
    timeout: Duration,
    performance: Option<PerformanceSpec>,
}

impl TestSpec {
    /// Start building a test spec for `method url`.
    #[must_use]
    pub fn builder(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> TestSpecBuilder {
        TestSpecBuilder {
            name: name.into(),
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            expected_status: None,
            timeout: Duration::from_secs(30),
            performance: None,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uppercase HTTP verb.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Absolute request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Acceptable response status codes.
    #[must_use]
    pub const fn expected_status(&self) -> &HashSet<u16> {
        &self.expected_status
    }

    /// Per-attempt deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performance-mode configuration, if this test is a performance test.
    #[must_use]
    pub const fn performance(&self) -> Option<&PerformanceSpec> {
        self.performance.as_ref()
    }
}

/// Builder for [`TestSpec`], validating invariants at `build()` time.
#[derive(Debug, Clone)]
pub struct TestSpecBuilder {
    name: String,
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    expected_status: Option<HashSet<u16>>,
    timeout: Duration,
    performance: Option<PerformanceSpec>,
}

impl TestSpecBuilder {
    /// Append a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the raw request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the acceptable status codes. Defaults to `{200}` if never called.
    #[must_use]
    pub fn expected_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status = Some(statuses.into_iter().collect());
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mark this test as a performance test.
    #[must_use]
    pub fn performance(mut self, performance: PerformanceSpec) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Validate and construct the spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `expected_status` was explicitly set to
    /// empty.
    pub fn build(self) -> Result<TestSpec> {
        let expected_status = match self.expected_status {
            Some(set) if set.is_empty() => {
                return Err(Error::InvalidConfig(
                    "expected_status must be non-empty".into(),
                ))
            }
            Some(set) => set,
            None => HashSet::from([200]),
        };

        Ok(TestSpec {
            name: self.name,
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            expected_status,
            timeout: self.timeout,
            performance: self.performance,
        })
    }
}

/// `validator`-crate predicate usable on raw percentile collections in config
/// structures that are deserialized rather than built via [`PerformanceSpecBuilder`].
///
/// # Errors
///
/// Returns a `ValidationError` if any percentile is outside `[0, 100]`.
pub fn validate_percentiles(percentiles: &[u8]) -> std::result::Result<(), ValidationError> {
    if percentiles.iter().any(|&p| p > 100) {
        return Err(ValidationError::new("percentile_out_of_range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_expected_status_to_200() {
        let spec = TestSpec::builder("ok", "get", "http://x/ok").build().unwrap();
        assert_eq!(spec.expected_status(), &HashSet::from([200]));
        assert_eq!(spec.method(), "GET");
        assert_eq!(spec.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_spec_rejects_empty_expected_status() {
        let result = TestSpec::builder("ok", "GET", "http://x/ok")
            .expected_status([])
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn performance_spec_rejects_zero_repeat() {
        let result = PerformanceSpec::builder(0, DispatchMode::ParallelWorkers).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn performance_spec_rejects_zero_concurrency() {
        let result = PerformanceSpec::builder(10, DispatchMode::ParallelWorkers)
            .concurrency(0)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn performance_spec_caps_concurrency_at_repeat() {
        let spec = PerformanceSpec::builder(5, DispatchMode::ParallelWorkers)
            .concurrency(50)
            .build()
            .unwrap();
        assert_eq!(spec.concurrency(), 5);
    }

    #[test]
    fn performance_spec_rejects_out_of_range_percentile() {
        let result = PerformanceSpec::builder(10, DispatchMode::ParallelWorkers)
            .percentiles([50, 150])
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_percentiles_rejects_above_100() {
        assert!(validate_percentiles(&[50, 95]).is_ok());
        assert!(validate_percentiles(&[50, 200]).is_err());
    }
}
