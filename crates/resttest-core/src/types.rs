//! Per-attempt and per-run outcome types produced by the engine.

use serde::Serialize;

/// The outcome of one logical request (a request-with-retries).
///
/// Ownership transfers to [`crate::aggregate::summarize`] once emitted; the executor
/// that produced it never inspects it again.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// Response status, or `0` if the request never produced a response (transport
    /// error exhausted its retries).
    pub status: u16,
    /// Wall time of the *final* attempt only — not the cumulative retry sequence.
    pub elapsed_ms: f64,
    /// Whether `status` was in `expected_status` and every validator returned `true`.
    pub passed: bool,
    /// Number of retry attempts that preceded this outcome. Always `<= max_retries`.
    pub retries: u32,
    /// Populated when `status == 0` (transport error) or a validator rejected the
    /// response; `None` on a plain pass.
    pub error: Option<String>,
}

impl AttemptRecord {
    /// Construct a successful (or cleanly-failed-on-validation) record.
    #[must_use]
    pub fn new(status: u16, elapsed_ms: f64, passed: bool, retries: u32, error: Option<String>) -> Self {
        Self {
            status,
            elapsed_ms,
            passed,
            retries,
            error,
        }
    }

    /// Construct the record for a transport failure that exhausted its retries.
    #[must_use]
    pub fn transport_failure(elapsed_ms: f64, retries: u32, error_kind: &str) -> Self {
        Self {
            status: 0,
            elapsed_ms,
            passed: false,
            retries,
            error: Some(error_kind.to_string()),
        }
    }
}

/// Aggregated statistics over an [`AttemptRecord`] list produced by one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfSummary {
    /// Number of records (== `repeat`, absent cancellation).
    pub total: u32,
    /// Number of records with `passed == true`.
    pub passed: u32,
    /// `total - passed`.
    pub failed: u32,
    /// Minimum `elapsed_ms` across records (`0` if `total == 0`).
    pub min_ms: f64,
    /// Maximum `elapsed_ms` across records (`0` if `total == 0`).
    pub max_ms: f64,
    /// Mean `elapsed_ms` across records (`0` if `total == 0`).
    pub avg_ms: f64,
    /// Wall-clock elapsed for the dispatch's fan-out, captured by the dispatcher.
    pub wall_time_sec: f64,
    /// Requests per second, computed per the run's `rps_mode`.
    pub rps: f64,
    /// Sum of every record's `retries`.
    pub total_retries: u32,
    /// `total_retries / total` (`0` if `total == 0`).
    pub avg_retries_per_request: f64,
    /// Count of records whose `elapsed_ms` exceeded the configured threshold. Present
    /// only when a threshold was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_exceeded: Option<u32>,
    /// Requested percentile values, keyed `p{N}` in the order they were requested.
    /// Serialized as flattened `pN` fields alongside the rest of the summary.
    #[serde(flatten)]
    pub percentiles: std::collections::BTreeMap<String, f64>,
}
