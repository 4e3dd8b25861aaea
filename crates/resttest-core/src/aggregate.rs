//! Run Aggregator: turns one dispatch's [`AttemptRecord`] list into a [`PerfSummary`].
//!
//! Pure statistics over data the dispatcher already produced — no I/O except the
//! optional JSON artifact write, which is best-effort and never fails the run.

use std::path::Path;

use tracing::{error, info};

use crate::types::{AttemptRecord, PerfSummary};

/// Compute a [`PerfSummary`] from `records` and the dispatch's `wall_time_sec`.
///
/// `rps_mode` selects between wall-clock throughput (`total / wall_time_sec`) and
/// response-time throughput (`1000 / avg_ms`), per [`crate::spec::RpsMode`].
/// `threshold_ms`, when set, populates `threshold_exceeded`; `percentiles` are requested
/// as integers in `[0, 100]` and reported back keyed `p{N}` in request order.
#[must_use]
pub fn summarize(
    records: &[AttemptRecord],
    wall_time_sec: f64,
    rps_mode: crate::spec::RpsMode,
    threshold_ms: Option<f64>,
    percentiles: &[u8],
) -> PerfSummary {
    let total = records.len() as u32;
    let passed = records.iter().filter(|r| r.passed).count() as u32;
    let failed = total - passed;
    let total_retries: u32 = records.iter().map(|r| r.retries).sum();

    let mut times: Vec<f64> = records.iter().map(|r| r.elapsed_ms).collect();

    let min_ms = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min_ms, max_ms) = if times.is_empty() { (0.0, 0.0) } else { (min_ms, max_ms) };
    let avg_ms = if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<f64>() / times.len() as f64
    };

    let rps = match rps_mode {
        crate::spec::RpsMode::Response => {
            if avg_ms > 0.0 {
                1000.0 / avg_ms
            } else {
                0.0
            }
        }
        crate::spec::RpsMode::Wall => {
            if wall_time_sec > 0.0 {
                f64::from(total) / wall_time_sec
            } else {
                0.0
            }
        }
    };

    let avg_retries_per_request = if total > 0 {
        f64::from(total_retries) / f64::from(total)
    } else {
        0.0
    };

    let threshold_exceeded =
        threshold_ms.map(|threshold| times.iter().filter(|&&t| t > threshold).count() as u32);

    times.sort_by(|a, b| a.partial_cmp(b).expect("elapsed_ms is never NaN"));
    let percentile_values = percentiles
        .iter()
        .map(|&p| (format!("p{p}"), percentile(&times, f64::from(p))))
        .collect();

    PerfSummary {
        total,
        passed,
        failed,
        min_ms,
        max_ms,
        avg_ms,
        wall_time_sec,
        rps,
        total_retries,
        avg_retries_per_request,
        threshold_exceeded,
        percentiles: percentile_values,
    }
}

/// Linear-interpolation percentile over an already-sorted sample, matching the
/// reference "nearest-rank with interpolation" definition: for `p` in `[0, 100]`,
/// `k = (n-1) * p/100`, interpolating between the floor and ceiling ranks.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let floor = k.floor() as usize;
    let ceil = (floor + 1).min(sorted.len() - 1);
    if floor == ceil {
        return sorted[floor];
    }
    let d0 = sorted[floor] * (ceil as f64 - k);
    let d1 = sorted[ceil] * (k - floor as f64);
    d0 + d1
}

/// Write `summary` as pretty-printed JSON to `path`, creating parent directories as
/// needed. Failure is logged and swallowed — an artifact write never fails the run
/// that produced it.
pub fn write_json_artifact(summary: &PerfSummary, path: &str) {
    if let Err(err) = write_json_artifact_inner(summary, path) {
        let err = crate::Error::WriteArtifact {
            path: path.to_string(),
            message: err.to_string(),
        };
        error!(path, error = %err, "failed to write performance summary JSON");
        return;
    }
    info!(path, "wrote performance summary JSON");
}

fn write_json_artifact_inner(summary: &PerfSummary, path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
    std::fs::write(path, json)
}
