// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for redisvl.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `redisvl_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: filter, vector, range, count
//! - `operation`: create, drop, info
//! - `status`: success, error

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record a query compilation outcome
pub fn record_compile(kind: &'static str, success: bool) {
    counter!(
        "redisvl_query_compile_total",
        "kind" => kind,
        "status" => status_label(success)
    )
    .increment(1);
}

/// Record query compilation latency
pub fn record_compile_latency(kind: &'static str, duration: Duration) {
    histogram!(
        "redisvl_query_compile_seconds",
        "kind" => kind
    )
    .record(duration.as_secs_f64());
}

/// Record a search round trip
pub fn record_search(success: bool) {
    counter!(
        "redisvl_search_total",
        "status" => status_label(success)
    )
    .increment(1);
}

/// Record search latency, compile included
pub fn record_search_latency(duration: Duration) {
    histogram!("redisvl_search_seconds").record(duration.as_secs_f64());
}

/// Record index lifecycle operation (create, drop, info)
pub fn record_index_operation(operation: &'static str, success: bool) {
    counter!(
        "redisvl_index_operations_total",
        "operation" => operation,
        "status" => status_label(success)
    )
    .increment(1);
}

/// A timing guard that records compile latency on drop
pub struct CompileTimer {
    kind: &'static str,
    start: Instant,
}

impl CompileTimer {
    /// Start a new compile timer
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for CompileTimer {
    fn drop(&mut self) {
        record_compile_latency(self.kind, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(recorder: &DebuggingRecorder, name: &str) -> u64 {
        recorder
            .snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_api_does_not_panic_without_recorder() {
        record_compile("filter", true);
        record_compile_latency("vector", Duration::from_micros(20));
        record_search(false);
        record_search_latency(Duration::from_millis(3));
        record_index_operation("create", true);
        let _timer = CompileTimer::new("range");
    }

    #[test]
    fn test_counters_recorded() {
        let recorder = DebuggingRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            record_compile("filter", true);
            record_compile("filter", false);
            record_search(true);
            record_index_operation("drop", true);
        });

        assert_eq!(counter_value(&recorder, "redisvl_query_compile_total"), 2);
        assert_eq!(counter_value(&recorder, "redisvl_search_total"), 1);
        assert_eq!(counter_value(&recorder, "redisvl_index_operations_total"), 1);
    }

    #[test]
    fn test_compile_timer_records_on_drop() {
        let recorder = DebuggingRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            let _timer = CompileTimer::new("count");
        });

        let recorded = recorder
            .snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .any(|(key, _, _, value)| {
                key.key().name() == "redisvl_query_compile_seconds"
                    && matches!(value, DebugValue::Histogram(ref samples) if samples.len() == 1)
            });
        assert!(recorded);
    }
}
