//! # Metrics
//!
//! Optional OpenTelemetry instruments for the RPC client and the task pool.
//!
//! With the `metrics` feature enabled, the host process passes a [`Meter`] to
//! [`install_metrics`] once at startup; recording functions are no-ops until
//! then. Without the feature every recording function compiles to nothing and
//! the crate does not depend on `opentelemetry` at all.
//!
//! | Instrument | Kind | Meaning |
//! |---|---|---|
//! | `rpc_calls` | counter | Unary and stream calls issued |
//! | `rpc_call_errors` | counter | Failed calls, labelled by `kind` |
//! | `rpc_call_duration` | histogram (ms) | End-to-end unary call latency |
//! | `rpc_streams_opened` | counter | Streams opened |
//! | `rpc_dials` | counter | Dial attempts |
//! | `task_jobs_dispatched` | counter | Jobs handed to a worker |
//! | `task_jobs_inflight` | up/down counter | Jobs accepted but not finished |

#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "metrics")]
static CALLS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAMS_OPENED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DIALS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_DISPATCHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();

/// Register every instrument on `meter`. Later calls are ignored.
#[cfg(feature = "metrics")]
pub fn install_metrics(meter: &Meter) {
    let _ = CALLS.set(
        meter
            .u64_counter("rpc_calls")
            .with_description("Unary and stream calls issued")
            .build(),
    );

    let _ = CALL_ERRORS.set(
        meter
            .u64_counter("rpc_call_errors")
            .with_description("Failed calls by error kind")
            .build(),
    );

    let _ = CALL_DURATION_MS.set(
        meter
            .f64_histogram("rpc_call_duration")
            .with_unit("ms")
            .with_description("End-to-end unary call duration")
            .build(),
    );

    let _ = STREAMS_OPENED.set(
        meter
            .u64_counter("rpc_streams_opened")
            .with_description("Bidirectional streams opened")
            .build(),
    );

    let _ = DIALS.set(
        meter
            .u64_counter("rpc_dials")
            .with_description("Node dial attempts")
            .build(),
    );

    let _ = JOBS_DISPATCHED.set(
        meter
            .u64_counter("task_jobs_dispatched")
            .with_description("Jobs handed to a pool worker")
            .build(),
    );

    let _ = JOBS_INFLIGHT.set(
        meter
            .i64_up_down_counter("task_jobs_inflight")
            .with_description("Jobs accepted but not yet finished")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_calls() {
    if let Some(counter) = CALLS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_calls() {}

#[cfg(feature = "metrics")]
pub fn increment_call_errors(kind: &'static str) {
    if let Some(counter) = CALL_ERRORS.get() {
        counter.add(1, &[KeyValue::new("kind", kind)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_call_errors(_kind: &'static str) {}

#[cfg(feature = "metrics")]
pub fn record_call_duration(duration_ms: f64) {
    if let Some(histogram) = CALL_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_call_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_streams_opened() {
    if let Some(counter) = STREAMS_OPENED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_streams_opened() {}

#[cfg(feature = "metrics")]
pub fn increment_dials() {
    if let Some(counter) = DIALS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_dials() {}

#[cfg(feature = "metrics")]
pub fn increment_jobs_dispatched() {
    if let Some(counter) = JOBS_DISPATCHED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_dispatched() {}

#[cfg(feature = "metrics")]
pub fn add_jobs_inflight(delta: i64) {
    if let Some(counter) = JOBS_INFLIGHT.get() {
        counter.add(delta, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn add_jobs_inflight(_delta: i64) {}
