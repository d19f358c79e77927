//! Engine metrics on the `metrics` facade.
//!
//! Nothing is exported unless the host process installs a recorder; without
//! one every call here is a no-op.

use std::sync::Once;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

static DESCRIBE: Once = Once::new();

/// Metrics recorder for engine operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMetrics;

impl EngineMetrics {
    /// Create a handle and register metric descriptions once per process.
    pub fn new() -> Self {
        DESCRIBE.call_once(Self::register_metrics);
        Self
    }

    fn register_metrics() {
        describe_counter!(
            "echo_synth_requests_total",
            "Total number of synthesis requests received"
        );
        describe_counter!(
            "echo_synth_completed_total",
            "Total number of synthesis requests completed successfully"
        );
        describe_counter!(
            "echo_synth_failed_total",
            "Total number of synthesis requests that failed, by error kind"
        );
        describe_counter!(
            "echo_sampler_steps_total",
            "Total number of refinement steps executed"
        );

        describe_histogram!(
            "echo_synth_latency_ms",
            "End-to-end synthesis latency in milliseconds"
        );
        describe_histogram!(
            "echo_synth_rtf",
            "Real-time factor (processing time / audio duration)"
        );

        describe_gauge!(
            "echo_synth_active",
            "Number of synthesis calls currently running"
        );
    }

    pub fn request_received(&self) {
        counter!("echo_synth_requests_total").increment(1);
        gauge!("echo_synth_active").increment(1.0);
    }

    pub fn request_completed(&self, latency_ms: f64, audio_ms: f64, steps: usize) {
        counter!("echo_synth_completed_total").increment(1);
        counter!("echo_sampler_steps_total").increment(steps as u64);
        histogram!("echo_synth_latency_ms").record(latency_ms);
        if audio_ms > 0.0 {
            histogram!("echo_synth_rtf").record(latency_ms / audio_ms);
        }
        gauge!("echo_synth_active").decrement(1.0);
    }

    pub fn request_failed(&self, kind: &'static str) {
        counter!("echo_synth_failed_total", "kind" => kind).increment(1);
        gauge!("echo_synth_active").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        let metrics = EngineMetrics::new();

        // No recorder installed: these must not panic.
        metrics.request_received();
        metrics.request_completed(120.0, 2900.0, 4);
        metrics.request_received();
        metrics.request_failed("invalid_request");
    }
}
