//! Chat turn metrics
//!
//! # Metrics
//!
//! - `chat_requests_total`: Counter of chat submissions by outcome
//! - `chat_steps_total`: Counter of model steps run
//! - `tool_invocations_total`: Counter of tool calls by tool and outcome
//! - `chat_persist_failures_total`: Counter of failed response persistence
//! - `chat_turn_duration_seconds`: Histogram of streamed turn duration
//! - `chat_active_turns`: Gauge of turns currently streaming
//!
//! # Examples
//!
//! ```
//! use quire::chat::metrics::TurnMetrics;
//!
//! let metrics = TurnMetrics::start();
//! metrics.record_step();
//! metrics.finish("completed");
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::time::Instant;

/// Record the outcome of a chat submission before streaming starts
pub fn record_request(outcome: &'static str) {
    increment_counter!("chat_requests_total", "outcome" => outcome);
}

/// Metrics for a single streamed turn
///
/// Created when the orchestrator starts; [`finish`](Self::finish) consumes
/// it so the turn is recorded exactly once.
#[derive(Debug)]
pub struct TurnMetrics {
    start: Instant,
    steps: usize,
}

impl TurnMetrics {
    /// Start timing a turn
    pub fn start() -> Self {
        increment_gauge!("chat_active_turns", 1.0);
        Self {
            start: Instant::now(),
            steps: 0,
        }
    }

    /// One model step ran
    pub fn record_step(&self) {
        increment_counter!("chat_steps_total");
    }

    /// A tool call finished
    pub fn record_tool(&self, tool: &str, outcome: &'static str) {
        increment_counter!(
            "tool_invocations_total",
            "tool" => tool.to_string(),
            "outcome" => outcome
        );
    }

    /// Response messages could not be saved
    pub fn record_persist_failure(&self) {
        increment_counter!("chat_persist_failures_total");
    }

    /// Count a step locally as well as in the registry
    pub fn step(&mut self) {
        self.steps += 1;
        self.record_step();
    }

    /// Steps counted so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Record the turn duration with its final status
    pub fn finish(self, status: &'static str) {
        histogram!(
            "chat_turn_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "status" => status
        );
        decrement_gauge!("chat_active_turns", 1.0);
    }
}

/// Install the Prometheus exporter
///
/// Only has an effect when built with the `prometheus` feature; the
/// exporter then serves `/metrics` on its default listener.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        if let Err(e) = PrometheusBuilder::new().install() {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_counted() {
        let mut metrics = TurnMetrics::start();
        metrics.step();
        metrics.step();
        assert_eq!(metrics.steps(), 2);
        metrics.finish("completed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("accepted");
        let metrics = TurnMetrics::start();
        metrics.record_tool("getWeather", "success");
        metrics.record_persist_failure();
        metrics.finish("error");
    }
}
