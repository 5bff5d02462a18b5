//! Prometheus metric definitions for the match engine.
//!
//! All metrics follow Prometheus naming conventions:
//! - `engine_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `actor_type`: 2 values (coordinator, match)
//! - `result`: 5 values (accepted, invalid, rejected, closed, corrupted)
//! - `reason`: 4 values (board, resignation, disconnect_timeout, internal_fault)
//! - `action`: 6 values (connect, join, move, resign, disconnect, reconnect)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Action latency buckets
/// target sub-millisecond in-process handling with a tail up to one second.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("engine_action_latency".to_string()),
            &[
                0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set action latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Gauges
// ============================================================================

/// Set the number of live matches (including terminal matches awaiting eviction).
///
/// Metric: `engine_matches_active`
/// Labels: none
pub fn set_matches_active(count: u64) {
    // u64 to f64 conversion is safe for realistic match counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("engine_matches_active").set(count as f64);
}

/// Set the number of players waiting in the matchmaking queue.
///
/// Metric: `engine_players_queued`
/// Labels: none
pub fn set_players_queued(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("engine_players_queued").set(count as f64);
}

/// Set the number of players with a live outbound channel.
///
/// Metric: `engine_connections_active`
/// Labels: none
pub fn set_connections_active(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("engine_connections_active").set(count as f64);
}

/// Move the queued-message total for an actor type from `from` to `to`.
///
/// Metric: `engine_actor_mailbox_depth`
/// Labels: `actor_type` (coordinator, match)
///
/// Each actor reports its own change, so the gauge is the sum over every
/// actor of the type. High values indicate actors falling behind.
pub fn adjust_actor_mailbox_depth(actor_type: &str, from: usize, to: usize) {
    let depth = gauge!("engine_actor_mailbox_depth", "actor_type" => actor_type.to_string());
    #[allow(clippy::cast_precision_loss)]
    let delta = to.abs_diff(from) as f64;
    if to >= from {
        depth.increment(delta);
    } else {
        depth.decrement(delta);
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Record a submitted move.
///
/// Metric: `engine_moves_total`
/// Labels: `result` (accepted, invalid, rejected, closed, corrupted)
pub fn record_move(result: &str) {
    counter!("engine_moves_total", "result" => result.to_string()).increment(1);
}

/// Record a terminated match.
///
/// Metric: `engine_match_outcomes_total`
/// Labels: `reason`
///
/// `internal_fault` should stay at zero; any increment indicates a bug.
pub fn record_match_outcome(reason: &str) {
    counter!("engine_match_outcomes_total", "reason" => reason.to_string()).increment(1);
}

/// Record an outbound event that could not be delivered.
///
/// Metric: `engine_messages_dropped_total`
/// Labels: none
pub fn record_message_dropped() {
    counter!("engine_messages_dropped_total").increment(1);
}

/// Record an actor panic event.
///
/// Metric: `engine_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("engine_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

// ============================================================================
// Latency Metrics (Histograms)
// ============================================================================

/// Record end-to-end handling latency of an inbound action.
///
/// Metric: `engine_action_latency_seconds`
/// Labels: `action`
pub fn record_action_latency(action: &str, duration: Duration) {
    histogram!("engine_action_latency_seconds", "action" => action.to_string())
        .record(duration.as_secs_f64());
}
