//! Observability for the match engine.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields
//! (`match_id`, `player_id`); display names never appear in spans or labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `engine_matches_active` | Gauge | none | Live matches |
//! | `engine_players_queued` | Gauge | none | Players waiting for an opponent |
//! | `engine_connections_active` | Gauge | none | Players with a live channel |
//! | `engine_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `engine_moves_total` | Counter | `result` | Move submissions by result |
//! | `engine_match_outcomes_total` | Counter | `reason` | Terminated matches |
//! | `engine_messages_dropped_total` | Counter | none | Undeliverable outbound events |
//! | `engine_actor_panics_total` | Counter | `actor_type` | Actor panics |
//! | `engine_action_latency_seconds` | Histogram | `action` | Inbound action handling time |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
