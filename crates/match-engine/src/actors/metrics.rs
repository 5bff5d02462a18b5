//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth thresholds:
//!
//! | Actor Type  | Normal | Warning | Critical |
//! |-------------|--------|---------|----------|
//! | Coordinator | < 100  | 100-500 | > 500    |
//! | Match       | < 8    | 8-32    | > 32     |
//!
//! A match only ever has two players feeding it, so anything beyond a
//! handful of queued messages means the actor is stuck.

use crate::observability::metrics;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const COORDINATOR_MAILBOX_NORMAL: usize = 100;
pub const COORDINATOR_MAILBOX_WARNING: usize = 500;

pub const MATCH_MAILBOX_NORMAL: usize = 8;
pub const MATCH_MAILBOX_WARNING: usize = 32;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `MatchCoordinatorActor` (singleton).
    Coordinator,
    /// `MatchActor` (one per live match).
    Match,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Coordinator => "coordinator",
            ActorType::Match => "match",
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_WARNING,
            ActorType::Match => MATCH_MAILBOX_WARNING,
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_NORMAL,
            ActorType::Match => MATCH_MAILBOX_NORMAL,
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks one actor's mailbox depth and throughput.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// `match_id` or the engine id for the coordinator.
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record the mailbox depth seen when a message is taken off the queue
    /// (the message itself included).
    pub fn observe_depth(&self, depth: usize) {
        let previous = self.depth.swap(depth, Ordering::Relaxed);
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
        metrics::adjust_actor_mailbox_depth(self.actor_type.as_str(), previous, depth);

        match self.level_for_depth(depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "engine.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = depth,
                    threshold = self.actor_type.warning_threshold(),
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if depth == self.actor_type.normal_threshold() + 1 => {
                debug!(
                    target: "engine.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message fully handled.
    pub fn record_processed(&self) {
        if let Ok(previous) = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1))
        {
            metrics::adjust_actor_mailbox_depth(self.actor_type.as_str(), previous, previous - 1);
        }
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message that could not be delivered to this actor.
    pub fn record_drop(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_message_dropped();
        warn!(
            target: "engine.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            dropped = self.messages_dropped.load(Ordering::Relaxed),
            "Message dropped due to backpressure"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

impl Drop for MailboxMonitor {
    /// Take whatever this actor still had queued out of the shared gauge.
    fn drop(&mut self) {
        let depth = *self.depth.get_mut();
        if depth > 0 {
            metrics::adjust_actor_mailbox_depth(self.actor_type.as_str(), depth, 0);
        }
    }
}

/// Counters shared by the coordinator and every match actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Match actors currently running (live or awaiting eviction).
    pub active_matches: AtomicUsize,
    /// Players with a live outbound channel.
    pub connected_players: AtomicUsize,
    /// Total actor panics (indicates bugs).
    pub actor_panics: AtomicU64,
    /// Total messages processed across all actors.
    pub total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn match_created(&self) {
        let count = self.active_matches.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_matches_active(count as u64);
    }

    pub fn match_removed(&self) {
        let previous = self
            .active_matches
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(1))
            })
            .unwrap_or(0);
        metrics::set_matches_active(previous.saturating_sub(1) as u64);
    }

    /// Refresh the live-connection count after a connect or disconnect.
    pub fn set_connected_players(&self, count: usize) {
        self.connected_players.store(count, Ordering::Relaxed);
    }

    /// Record an actor panic.
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        metrics::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "engine.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn match_count(&self) -> usize {
        self.active_matches.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connected_players.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_labels_and_thresholds() {
        assert_eq!(ActorType::Coordinator.as_str(), "coordinator");
        assert_eq!(ActorType::Match.as_str(), "match");
        assert_eq!(ActorType::Coordinator.normal_threshold(), 100);
        assert_eq!(ActorType::Coordinator.warning_threshold(), 500);
        assert_eq!(ActorType::Match.normal_threshold(), 8);
        assert_eq!(ActorType::Match.warning_threshold(), 32);
    }

    #[test]
    fn test_mailbox_monitor_depth_and_peak() {
        let monitor = MailboxMonitor::new(ActorType::Match, "match-1");
        assert_eq!(monitor.current_depth(), 0);

        monitor.observe_depth(3);
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_processed();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.messages_processed(), 1);

        monitor.observe_depth(1);
        assert_eq!(monitor.peak_depth(), 3);
    }

    #[test]
    fn test_processed_never_underflows() {
        let monitor = MailboxMonitor::new(ActorType::Coordinator, "engine-1");
        monitor.record_processed();
        assert_eq!(monitor.current_depth(), 0);
    }

    #[test]
    fn test_mailbox_levels() {
        let monitor = MailboxMonitor::new(ActorType::Match, "match-2");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        monitor.observe_depth(12);
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        monitor.observe_depth(40);
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);

        let coordinator = MailboxMonitor::new(ActorType::Coordinator, "engine-1");
        coordinator.observe_depth(40);
        assert_eq!(coordinator.current_level(), MailboxLevel::Normal);
    }

    #[test]
    fn test_mailbox_monitor_drop() {
        let monitor = MailboxMonitor::new(ActorType::Match, "match-3");
        monitor.record_drop();
        monitor.record_drop();
        assert_eq!(monitor.messages_dropped(), 2);
    }

    #[test]
    fn test_actor_metrics_match_count() {
        let metrics = ActorMetrics::new();
        metrics.match_created();
        metrics.match_created();
        assert_eq!(metrics.match_count(), 2);

        metrics.match_removed();
        metrics.match_removed();
        metrics.match_removed();
        assert_eq!(metrics.match_count(), 0);
    }

    #[test]
    fn test_actor_metrics_panics() {
        let metrics = ActorMetrics::new();
        metrics.record_panic(ActorType::Match);
        metrics.record_panic(ActorType::Coordinator);
        assert_eq!(metrics.panic_count(), 2);
    }

    #[test]
    fn test_actor_metrics_connected_players() {
        let metrics = ActorMetrics::new();
        assert_eq!(metrics.connected_count(), 0);
        metrics.set_connected_players(3);
        assert_eq!(metrics.connected_count(), 3);
        metrics.set_connected_players(1);
        assert_eq!(metrics.connected_count(), 1);
    }
}
