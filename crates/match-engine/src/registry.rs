//! Connection Registry - player id to live outbound channel.
//!
//! The only structure shared across match actors. Each operation takes the
//! map lock once, so register/deregister/send on the same player never
//! interleave; different players never wait on each other beyond that
//! short critical section.
//!
//! Sends are best-effort: the sender is cloned under the read lock and
//! `try_send` runs after the lock is released, so a slow client can never
//! stall the calling actor.

use crate::actors::messages::{OutboundEvent, OutboundSender};
use crate::errors::EngineError;
use crate::observability::metrics;

use common::types::PlayerId;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug)]
struct Entry {
    sender: Option<OutboundSender>,
    live: bool,
    /// Bumped on every register so a stale channel can be told apart.
    generation: u64,
}

/// Map of players to their current outbound channel.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<PlayerId, Entry>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the outbound channel for `player_id`.
    ///
    /// Any previous channel is superseded; events already queued on it are
    /// not retried. Returns the new channel generation.
    pub async fn register(&self, player_id: &PlayerId, channel: OutboundSender) -> u64 {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(player_id.clone()).or_insert(Entry {
            sender: None,
            live: false,
            generation: 0,
        });
        let replaced = entry.sender.is_some();
        entry.sender = Some(channel);
        entry.live = true;
        entry.generation += 1;
        let generation = entry.generation;
        publish_live_count(&entries);

        debug!(
            target: "engine.registry",
            player_id = %player_id,
            generation = generation,
            replaced = replaced,
            "Channel registered"
        );
        generation
    }

    /// Mark `player_id` offline and drop its channel. The entry is kept so
    /// a later reconnect continues the generation sequence.
    pub async fn deregister(&self, player_id: &PlayerId) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(player_id) {
            entry.sender = None;
            entry.live = false;
            publish_live_count(&entries);
            debug!(
                target: "engine.registry",
                player_id = %player_id,
                "Channel deregistered"
            );
        }
    }

    /// Forget `player_id` entirely (disconnected with no match interest).
    pub async fn remove(&self, player_id: &PlayerId) {
        let mut entries = self.entries.write().await;
        if entries.remove(player_id).is_some() {
            publish_live_count(&entries);
        }
    }

    /// Best-effort delivery of `event` to `player_id`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RecipientUnreachable` if the player has no live
    /// channel, the channel is full, or the receiving side has gone away.
    /// The caller should log and carry on.
    pub async fn send(&self, player_id: &PlayerId, event: OutboundEvent) -> Result<(), EngineError> {
        let target = {
            let entries = self.entries.read().await;
            entries
                .get(player_id)
                .filter(|entry| entry.live)
                .and_then(|entry| entry.sender.clone().map(|s| (s, entry.generation)))
        };

        let Some((sender, generation)) = target else {
            metrics::record_message_dropped();
            return Err(EngineError::RecipientUnreachable(player_id.to_string()));
        };

        match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                metrics::record_message_dropped();
                warn!(
                    target: "engine.registry",
                    player_id = %player_id,
                    "Outbound channel full, event dropped"
                );
                Err(EngineError::RecipientUnreachable(player_id.to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                metrics::record_message_dropped();
                self.mark_closed(player_id, generation).await;
                Err(EngineError::RecipientUnreachable(player_id.to_string()))
            }
        }
    }

    /// Whether `player_id` currently has a live channel.
    pub async fn is_live(&self, player_id: &PlayerId) -> bool {
        self.entries
            .read()
            .await
            .get(player_id)
            .is_some_and(|entry| entry.live)
    }

    /// Number of players with a live channel.
    pub async fn live_count(&self) -> usize {
        count_live(&*self.entries.read().await)
    }

    /// The receiver was dropped without a disconnect. Only flip liveness if
    /// the entry still holds the channel we tried, not a newer one.
    async fn mark_closed(&self, player_id: &PlayerId, generation: u64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(player_id) {
            if entry.generation == generation && entry.live {
                entry.sender = None;
                entry.live = false;
                publish_live_count(&entries);
                debug!(
                    target: "engine.registry",
                    player_id = %player_id,
                    generation = generation,
                    "Outbound channel closed by receiver"
                );
            }
        }
    }
}

fn count_live(entries: &HashMap<PlayerId, Entry>) -> usize {
    entries.values().filter(|entry| entry.live).count()
}

fn publish_live_count(entries: &HashMap<PlayerId, Entry>) {
    metrics::set_connections_active(count_live(entries) as u64);
}
