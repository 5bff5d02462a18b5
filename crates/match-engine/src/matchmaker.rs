//! Matchmaker - FIFO pairing of waiting players into new matches.
//!
//! Owned by the coordinator actor, so every call is already serialized; the
//! type itself holds no locks.

use crate::errors::EngineError;
use crate::game::Match;
use crate::observability::metrics;

use chrono::{DateTime, Utc};
use common::types::{MatchId, PlayerId, PlayerIdentity};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// A player waiting for an opponent.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player: PlayerIdentity,
    pub enqueued_at: DateTime<Utc>,
}

/// Result of a match request.
#[derive(Debug)]
pub enum Pairing {
    /// No eligible peer; the requester is now queued.
    Waiting,
    /// Paired with the longest-waiting player. The new match has the waiting
    /// player as X and the requester as O, and has not been started.
    Paired(Box<Match>),
}

/// Waiting queue plus the set of players seated in live matches.
#[derive(Debug, Default)]
pub struct Matchmaker {
    queue: VecDeque<QueueEntry>,
    playing: HashSet<PlayerId>,
}

impl Matchmaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `player` with the longest-waiting peer, or queue them.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyQueuedOrPlaying` if the player is already
    /// waiting or seated in a live match.
    pub fn request_match(&mut self, player: PlayerIdentity) -> Result<Pairing, EngineError> {
        if self.is_waiting(&player.id) || self.playing.contains(&player.id) {
            return Err(EngineError::AlreadyQueuedOrPlaying);
        }

        // The queue never holds the requester (checked above), so the front
        // entry is always a distinct player.
        let Some(waiting) = self.queue.pop_front() else {
            debug!(
                target: "engine.matchmaker",
                player_id = %player.id,
                "No waiting peer, queueing player"
            );
            self.queue.push_back(QueueEntry {
                player,
                enqueued_at: Utc::now(),
            });
            metrics::set_players_queued(self.queue.len());
            return Ok(Pairing::Waiting);
        };

        let new_match = Match::new(MatchId::new(), waiting.player, player);
        for id in new_match.participants() {
            self.playing.insert(id.clone());
        }
        metrics::set_players_queued(self.queue.len());

        debug!(
            target: "engine.matchmaker",
            match_id = %new_match.id(),
            waited_ms = (Utc::now() - waiting.enqueued_at).num_milliseconds(),
            "Paired players"
        );

        Ok(Pairing::Paired(Box::new(new_match)))
    }

    /// Remove `player_id` from the queue. Returns whether it was queued.
    pub fn cancel(&mut self, player_id: &PlayerId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|entry| &entry.player.id != player_id);
        let removed = self.queue.len() != before;
        if removed {
            metrics::set_players_queued(self.queue.len());
            debug!(
                target: "engine.matchmaker",
                player_id = %player_id,
                "Cancelled queued match request"
            );
        }
        removed
    }

    /// Mark `player_id` as no longer seated in a live match.
    pub fn release(&mut self, player_id: &PlayerId) {
        self.playing.remove(player_id);
    }

    #[must_use]
    pub fn is_waiting(&self, player_id: &PlayerId) -> bool {
        self.queue.iter().any(|entry| &entry.player.id == player_id)
    }

    #[must_use]
    pub fn is_playing(&self, player_id: &PlayerId) -> bool {
        self.playing.contains(player_id)
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
