//! A test player connected to the coordinator.
//!
//! Owns the receiving half of the player's outbound channel, so tests can
//! assert exactly which events the engine pushed to this player.

use common::types::{MatchId, PlayerId};
use match_engine::actors::{ActionOutcome, InboundAction, MatchCoordinatorHandle, OutboundEvent};
use match_engine::errors::EngineError;
use match_engine::game::Mark;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outbound channel capacity used by test clients.
pub const TEST_CHANNEL_CAPACITY: usize = 64;

/// How long `next_event` waits before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    pub player_id: PlayerId,
    pub display_name: String,
    coordinator: MatchCoordinatorHandle,
    events: mpsc::Receiver<OutboundEvent>,
}

impl TestClient {
    /// Connect `id` to the coordinator with a fresh outbound channel.
    ///
    /// # Panics
    ///
    /// Panics if the coordinator refuses the connection.
    pub async fn connect(coordinator: &MatchCoordinatorHandle, id: &str) -> Self {
        let player_id = PlayerId::new(id);
        let display_name = format!("Player {id}");
        let (tx, rx) = mpsc::channel(TEST_CHANNEL_CAPACITY);

        coordinator
            .submit(
                player_id.clone(),
                InboundAction::Connect {
                    display_name: display_name.clone(),
                    channel: tx,
                },
            )
            .await
            .expect("connect failed");

        Self {
            player_id,
            display_name,
            coordinator: coordinator.clone(),
            events: rx,
        }
    }

    pub async fn submit(&self, action: InboundAction) -> Result<ActionOutcome, EngineError> {
        self.coordinator.submit(self.player_id.clone(), action).await
    }

    pub async fn join(&self) -> Result<ActionOutcome, EngineError> {
        self.submit(InboundAction::Join).await
    }

    pub async fn play(&self, cell_index: usize) -> Result<ActionOutcome, EngineError> {
        self.submit(InboundAction::Move { cell_index }).await
    }

    pub async fn resign(&self) -> Result<ActionOutcome, EngineError> {
        self.submit(InboundAction::Resign).await
    }

    pub async fn disconnect(&self) -> Result<ActionOutcome, EngineError> {
        self.submit(InboundAction::Disconnect).await
    }

    /// Reconnect with a new outbound channel; the old one is discarded.
    pub async fn reconnect(&mut self) -> Result<ActionOutcome, EngineError> {
        let (tx, rx) = mpsc::channel(TEST_CHANNEL_CAPACITY);
        self.events = rx;
        self.submit(InboundAction::Reconnect { channel: tx }).await
    }

    /// Next event pushed to this player, or `None` if none arrives in time.
    pub async fn next_event(&mut self) -> Option<OutboundEvent> {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Everything already queued for this player, without waiting.
    pub fn drain(&mut self) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Skip ahead to the next `StateUpdate`.
    pub async fn next_state(&mut self) -> Option<OutboundEvent> {
        while let Some(event) = self.next_event().await {
            if matches!(event, OutboundEvent::StateUpdate { .. }) {
                return Some(event);
            }
        }
        None
    }

    /// Wait for the `Paired` event and return the match and assigned mark.
    ///
    /// # Panics
    ///
    /// Panics if the next event is not `Paired`.
    pub async fn expect_paired(&mut self) -> (MatchId, Mark) {
        match self.next_event().await {
            Some(OutboundEvent::Paired {
                match_id,
                assigned_mark,
                ..
            }) => (match_id, assigned_mark),
            other => panic!("expected Paired for {}, got {other:?}", self.player_id),
        }
    }

    /// Skip ahead to `MatchEnded`.
    pub async fn expect_match_ended(&mut self) -> OutboundEvent {
        while let Some(event) = self.next_event().await {
            if matches!(event, OutboundEvent::MatchEnded { .. }) {
                return event;
            }
        }
        panic!("expected MatchEnded for {}", self.player_id);
    }
}
