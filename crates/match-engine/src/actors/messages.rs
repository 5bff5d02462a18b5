//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply uses `tokio::sync::oneshot`.
//!
//! Player-facing types live here too: [`InboundAction`] (what a transport
//! submits), [`ActionOutcome`] (the reply), and [`OutboundEvent`] (what a
//! player's channel receives).

use crate::errors::EngineError;
use crate::game::{Board, Mark, MatchResult, MatchSnapshot, MatchStatus, Outcome};

use common::types::{MatchId, PlayerId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Sending half of a player's outbound channel.
pub type OutboundSender = mpsc::Sender<OutboundEvent>;

/// Reply channel for a submitted action.
pub type ActionReply = oneshot::Sender<Result<ActionOutcome, EngineError>>;

// ----------------------------------------------------------------------------
// Player-facing surface
// ----------------------------------------------------------------------------

/// Action submitted by a transport on behalf of an authenticated player.
#[derive(Debug)]
pub enum InboundAction {
    /// Open a connection. Acts as `Reconnect` if the player has a match.
    Connect {
        display_name: String,
        channel: OutboundSender,
    },
    /// Ask for an opponent.
    Join,
    /// Place the player's mark at `cell_index` (0-8, row-major).
    Move { cell_index: usize },
    /// Concede the current match.
    Resign,
    /// The player's connection dropped.
    Disconnect,
    /// Replace the player's channel after a drop.
    Reconnect { channel: OutboundSender },
}

impl InboundAction {
    /// Label used for metrics and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            InboundAction::Connect { .. } => "connect",
            InboundAction::Join => "join",
            InboundAction::Move { .. } => "move",
            InboundAction::Resign => "resign",
            InboundAction::Disconnect => "disconnect",
            InboundAction::Reconnect { .. } => "reconnect",
        }
    }
}

/// Successful reply to an [`InboundAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Connected,
    /// Queued; a `Paired` event follows when an opponent arrives.
    Waiting,
    Paired { match_id: MatchId },
    MoveAccepted { outcome: Option<Outcome> },
    Resigned,
    Disconnected,
    Reconnected { match_id: MatchId },
}

/// Event delivered to one player's outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// A match was created for this player.
    Paired {
        match_id: MatchId,
        opponent_id: PlayerId,
        opponent_name: String,
        assigned_mark: Mark,
    },
    /// Authoritative state after a change.
    StateUpdate {
        match_id: MatchId,
        board: Board,
        turn: Option<Mark>,
        status: MatchStatus,
        move_count: usize,
    },
    /// The player's own action was refused; the opponent is not told.
    Rejected {
        match_id: MatchId,
        code: i32,
        reason: String,
    },
    /// The match reached a terminal state.
    MatchEnded {
        match_id: MatchId,
        result: MatchResult,
    },
}

impl From<MatchSnapshot> for OutboundEvent {
    fn from(snapshot: MatchSnapshot) -> Self {
        OutboundEvent::StateUpdate {
            match_id: snapshot.match_id,
            board: snapshot.board,
            turn: snapshot.turn,
            status: snapshot.status,
            move_count: snapshot.move_count,
        }
    }
}

// ----------------------------------------------------------------------------
// Actor messages
// ----------------------------------------------------------------------------

/// Messages sent to `MatchCoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A player action from the transport.
    Submit {
        player_id: PlayerId,
        action: InboundAction,
        respond_to: ActionReply,
    },

    /// A match reached a terminal state; its players may queue again.
    MatchFinished { match_id: MatchId },

    /// A terminal match released both seats and waited out its eviction
    /// grace; the actor is exiting.
    MatchEvicted { match_id: MatchId },

    /// Look up the state of a match.
    GetMatchState {
        match_id: MatchId,
        respond_to: oneshot::Sender<Result<MatchState, EngineError>>,
    },

    /// Get current status (for health checks and tests).
    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    /// Stop accepting joins and shut down all match actors.
    Shutdown {
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Messages sent to `MatchActor`.
#[derive(Debug)]
pub enum MatchMessage {
    /// Play a move.
    Move {
        player_id: PlayerId,
        cell_index: usize,
        respond_to: ActionReply,
    },

    /// Concede.
    Resign {
        player_id: PlayerId,
        respond_to: ActionReply,
    },

    /// The player's connection dropped.
    Disconnect {
        player_id: PlayerId,
        respond_to: ActionReply,
    },

    /// The player has a fresh channel in the registry.
    Reconnect {
        player_id: PlayerId,
        respond_to: ActionReply,
    },

    /// The player has moved on to a new match; this seat no longer holds
    /// the match open.
    Release { player_id: PlayerId },

    /// Injected by the grace timer. Ignored if `epoch` is stale.
    GraceExpired { player_id: PlayerId, epoch: u64 },

    /// Injected by the eviction timer. Ignored if `epoch` is stale.
    EvictionDue { epoch: u64 },

    /// Read-only view of the match.
    GetState {
        respond_to: oneshot::Sender<MatchState>,
    },
}

impl MatchMessage {
    /// Answer a message that never reached the match actor.
    pub(crate) fn fail(self, error: EngineError) {
        match self {
            MatchMessage::Move { respond_to, .. }
            | MatchMessage::Resign { respond_to, .. }
            | MatchMessage::Disconnect { respond_to, .. }
            | MatchMessage::Reconnect { respond_to, .. } => {
                let _ = respond_to.send(Err(error));
            }
            // Dropping the reply sender surfaces as a receive error.
            MatchMessage::Release { .. }
            | MatchMessage::GraceExpired { .. }
            | MatchMessage::EvictionDue { .. }
            | MatchMessage::GetState { .. } => {}
        }
    }
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Coordinator status (for health checks and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    /// Match actors running, live or lingering.
    pub match_count: usize,
    /// Players waiting for an opponent.
    pub queued_players: usize,
    /// Players with a live outbound channel.
    pub connected_players: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}

/// Seat as seen from outside the match actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatInfo {
    pub player_id: PlayerId,
    pub mark: Mark,
    pub connected: bool,
}

/// Match state snapshot (for debugging and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub snapshot: MatchSnapshot,
    pub seats: Vec<SeatInfo>,
    pub result: Option<MatchResult>,
    pub mailbox_depth: usize,
}
