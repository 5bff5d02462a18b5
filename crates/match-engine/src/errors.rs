//! Match engine error types.
//!
//! Error types map to stable numeric codes for client responses.
//! Internal details are logged server-side but not exposed to clients.

use thiserror::Error;

/// Board-level move violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Cell index outside 0..=8.
    #[error("cell index {0} is out of range")]
    OutOfRange(usize),

    /// Cell already holds a mark.
    #[error("cell {0} is already occupied")]
    Occupied(usize),

    /// The board already has a terminal outcome.
    #[error("the game is already over")]
    GameOver,
}

/// Turn or participant violation detected by the match state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The submitting player is a participant but it is the opponent's turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The submitting player does not belong to this match.
    #[error("not a participant in this match")]
    NotAParticipant,

    /// The match has not started yet.
    #[error("match is not in progress")]
    MatchNotInProgress,
}

/// Match engine error type.
///
/// Maps to client-facing codes:
/// - `InvalidMove`: 1
/// - `RejectedMove`: 2
/// - `AlreadyQueuedOrPlaying`: 3
/// - `UnknownOrClosedMatch`: 4
/// - `RecipientUnreachable`: 5
/// - `Draining`: 7
/// - `BoardCorrupted`, `Internal`: 6
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Position or terminal-state violation on the board.
    #[error("Invalid move: {0}")]
    InvalidMove(MoveError),

    /// Out of turn or non-participant submission.
    #[error("Rejected move: {0}")]
    RejectedMove(RejectReason),

    /// Join from a player already waiting or already in a live match.
    #[error("Player is already queued or playing")]
    AlreadyQueuedOrPlaying,

    /// Action referencing a missing, finished or abandoned match.
    #[error("Unknown or closed match")]
    UnknownOrClosedMatch,

    /// No live outbound channel for the recipient.
    #[error("Recipient unreachable: {0}")]
    RecipientUnreachable(String),

    /// Board invariant violated (internal fault, not player-caused).
    #[error("Board corrupted: {0}")]
    BoardCorrupted(String),

    /// Engine is shutting down and no longer accepts joins.
    #[error("Engine is draining")]
    Draining,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns the numeric error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            EngineError::InvalidMove(_) => 1,
            EngineError::RejectedMove(_) => 2,
            EngineError::AlreadyQueuedOrPlaying => 3,
            EngineError::UnknownOrClosedMatch => 4,
            EngineError::RecipientUnreachable(_) => 5,
            EngineError::BoardCorrupted(_) | EngineError::Internal(_) => 6,
            EngineError::Draining => 7,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            EngineError::InvalidMove(e) => e.to_string(),
            EngineError::RejectedMove(r) => r.to_string(),
            EngineError::AlreadyQueuedOrPlaying => "Already queued or playing".to_string(),
            EngineError::UnknownOrClosedMatch => "Match not found or already closed".to_string(),
            EngineError::RecipientUnreachable(_) => "Player is not connected".to_string(),
            EngineError::BoardCorrupted(_) | EngineError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            EngineError::Draining => "Server is shutting down, please reconnect".to_string(),
        }
    }

    /// Whether the error was caused by the submitting player rather than the engine.
    #[must_use]
    pub fn is_player_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidMove(_)
                | EngineError::RejectedMove(_)
                | EngineError::AlreadyQueuedOrPlaying
                | EngineError::UnknownOrClosedMatch
        )
    }
}

impl From<MoveError> for EngineError {
    fn from(err: MoveError) -> Self {
        EngineError::InvalidMove(err)
    }
}

impl From<RejectReason> for EngineError {
    fn from(reason: RejectReason) -> Self {
        EngineError::RejectedMove(reason)
    }
}
