//! `Match` - authoritative state machine for one game.
//!
//! Status moves monotonically:
//!
//! ```text
//! WaitingForSecondPlayer -> InProgress -> Finished(outcome)
//!                                     \-> Abandoned(reason)
//! ```
//!
//! Nothing leaves `Finished` or `Abandoned`. All mutation happens through
//! `&mut self`, so the owning actor's mailbox is the only serialization point.

use super::board::{Board, Mark, Outcome};
use crate::errors::{EngineError, RejectReason};
use crate::outcome::MatchOutcomeRecorded;

use chrono::{DateTime, Utc};
use common::types::{MatchId, PlayerId, PlayerIdentity};
use serde::{Deserialize, Serialize};

/// Why a match reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Decided on the board (line or full board).
    Board,
    /// A player resigned.
    Resignation,
    /// A player stayed disconnected past the grace window.
    DisconnectTimeout,
    /// Board invariants were violated; no winner is declared.
    InternalFault,
}

impl EndReason {
    /// Label used in logs and metric values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EndReason::Board => "board",
            EndReason::Resignation => "resignation",
            EndReason::DisconnectTimeout => "disconnect_timeout",
            EndReason::InternalFault => "internal_fault",
        }
    }
}

/// Match lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum MatchStatus {
    WaitingForSecondPlayer,
    InProgress,
    Finished(Outcome),
    Abandoned(EndReason),
}

impl MatchStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finished(_) | MatchStatus::Abandoned(_))
    }
}

/// Terminal result as seen by players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner_id: Option<PlayerId>,
    pub winner_mark: Option<Mark>,
    pub loser_id: Option<PlayerId>,
    pub draw: bool,
    pub reason: EndReason,
}

/// Point-in-time view of a match, broadcast as a state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub board: Board,
    /// Mark to move next; `None` unless the match is in progress.
    pub turn: Option<Mark>,
    pub status: MatchStatus,
    pub move_count: usize,
}

/// One game between two identified players.
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    x: PlayerIdentity,
    o: PlayerIdentity,
    board: Board,
    turn: Mark,
    status: MatchStatus,
    /// Accepted moves so far.
    moves: usize,
    created_at: DateTime<Utc>,
    outcome_reported: bool,
}

impl Match {
    /// Create a match awaiting its start. `x` moves first.
    #[must_use]
    pub fn new(id: MatchId, x: PlayerIdentity, o: PlayerIdentity) -> Self {
        Self {
            id,
            x,
            o,
            board: Board::new(),
            turn: Mark::X,
            status: MatchStatus::WaitingForSecondPlayer,
            moves: 0,
            created_at: Utc::now(),
            outcome_reported: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> MatchId {
        self.id
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn turn(&self) -> Mark {
        self.turn
    }

    #[must_use]
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn move_count(&self) -> usize {
        self.moves
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Identity seated at `mark`.
    #[must_use]
    pub fn player(&self, mark: Mark) -> &PlayerIdentity {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }

    /// Mark assigned to `player_id`, or `None` for a non-participant.
    #[must_use]
    pub fn mark_of(&self, player_id: &PlayerId) -> Option<Mark> {
        if &self.x.id == player_id {
            Some(Mark::X)
        } else if &self.o.id == player_id {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Both participants' ids, X first.
    #[must_use]
    pub fn participants(&self) -> [&PlayerId; 2] {
        [&self.x.id, &self.o.id]
    }

    /// Begin play with X to move.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownOrClosedMatch` if the match is terminal and
    /// `EngineError::Internal` if it was already started.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.status {
            MatchStatus::WaitingForSecondPlayer => {
                self.status = MatchStatus::InProgress;
                self.turn = Mark::X;
                Ok(())
            }
            MatchStatus::InProgress => Err(EngineError::Internal(format!(
                "match {} already started",
                self.id
            ))),
            MatchStatus::Finished(_) | MatchStatus::Abandoned(_) => {
                Err(EngineError::UnknownOrClosedMatch)
            }
        }
    }

    /// Validate and apply a move for `player_id`.
    ///
    /// On success the turn flips and, if the board reached an outcome, the
    /// match becomes `Finished`. On any error the match is left untouched.
    ///
    /// # Errors
    ///
    /// - `UnknownOrClosedMatch` if the match is already terminal
    /// - `RejectedMove` for a non-participant, an out-of-turn move, or a
    ///   match that has not started
    /// - `InvalidMove` for an out-of-range or occupied cell
    /// - `BoardCorrupted` if the resulting board fails verification
    pub fn submit_move(
        &mut self,
        player_id: &PlayerId,
        cell_index: usize,
    ) -> Result<Option<Outcome>, EngineError> {
        if self.is_terminal() {
            return Err(EngineError::UnknownOrClosedMatch);
        }
        let mark = self
            .mark_of(player_id)
            .ok_or(RejectReason::NotAParticipant)?;
        if self.status != MatchStatus::InProgress {
            return Err(RejectReason::MatchNotInProgress.into());
        }
        if mark != self.turn {
            return Err(RejectReason::NotYourTurn.into());
        }

        let (next, outcome) = self.board.apply_move(cell_index, mark)?;
        self.check_invariants(&next, self.moves + 1)?;

        self.board = next;
        self.moves += 1;
        self.turn = mark.opponent();
        if let Some(outcome) = outcome {
            self.status = MatchStatus::Finished(outcome);
        }

        Ok(outcome)
    }

    /// `player_id` concedes; the opponent wins.
    ///
    /// # Errors
    ///
    /// Same participant and status checks as [`Match::submit_move`].
    pub fn resign(&mut self, player_id: &PlayerId) -> Result<MatchResult, EngineError> {
        self.abandon_by(player_id, EndReason::Resignation)
    }

    /// `absent_id` failed to reconnect in time; the opponent wins by forfeit.
    ///
    /// # Errors
    ///
    /// Same participant and status checks as [`Match::submit_move`].
    pub fn forfeit(&mut self, absent_id: &PlayerId) -> Result<MatchResult, EngineError> {
        self.abandon_by(absent_id, EndReason::DisconnectTimeout)
    }

    /// Force the match to `Abandoned(InternalFault)`.
    ///
    /// Returns `None` when the match was already terminal.
    pub fn abandon_fault(&mut self) -> Option<MatchResult> {
        if self.is_terminal() {
            return None;
        }
        self.status = MatchStatus::Abandoned(EndReason::InternalFault);
        self.result()
    }

    /// Terminal result, or `None` while the match is still live.
    #[must_use]
    pub fn result(&self) -> Option<MatchResult> {
        match self.status {
            MatchStatus::WaitingForSecondPlayer | MatchStatus::InProgress => None,
            MatchStatus::Finished(Outcome::WinFor(mark)) => {
                Some(self.win_for(mark, EndReason::Board))
            }
            MatchStatus::Finished(Outcome::Draw) => Some(MatchResult {
                winner_id: None,
                winner_mark: None,
                loser_id: None,
                draw: true,
                reason: EndReason::Board,
            }),
            MatchStatus::Abandoned(EndReason::InternalFault) => Some(MatchResult {
                winner_id: None,
                winner_mark: None,
                loser_id: None,
                draw: false,
                reason: EndReason::InternalFault,
            }),
            // `abandon_by` leaves the winner in `turn`.
            MatchStatus::Abandoned(reason) => Some(self.win_for(self.turn, reason)),
        }
    }

    /// Build the outcome event, at most once per match.
    ///
    /// Returns `None` while the match is live or once the event was taken.
    pub fn take_outcome_report(&mut self) -> Option<MatchOutcomeRecorded> {
        if self.outcome_reported {
            return None;
        }
        let result = self.result()?;
        self.outcome_reported = true;
        Some(MatchOutcomeRecorded::from_result(
            self.id,
            result,
            self.moves,
            Utc::now(),
        ))
    }

    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id,
            board: self.board,
            turn: (self.status == MatchStatus::InProgress).then_some(self.turn),
            status: self.status,
            move_count: self.moves,
        }
    }

    fn abandon_by(
        &mut self,
        loser_id: &PlayerId,
        reason: EndReason,
    ) -> Result<MatchResult, EngineError> {
        if self.is_terminal() {
            return Err(EngineError::UnknownOrClosedMatch);
        }
        let loser = self
            .mark_of(loser_id)
            .ok_or(RejectReason::NotAParticipant)?;
        if self.status != MatchStatus::InProgress {
            return Err(RejectReason::MatchNotInProgress.into());
        }

        // `turn` is frozen once terminal; reuse it to remember the winner.
        self.turn = loser.opponent();
        self.status = MatchStatus::Abandoned(reason);
        Ok(self.win_for(self.turn, reason))
    }

    fn win_for(&self, mark: Mark, reason: EndReason) -> MatchResult {
        MatchResult {
            winner_id: Some(self.player(mark).id.clone()),
            winner_mark: Some(mark),
            loser_id: Some(self.player(mark.opponent()).id.clone()),
            draw: false,
            reason,
        }
    }

    fn check_invariants(&self, board: &Board, moves: usize) -> Result<(), EngineError> {
        board.verify().map_err(EngineError::BoardCorrupted)?;
        if board.filled() != moves {
            return Err(EngineError::BoardCorrupted(format!(
                "{} filled cells but {moves} recorded moves",
                board.filled()
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn overwrite_board(&mut self, board: Board) {
        self.board = board;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::errors::MoveError;
    use crate::game::board::Cell;

    fn started() -> Match {
        let mut m = Match::new(
            MatchId::new(),
            PlayerIdentity::new("alice", "Alice"),
            PlayerIdentity::new("bob", "Bob"),
        );
        m.start().unwrap();
        m
    }

    fn alice() -> PlayerId {
        PlayerId::new("alice")
    }

    fn bob() -> PlayerId {
        PlayerId::new("bob")
    }

    fn play(m: &mut Match, cells: &[usize]) -> Option<Outcome> {
        let mut last = None;
        for (i, &cell) in cells.iter().enumerate() {
            let who = if i % 2 == 0 { alice() } else { bob() };
            last = m.submit_move(&who, cell).unwrap();
        }
        last
    }

    #[test]
    fn test_new_match_waits_then_starts_with_x() {
        let mut m = Match::new(
            MatchId::new(),
            PlayerIdentity::new("alice", "Alice"),
            PlayerIdentity::new("bob", "Bob"),
        );
        assert_eq!(m.status(), MatchStatus::WaitingForSecondPlayer);
        assert!(matches!(
            m.submit_move(&alice(), 0),
            Err(EngineError::RejectedMove(RejectReason::MatchNotInProgress))
        ));

        m.start().unwrap();
        assert_eq!(m.status(), MatchStatus::InProgress);
        assert_eq!(m.turn(), Mark::X);
        assert!(m.start().is_err());
    }

    #[test]
    fn test_diagonal_win_finishes_match() {
        let mut m = started();
        let outcome = play(&mut m, &[0, 1, 4, 2, 8]);

        assert_eq!(outcome, Some(Outcome::WinFor(Mark::X)));
        assert_eq!(m.status(), MatchStatus::Finished(Outcome::WinFor(Mark::X)));
        let result = m.result().unwrap();
        assert_eq!(result.winner_id, Some(alice()));
        assert_eq!(result.loser_id, Some(bob()));
        assert_eq!(result.reason, EndReason::Board);
        assert_eq!(m.snapshot().turn, None);
    }

    #[test]
    fn test_full_board_draw() {
        let mut m = started();
        let outcome = play(&mut m, &[0, 1, 2, 4, 6, 8, 3, 5, 7]);

        assert_eq!(outcome, Some(Outcome::Draw));
        let result = m.result().unwrap();
        assert!(result.draw);
        assert_eq!(result.winner_id, None);
        assert_eq!(m.move_count(), 9);
    }

    #[test]
    fn test_turn_alternates_strictly() {
        let mut m = started();
        m.submit_move(&alice(), 4).unwrap();
        assert_eq!(m.turn(), Mark::O);

        assert!(matches!(
            m.submit_move(&alice(), 0),
            Err(EngineError::RejectedMove(RejectReason::NotYourTurn))
        ));
        assert_eq!(m.turn(), Mark::O);
        assert_eq!(m.move_count(), 1);

        m.submit_move(&bob(), 0).unwrap();
        assert_eq!(m.turn(), Mark::X);
    }

    #[test]
    fn test_out_of_range_cell_leaves_state_unchanged() {
        let mut m = started();
        let before = m.snapshot();

        let err = m.submit_move(&alice(), 9).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidMove(MoveError::OutOfRange(9))
        ));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_non_participant_rejected() {
        let mut m = started();
        assert!(matches!(
            m.submit_move(&PlayerId::new("mallory"), 0),
            Err(EngineError::RejectedMove(RejectReason::NotAParticipant))
        ));
        assert!(matches!(
            m.resign(&PlayerId::new("mallory")),
            Err(EngineError::RejectedMove(RejectReason::NotAParticipant))
        ));
    }

    #[test]
    fn test_actions_on_terminal_match_are_closed() {
        let mut m = started();
        play(&mut m, &[0, 1, 4, 2, 8]);
        let before = m.snapshot();

        assert!(matches!(
            m.submit_move(&bob(), 5),
            Err(EngineError::UnknownOrClosedMatch)
        ));
        assert!(matches!(
            m.resign(&bob()),
            Err(EngineError::UnknownOrClosedMatch)
        ));
        assert!(m.abandon_fault().is_none());
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_resign_awards_opponent() {
        let mut m = started();
        m.submit_move(&alice(), 4).unwrap();

        let result = m.resign(&alice()).unwrap();
        assert_eq!(result.winner_id, Some(bob()));
        assert_eq!(result.winner_mark, Some(Mark::O));
        assert_eq!(result.loser_id, Some(alice()));
        assert_eq!(result.reason, EndReason::Resignation);
        assert_eq!(m.status(), MatchStatus::Abandoned(EndReason::Resignation));
        assert_eq!(m.result(), Some(result));
    }

    #[test]
    fn test_forfeit_awards_present_player() {
        let mut m = started();
        let result = m.forfeit(&bob()).unwrap();
        assert_eq!(result.winner_id, Some(alice()));
        assert_eq!(result.reason, EndReason::DisconnectTimeout);
    }

    #[test]
    fn test_outcome_report_taken_once() {
        let mut m = started();
        assert!(m.take_outcome_report().is_none());

        play(&mut m, &[0, 1, 4, 2, 8]);
        let report = m.take_outcome_report().unwrap();
        assert_eq!(report.match_id, m.id());
        assert_eq!(report.moves, 5);
        assert_eq!(report.winner_mark, Some(Mark::X));
        assert!(m.take_outcome_report().is_none());
    }

    #[test]
    fn test_corrupted_board_detected_without_mutation() {
        let mut m = started();
        // Two X marks on an otherwise empty board with no recorded moves.
        let mut cells = [Cell::Empty; 9];
        cells[0] = Cell::X;
        cells[1] = Cell::X;
        m.overwrite_board(Board::from_cells(cells));

        let err = m.submit_move(&alice(), 4).unwrap_err();
        assert!(matches!(err, EngineError::BoardCorrupted(_)));
        assert_eq!(m.move_count(), 0);

        let result = m.abandon_fault().unwrap();
        assert_eq!(result.reason, EndReason::InternalFault);
        assert_eq!(result.winner_id, None);
        assert!(!result.draw);
    }

    #[test]
    fn test_move_count_mismatch_is_corruption() {
        let mut m = started();
        let mut cells = [Cell::Empty; 9];
        cells[8] = Cell::X;
        cells[7] = Cell::O;
        m.overwrite_board(Board::from_cells(cells));

        assert!(matches!(
            m.submit_move(&alice(), 0),
            Err(EngineError::BoardCorrupted(_))
        ));
    }
}
