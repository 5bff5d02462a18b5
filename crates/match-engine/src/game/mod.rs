//! Game rules: the board value type and the per-match state machine.

pub mod board;
pub mod state;

pub use board::{Board, Cell, Mark, Outcome, CELL_COUNT, WINNING_LINES};
pub use state::{EndReason, Match, MatchResult, MatchSnapshot, MatchStatus};
