//! Board value type: 3x3 grid, move application, win/draw evaluation.
//!
//! Cells are addressed 0-8 in row-major order. The board is a pure value:
//! `apply_move` returns a new board and never mutates the receiver, so a
//! rejected move leaves the caller's state untouched.

use crate::errors::MoveError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// Winning line indices on the 3x3 board.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8], // rows
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8], // columns
    [0, 4, 8],
    [2, 4, 6], // diagonals
];

/// One of the two symbols a player places on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// Moves first.
    X,
    /// Moves second.
    O,
}

impl Mark {
    /// The other mark.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// Label used in logs and metric values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Empty,
    X,
    O,
}

impl Cell {
    /// The mark occupying this cell, if any.
    #[must_use]
    pub const fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }

    const fn to_char(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::X => 'X',
            Cell::O => 'O',
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

/// Terminal result of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mark", rename_all = "snake_case")]
pub enum Outcome {
    /// Three in a row for the given mark.
    WinFor(Mark),
    /// All nine cells filled without a line.
    Draw,
}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Cells in row-major order (0-8).
    cells: [Cell; CELL_COUNT],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Create an empty board.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
        }
    }

    /// Build a board from raw cells (replay and diagnostics).
    ///
    /// No invariant is checked here; call [`Board::verify`] before trusting it.
    #[must_use]
    pub const fn from_cells(cells: [Cell; CELL_COUNT]) -> Self {
        Self { cells }
    }

    /// Cells in row-major order.
    #[must_use]
    pub const fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// Cell at `index`, or `None` when out of range.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// Whether every cell holds a mark.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| !c.is_empty())
    }

    /// Place `mark` at `cell_index`.
    ///
    /// Returns the updated board together with the freshly computed outcome.
    ///
    /// # Errors
    ///
    /// - `MoveError::OutOfRange` if `cell_index > 8`
    /// - `MoveError::GameOver` if this board already has an outcome
    /// - `MoveError::Occupied` if the cell already holds a mark
    pub fn apply_move(
        &self,
        cell_index: usize,
        mark: Mark,
    ) -> Result<(Board, Option<Outcome>), MoveError> {
        let current = self
            .cell(cell_index)
            .ok_or(MoveError::OutOfRange(cell_index))?;

        if self.evaluate().is_some() {
            return Err(MoveError::GameOver);
        }

        if !current.is_empty() {
            return Err(MoveError::Occupied(cell_index));
        }

        let mut next = *self;
        if let Some(slot) = next.cells.get_mut(cell_index) {
            *slot = Cell::from(mark);
        }
        let outcome = next.evaluate();

        Ok((next, outcome))
    }

    /// Scan the eight winning lines.
    ///
    /// Returns the first winning mark found in line order, else `Draw` when
    /// all nine cells are filled, else `None`.
    #[must_use]
    pub fn evaluate(&self) -> Option<Outcome> {
        for line in WINNING_LINES {
            if let Some(mark) = self.line_owner(line) {
                return Some(Outcome::WinFor(mark));
            }
        }

        if self.is_full() {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    /// Check the structural invariants of a board reached by alternating
    /// moves with X first.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn verify(&self) -> Result<(), String> {
        let x = self.count(Mark::X);
        let o = self.count(Mark::O);

        if x != o && x != o + 1 {
            return Err(format!("mark counts out of balance: {x} X, {o} O"));
        }

        let x_wins = self.has_line(Mark::X);
        let o_wins = self.has_line(Mark::O);

        if x_wins && o_wins {
            return Err("both marks hold a winning line".to_string());
        }
        if x_wins && x != o + 1 {
            return Err(format!("X wins but X did not move last ({x} X, {o} O)"));
        }
        if o_wins && x != o {
            return Err(format!("O wins but O did not move last ({x} X, {o} O)"));
        }

        Ok(())
    }

    /// Which mark should move next on a board played X-first.
    #[must_use]
    pub fn next_mark(&self) -> Mark {
        if self.count(Mark::X) > self.count(Mark::O) {
            Mark::O
        } else {
            Mark::X
        }
    }

    fn count(&self, mark: Mark) -> usize {
        let target = Cell::from(mark);
        self.cells.iter().filter(|&&c| c == target).count()
    }

    fn has_line(&self, mark: Mark) -> bool {
        WINNING_LINES
            .iter()
            .any(|&line| self.line_owner(line) == Some(mark))
    }

    fn line_owner(&self, [a, b, c]: [usize; 3]) -> Option<Mark> {
        let first = self.cell(a)?.mark()?;
        let owned = self.cell(b)?.mark() == Some(first) && self.cell(c)?.mark() == Some(first);
        owned.then_some(first)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.cells.chunks(3).enumerate() {
            if row > 0 {
                f.write_str("/")?;
            }
            for cell in chunk {
                write!(f, "{}", cell.to_char())?;
            }
        }
        Ok(())
    }
}
