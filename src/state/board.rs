//! Board model.
//!
//! The 3x3 grid as last reported by the game authority, plus whose turn it is
//! and the terminal outcome. The client never computes any of this itself:
//! every authoritative update replaces the whole [`BoardState`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// Cells per row.
pub const BOARD_SIDE: usize = 3;

/// A player's mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }

    /// The other player's mark.
    pub fn opponent(&self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a game, encoded on the wire as `"X"`, `"O"` or `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
            Self::Draw => "draw",
        }
    }

    /// Winning symbol, `None` for a draw.
    pub fn winner(&self) -> Option<Symbol> {
        match self {
            Self::X => Some(Symbol::X),
            Self::O => Some(Symbol::O),
            Self::Draw => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.winner() {
            Some(symbol) => write!(f, "{} wins!", symbol),
            None => write!(f, "Draw!"),
        }
    }
}

/// Index of a board cell, guaranteed to be in `0..9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CellIndex(u8);

impl CellIndex {
    /// Validate a raw index. Returns `None` when out of range.
    pub fn new(index: usize) -> Option<Self> {
        if index < BOARD_CELLS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Raw index.
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Row and column of this cell.
    pub fn row_col(self) -> (usize, usize) {
        (self.get() / BOARD_SIDE, self.get() % BOARD_SIDE)
    }

    /// All nine cells in order.
    pub fn all() -> impl Iterator<Item = CellIndex> {
        (0..BOARD_CELLS as u8).map(CellIndex)
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cell contents; `None` is an empty cell (`null` on the wire).
pub type Cell = Option<Symbol>;

/// Grid contents in row-major order.
pub type Cells = [Cell; BOARD_CELLS];

/// Authoritative board snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub cells: Cells,
    pub turn: Symbol,
    pub winner: Option<Outcome>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            cells: [None; BOARD_CELLS],
            turn: Symbol::X,
            winner: None,
        }
    }
}

impl BoardState {
    /// Empty board, X to move.
    pub fn new() -> Self {
        Self::default()
    }

    /// Board with the given cells and the default turn.
    ///
    /// Used for the snapshot that arrives with session initialization, which
    /// carries cells only.
    pub fn with_cells(cells: Cells) -> Self {
        Self {
            cells,
            ..Self::default()
        }
    }

    pub fn cell(&self, index: CellIndex) -> Cell {
        self.cells[index.get()]
    }

    pub fn is_cell_empty(&self, index: CellIndex) -> bool {
        self.cell(index).is_none()
    }

    /// Whether the game has a terminal outcome.
    pub fn is_concluded(&self) -> bool {
        self.winner.is_some()
    }

    /// A reset board: every cell empty and no outcome.
    pub fn is_reset(&self) -> bool {
        self.winner.is_none() && self.cells.iter().all(Option::is_none)
    }

    /// Count of non-empty cells.
    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Cells filled here that `next` reports empty again.
    ///
    /// Within one game instance cells only ever fill, so anything returned
    /// here for a non-reset `next` means the updates arrived out of order.
    pub fn regressed_cells(&self, next: &BoardState) -> Vec<CellIndex> {
        CellIndex::all()
            .filter(|&i| self.cell(i).is_some() && next.cell(i).is_none())
            .collect()
    }

    /// Rows for rendering, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(BOARD_SIDE)
    }

    /// Convert to JSON for the rendering layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "cells": self.cells,
            "turn": self.turn,
            "winner": self.winner,
            "filled": self.filled_count()
        })
    }
}
