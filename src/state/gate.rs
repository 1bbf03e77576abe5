//! Input gate for user moves.
//!
//! A move is forwarded only when it is locally known to be playable. The gate
//! makes a yes/no decision and never touches the board; the authority's next
//! update is the only thing that changes it.

use thiserror::Error;

use super::board::{BoardState, CellIndex};
use super::session::Session;

/// Why a move was kept local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("cell index out of range")]
    OutOfRange,
    #[error("no symbol assigned yet")]
    NoSymbol,
    #[error("game is over")]
    GameOver,
    #[error("cell is taken")]
    CellTaken,
    #[error("not your turn")]
    NotYourTurn,
}

/// Decide whether a click on `index` may be sent to the authority.
pub fn admit_move(
    index: usize,
    session: &Session,
    board: &BoardState,
) -> Result<CellIndex, MoveRejection> {
    let cell = CellIndex::new(index).ok_or(MoveRejection::OutOfRange)?;

    if board.is_concluded() {
        return Err(MoveRejection::GameOver);
    }
    if !board.is_cell_empty(cell) {
        return Err(MoveRejection::CellTaken);
    }
    match session.local_symbol() {
        None => Err(MoveRejection::NoSymbol),
        Some(symbol) if symbol != board.turn => Err(MoveRejection::NotYourTurn),
        Some(_) => Ok(cell),
    }
}
