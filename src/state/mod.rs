//! Client-side state for a tic-tac-toe room session.
//!
//! This module provides the state types and the pure reducer that applies
//! authoritative events to them:
//!
//! - `session` - Phase machine, local symbol, last error
//! - `roster` - Players in the room (at most two)
//! - `board` - Authoritative board snapshot
//! - `gate` - Local admissibility check for moves
//! - `directory` - Joinable rooms
//! - `connection` - Transport status and sequence guards
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           ClientState                            │
//! │                                                                  │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐         │
//! │  │    Session    │  │    Roster     │  │  BoardState   │         │
//! │  │               │  │               │  │               │         │
//! │  │ phase         │  │ [Player; ≤2]  │  │ cells[9]      │         │
//! │  │ local_symbol  │  │               │  │ turn          │         │
//! │  │ room_id       │  │               │  │ winner        │         │
//! │  │ error_message │  │               │  │               │         │
//! │  └───────────────┘  └───────────────┘  └───────────────┘         │
//! │                                                                  │
//! │  ┌───────────────┐  ┌───────────────┐                            │
//! │  │ RoomDirectory │  │  Connection   │   board_visible            │
//! │  └───────────────┘  └───────────────┘                            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ClientState::apply`] takes the current state and one inbound event and
//! returns the next state, or an error with the current state untouched.
//! Observers only ever see whole states.

pub mod board;
pub mod connection;
pub mod directory;
pub mod gate;
pub mod roster;
pub mod session;

use thiserror::Error;
use tracing::warn;

use crate::protocol::Inbound;

// Re-export commonly used types
pub use board::{BoardState, CellIndex, Outcome, Symbol, BOARD_CELLS};
pub use connection::{Connection, ConnectionStatus, UpdateStream};
pub use directory::{RoomDirectory, RoomId};
pub use gate::{admit_move, MoveRejection};
pub use roster::{Player, Roster, RosterError, MAX_PLAYERS};
pub use session::{InvalidTransition, Phase, PhaseEvent, Session};

/// Why an inbound event was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("stale {stream:?} update (seq {seq})")]
    Stale { stream: UpdateStream, seq: u64 },
}

/// Everything the client knows about its room session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    pub session: Session,
    pub roster: Roster,
    pub board: BoardState,
    pub directory: RoomDirectory,
    pub connection: Connection,

    /// Set by the start signal; the board is rendered only while true
    pub board_visible: bool,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound event, returning the next state.
    pub fn apply(&self, event: Inbound) -> Result<Self, ApplyError> {
        let mut next = self.clone();
        next.apply_in_place(event)?;
        next.connection.record_received();
        Ok(next)
    }

    fn apply_in_place(&mut self, event: Inbound) -> Result<(), ApplyError> {
        match event {
            Inbound::Init { symbol, board } => {
                self.session.initialize(symbol, self.roster.len())?;
                self.board = BoardState::with_cells(board);
                self.connection.reset_sequences();
            }
            Inbound::BoardUpdated(update) => {
                self.accept_seq(UpdateStream::Board, update.seq)?;
                let next = update.to_board();
                if !next.is_reset() {
                    let regressed = self.board.regressed_cells(&next);
                    if !regressed.is_empty() {
                        warn!(?regressed, "board update empties filled cells");
                    }
                }
                self.session.apply_mut(PhaseEvent::BoardChanged {
                    concluded: next.is_concluded(),
                    reset: next.is_reset(),
                    players: self.roster.len(),
                })?;
                self.board = next;
            }
            Inbound::Players { players, seq } => {
                let roster = Roster::from_players(players)?;
                self.accept_seq(UpdateStream::Roster, seq)?;
                self.session.apply_mut(PhaseEvent::RosterChanged {
                    players: roster.len(),
                })?;
                self.roster = roster;
            }
            Inbound::StartGame(start) => {
                let roster = Roster::from_players(start.players)?;
                self.session.apply_mut(PhaseEvent::GameStarted {
                    started: start.start,
                    players: roster.len(),
                })?;
                self.roster = roster;
                self.board_visible = start.start;
            }
            Inbound::RoomsList(rooms) => self.directory.replace(rooms),
            Inbound::Error(message) => self.session.set_error(message),
        }
        Ok(())
    }

    fn accept_seq(&mut self, stream: UpdateStream, seq: Option<u64>) -> Result<(), ApplyError> {
        match seq {
            Some(seq) if !self.connection.accept(stream, Some(seq)) => {
                Err(ApplyError::Stale { stream, seq })
            }
            _ => Ok(()),
        }
    }

    /// State after the transport came up.
    pub fn connected(&self) -> Self {
        let mut next = self.clone();
        next.connection.connect();
        next
    }

    /// State after the transport went away: nothing of the room survives.
    pub fn disconnected(&self, reason: Option<String>) -> Self {
        let mut next = self.clone();
        next.session.reset();
        next.roster = Roster::new();
        next.board = BoardState::new();
        next.directory.clear();
        next.board_visible = false;
        next.connection.disconnect(reason);
        next
    }

    /// Whether the authority is waiting on our move.
    pub fn is_local_turn(&self) -> bool {
        self.session.is_playing() && self.session.local_symbol() == Some(self.board.turn)
    }

    /// One-line status for the renderer.
    pub fn status_line(&self) -> String {
        match self.session.phase() {
            Phase::NotJoined => "Not joined".to_string(),
            Phase::AwaitingOpponent => "Waiting for another player...".to_string(),
            Phase::Ready => "Waiting for the game to start...".to_string(),
            Phase::InProgress if self.is_local_turn() => "Your turn".to_string(),
            Phase::InProgress => "Waiting...".to_string(),
            Phase::Concluded => match self.board.winner {
                Some(outcome) => outcome.to_string(),
                None => "Game over".to_string(),
            },
        }
    }

    /// Convert to JSON snapshot for the rendering layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.session.phase().as_str(),
            "username": self.session.username(),
            "room_id": self.session.room_id(),
            "symbol": self.session.local_symbol(),
            "error": self.session.error_message(),
            "players": self.roster,
            "board": self.board.to_json(),
            "board_visible": self.board_visible,
            "status": self.status_line(),
            "rooms": self.directory.to_json(),
            "connection": self.connection.to_json()
        })
    }
}
