//! Room roster.
//!
//! The roster is supplied wholesale by the game authority on every change.
//! The client never adds or removes players itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::Symbol;

/// Maximum players per room.
pub const MAX_PLAYERS: usize = 2;

/// A player seated in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub symbol: Symbol,
}

impl Player {
    pub fn new(username: impl Into<String>, symbol: Symbol) -> Self {
        Self {
            username: username.into(),
            symbol,
        }
    }
}

/// Roster errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster has {0} players, at most {MAX_PLAYERS} allowed")]
    TooManyPlayers(usize),
}

/// Ordered list of players in the room, never more than [`MAX_PLAYERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from an authoritative player list.
    pub fn from_players(players: Vec<Player>) -> Result<Self, RosterError> {
        if players.len() > MAX_PLAYERS {
            return Err(RosterError::TooManyPlayers(players.len()));
        }
        Ok(Self { players })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Both seats taken.
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Player holding the given symbol.
    pub fn by_symbol(&self, symbol: Symbol) -> Option<&Player> {
        self.players.iter().find(|p| p.symbol == symbol)
    }

    /// Display form, e.g. `alice (X) & bob (O)`.
    pub fn describe(&self) -> String {
        self.players
            .iter()
            .map(|p| format!("{} ({})", p.username, p.symbol))
            .collect::<Vec<_>>()
            .join(" & ")
    }
}
