//! Session state machine.
//!
//! Tracks the local client's participation in a room and validates phase
//! transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌───────────┐  init   ┌──────────────────┐  roster = 2  ┌─────────┐
//! │ NotJoined │────────▶│ AwaitingOpponent │─────────────▶│  Ready  │
//! └───────────┘         └──────────────────┘◀─────────────└────┬────┘
//!       ▲                        ▲           roster < 2        │ start_game
//!       │                        │ roster < 2                  ▼
//!       │                        │                     ┌────────────┐
//!       │ disconnect             ├─────────────────────│ InProgress │◀─┐
//!       │ (from any)             │                     └─────┬──────┘  │
//!       │                        │                           │ winner  │ reset board
//!       │                        │                           ▼         │ (roster = 2)
//!       │                        │                     ┌────────────┐  │
//!       │                        └─────────────────────│ Concluded  │──┘
//!       │                                              └────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::board::Symbol;
use super::directory::RoomId;
use super::roster::MAX_PLAYERS;

/// Where the local client is in the room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No room joined (also the state after any disconnect)
    #[default]
    NotJoined,

    /// Joined, waiting for a second player
    AwaitingOpponent,

    /// Two players seated, waiting for the start signal
    Ready,

    /// Game running
    InProgress,

    /// Game over, restart possible
    Concluded,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotJoined => "not_joined",
            Self::AwaitingOpponent => "awaiting_opponent",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Concluded => "concluded",
        }
    }

    /// In a room, in any phase.
    pub fn is_joined(&self) -> bool {
        !matches!(self, Self::NotJoined)
    }

    /// Phase a joined client sits in while no game is running.
    fn from_roster(players: usize) -> Self {
        if players >= MAX_PLAYERS {
            Self::Ready
        } else {
            Self::AwaitingOpponent
        }
    }

    /// Phase after a board reset or an un-concluded update.
    fn playing_or_waiting(players: usize) -> Self {
        if players >= MAX_PLAYERS {
            Self::InProgress
        } else {
            Self::AwaitingOpponent
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotJoined => "NotJoined",
            Self::AwaitingOpponent => "AwaitingOpponent",
            Self::Ready => "Ready",
            Self::InProgress => "InProgress",
            Self::Concluded => "Concluded",
        };
        f.write_str(name)
    }
}

/// Inputs to the phase machine, reduced from inbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The authority acknowledged our join.
    Initialized { players: usize },

    /// A new roster arrived.
    RosterChanged { players: usize },

    /// The authority's start signal.
    GameStarted { started: bool, players: usize },

    /// A new board arrived.
    BoardChanged {
        concluded: bool,
        reset: bool,
        players: usize,
    },

    /// The transport went away.
    Disconnected,
}

/// Error when a phase transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
    pub reason: &'static str,
}

/// Local participation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Name typed by the user
    local_username: String,

    /// Room we joined or are joining
    room_id: Option<RoomId>,

    /// Bound once per session, on init
    local_symbol: Option<Symbol>,

    phase: Phase,

    /// Last error reported by the authority
    error_message: Option<String>,

    error_at: Option<DateTime<Utc>>,

    joined_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh, not-joined session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn username(&self) -> &str {
        &self.local_username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.local_username = username.into();
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Record the room a join was requested for.
    pub fn set_room(&mut self, room_id: RoomId) {
        self.room_id = Some(room_id);
    }

    pub fn local_symbol(&self) -> Option<Symbol> {
        self.local_symbol
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_at(&self) -> Option<DateTime<Utc>> {
        self.error_at
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    /// Surface an authority error. Phase is untouched.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.error_at = Some(Utc::now());
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
        self.error_at = None;
    }

    /// Handle the join acknowledgement: the only place the symbol is bound.
    pub fn initialize(&mut self, symbol: Symbol, players: usize) -> Result<(), InvalidTransition> {
        self.apply_mut(PhaseEvent::Initialized { players })?;
        self.local_symbol = Some(symbol);
        self.joined_at = Some(Utc::now());
        Ok(())
    }

    /// Drop everything tied to the connection. The typed username survives.
    pub fn reset(&mut self) {
        *self = Self {
            local_username: std::mem::take(&mut self.local_username),
            ..Self::default()
        };
    }

    /// Apply an event, returning the new phase or an error.
    pub fn apply(&self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        self.transition(event)
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: PhaseEvent) -> Result<(), InvalidTransition> {
        self.phase = self.transition(event)?;
        Ok(())
    }

    /// Calculate the new phase for an event.
    fn transition(&self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        use Phase::*;
        use PhaseEvent::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.phase,
            event,
            reason,
        };

        match (self.phase, event) {
            (_, Disconnected) => Ok(NotJoined),

            // A roster delivered before init already counts.
            (NotJoined, Initialized { players }) => Ok(Phase::from_roster(players)),
            (_, Initialized { .. }) => Err(invalid("Already joined")),

            // Data may arrive before init; it is stored but moves nothing.
            (NotJoined, RosterChanged { .. }) => Ok(NotJoined),
            (NotJoined, BoardChanged { .. }) => Ok(NotJoined),
            (NotJoined, GameStarted { .. }) => Err(invalid("Not joined")),

            (AwaitingOpponent | Ready, RosterChanged { players }) => Ok(Phase::from_roster(players)),
            (InProgress | Concluded, RosterChanged { players }) if players < MAX_PLAYERS => {
                Ok(AwaitingOpponent)
            }
            (phase, RosterChanged { .. }) => Ok(phase),

            (_, GameStarted { started: true, .. }) => Ok(InProgress),
            (_, GameStarted { started: false, players }) => Ok(Phase::from_roster(players)),

            (InProgress, BoardChanged { concluded: true, .. }) => Ok(Concluded),
            // Only a restart reopens a finished game.
            (Concluded, BoardChanged { reset: true, players, .. }) => {
                Ok(Phase::playing_or_waiting(players))
            }
            (phase, BoardChanged { .. }) => Ok(phase),
        }
    }

    // Convenience methods for common checks

    pub fn is_joined(&self) -> bool {
        self.phase.is_joined()
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::InProgress
    }

    pub fn is_concluded(&self) -> bool {
        self.phase == Phase::Concluded
    }
}
