//! Wire contract with the game authority.
//!
//! Events travel as a name plus a JSON payload ([`WireEvent`]). Inbound events
//! are decoded into the closed [`Inbound`] union at the transport boundary, so
//! nothing past this module sees an untyped payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state::board::{BoardState, CellIndex, Cells, Outcome, Symbol};
use crate::state::directory::RoomId;
use crate::state::roster::Player;

/// Outbound event names.
pub const GET_ROOMS: &str = "get_rooms";
pub const JOIN_GAME: &str = "join_game";
pub const MOVE: &str = "move";
pub const RESTART: &str = "restart";

/// Inbound event names.
pub const INIT: &str = "init";
pub const BOARD_UPDATE: &str = "board_update";
pub const PLAYERS: &str = "players";
pub const START_GAME: &str = "start_game";
pub const ROOMS_LIST: &str = "rooms_list";
pub const ERROR: &str = "error";

/// A named event with its raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl WireEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("malformed `{event}` payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// `init` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitPayload {
    pub symbol: Symbol,
    pub board: Cells,
}

/// `board_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardUpdate {
    pub board: Cells,
    pub turn: Symbol,
    pub winner: Option<Outcome>,
    #[serde(default)]
    pub seq: Option<u64>,
}

impl BoardUpdate {
    pub fn to_board(&self) -> BoardState {
        BoardState {
            cells: self.board,
            turn: self.turn,
            winner: self.winner,
        }
    }
}

/// `players` payload: a bare list, or a numbered one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum PlayersPayload {
    Numbered { seq: u64, players: Vec<Player> },
    Bare(Vec<Player>),
}

/// `start_game` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartGame {
    pub start: bool,
    pub players: Vec<Player>,
}

/// `error` payload: a bare message or `{ "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Text(String),
    Object { message: String },
}

/// Every event the authority can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Our join was accepted.
    Init { symbol: Symbol, board: Cells },

    /// New board snapshot.
    BoardUpdated(BoardUpdate),

    /// New roster.
    Players {
        players: Vec<Player>,
        seq: Option<u64>,
    },

    /// Start (or halt) signal with the confirmed roster.
    StartGame(StartGame),

    /// Joinable rooms.
    RoomsList(Vec<RoomId>),

    /// Authority-side failure, e.g. room full.
    Error(String),
}

impl Inbound {
    /// Decode a wire event into its typed form.
    pub fn decode(event: WireEvent) -> Result<Self, ProtocolError> {
        let WireEvent { name, data } = event;
        let malformed = |source| ProtocolError::Malformed {
            event: name.clone(),
            source,
        };

        let inbound = match name.as_str() {
            INIT => {
                let payload: InitPayload = serde_json::from_value(data).map_err(malformed)?;
                Self::Init {
                    symbol: payload.symbol,
                    board: payload.board,
                }
            }
            BOARD_UPDATE => Self::BoardUpdated(serde_json::from_value(data).map_err(malformed)?),
            PLAYERS => match serde_json::from_value(data).map_err(malformed)? {
                PlayersPayload::Numbered { seq, players } => Self::Players {
                    players,
                    seq: Some(seq),
                },
                PlayersPayload::Bare(players) => Self::Players { players, seq: None },
            },
            START_GAME => Self::StartGame(serde_json::from_value(data).map_err(malformed)?),
            ROOMS_LIST => Self::RoomsList(serde_json::from_value(data).map_err(malformed)?),
            ERROR => match serde_json::from_value(data).map_err(malformed)? {
                ErrorPayload::Text(message) | ErrorPayload::Object { message } => {
                    Self::Error(message)
                }
            },
            _ => return Err(ProtocolError::UnknownEvent(name.clone())),
        };
        Ok(inbound)
    }

    /// Event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => INIT,
            Self::BoardUpdated(_) => BOARD_UPDATE,
            Self::Players { .. } => PLAYERS,
            Self::StartGame(_) => START_GAME,
            Self::RoomsList(_) => ROOMS_LIST,
            Self::Error(_) => ERROR,
        }
    }
}

/// `join_game` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinGame {
    pub username: String,
    #[serde(rename = "roomId")]
    pub room_id: RoomId,
}

/// Every intent the client can send. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    GetRooms,
    JoinGame(JoinGame),
    Move(CellIndex),
    Restart,
}

impl Outbound {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetRooms => GET_ROOMS,
            Self::JoinGame(_) => JOIN_GAME,
            Self::Move(_) => MOVE,
            Self::Restart => RESTART,
        }
    }

    /// Encode for the transport.
    pub fn encode(&self) -> WireEvent {
        let data = match self {
            Self::GetRooms | Self::Restart => Value::Null,
            Self::JoinGame(join) => serde_json::json!(join),
            Self::Move(cell) => serde_json::json!(cell),
        };
        WireEvent::new(self.name(), data)
    }
}
