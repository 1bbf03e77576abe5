//! Tic-Tac-Toe Session Library
//!
//! This crate provides the client-side session layer for networked two-player
//! tic-tac-toe.
//!
//! # Overview
//!
//! - **Session State Machine** - Tracks the local client's phase in a room
//!   (not joined, awaiting opponent, ready, in progress, concluded) and the
//!   symbol the authority assigned.
//!
//! - **Board Model and Input Gate** - Holds the authoritative board and
//!   discards moves that are locally known to be invalid.
//!
//! - **Room Directory** - Joinable rooms, refreshed on demand.
//!
//! - **Event Dispatcher** - Routes user intents to the transport and inbound
//!   events to the state, publishing each committed state to observers.
//!
//! - **Transport Channel** - A FIFO, non-blocking seam to the game authority.
//!
//! # Design Principles
//!
//! 1. **The authority decides** - The client never computes wins or advances
//!    turns; every board and roster update is applied wholesale.
//!
//! 2. **Typed at the boundary** - Inbound payloads are decoded into a closed
//!    enum before they reach any state.
//!
//! 3. **Pure transitions** - `ClientState::apply` maps (state, event) to the
//!    next state; rendering only observes.
//!
//! 4. **Owned transport** - The dispatcher owns its transport and closes it
//!    when dropped.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tictactoe_session::{channel, Dispatcher, Phase, Symbol, TransportEvent, WireEvent};
//!
//! let (transport, _inbound, mut remote) = channel();
//! let mut dispatcher = Dispatcher::new(transport);
//!
//! // Ask to join a room
//! dispatcher.join("alice", "r1").unwrap();
//! let sent = remote.try_next().unwrap();
//! assert_eq!(sent.data, json!({"username": "alice", "roomId": "r1"}));
//!
//! // The authority acknowledges
//! let init = WireEvent::new("init", json!({"symbol": "X", "board": [null, null, null, null, null, null, null, null, null]}));
//! dispatcher.handle(TransportEvent::Message(init)).unwrap();
//!
//! assert_eq!(dispatcher.state().session.phase(), Phase::AwaitingOpponent);
//! assert_eq!(dispatcher.state().session.local_symbol(), Some(Symbol::X));
//! ```

pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-export everything from state module at crate root
pub use state::*;

pub use config::{ClientConfig, ConfigError};
pub use dispatcher::{Dispatch, DispatchError, Dispatcher, Rejection};
pub use protocol::{Inbound, Outbound, ProtocolError, WireEvent};
pub use transport::{channel, ChannelTransport, RemoteEnd, Transport, TransportError, TransportEvent};
