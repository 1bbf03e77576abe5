//! Event dispatcher.
//!
//! The [`Dispatcher`] owns the transport and the [`ClientState`]. It routes
//! user intents out through the input checks to the transport, and routes
//! inbound transport events through [`ClientState::apply`]. Each committed
//! state is published on a watch channel for the rendering layer.
//!
//! Intents are fire-and-forget: nothing waits for a reply, and repeated
//! intents are not deduplicated here.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::protocol::{Inbound, JoinGame, Outbound, ProtocolError};
use crate::state::{admit_move, ApplyError, ClientState, MoveRejection, RoomId};
use crate::transport::{Transport, TransportError, TransportEvent};

/// Why an intent was kept local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("username is blank")]
    BlankUsername,

    #[error("room id is blank")]
    BlankRoomId,

    #[error("already in a room")]
    AlreadyJoined,

    #[error("not in a room")]
    NotJoined,

    #[error(transparent)]
    Move(#[from] MoveRejection),
}

/// Result of a user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the transport.
    Sent,

    /// Failed local validation; nothing was emitted.
    Discarded(Rejection),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Dispatcher errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Routes intents to the transport and inbound events to the state.
pub struct Dispatcher<T: Transport> {
    transport: T,
    state: ClientState,
    updates: watch::Sender<ClientState>,
    rng: StdRng,
}

impl<T: Transport> Dispatcher<T> {
    /// Take ownership of a transport for the lifetime of the session.
    pub fn new(transport: T) -> Self {
        Self::with_rng(transport, StdRng::from_entropy())
    }

    /// Same as [`Dispatcher::new`] with a caller-supplied room id generator.
    pub fn with_rng(transport: T, rng: StdRng) -> Self {
        let state = ClientState::new();
        let (updates, _) = watch::channel(state.clone());
        Self {
            transport,
            state,
            updates,
            rng,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Observe committed states.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.updates.subscribe()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // User intents

    /// Store the typed username. Local only.
    pub fn set_username(&mut self, username: &str) {
        let mut next = self.state.clone();
        next.session.set_username(username);
        self.commit(next);
    }

    /// Pick a room from the directory. Local only, not validated.
    pub fn select_room(&mut self, room_id: RoomId) {
        let mut next = self.state.clone();
        next.directory.select(room_id);
        self.commit(next);
    }

    /// Ask the authority for the joinable rooms.
    pub fn refresh_rooms(&mut self) -> Result<Dispatch, DispatchError> {
        let mut next = self.state.clone();
        self.emit(&mut next, Outbound::GetRooms)?;
        next.directory.mark_refresh_requested();
        self.commit(next);
        Ok(Dispatch::Sent)
    }

    /// Join an existing room.
    pub fn join(&mut self, username: &str, room_id: &str) -> Result<Dispatch, DispatchError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Ok(self.discard("join", Rejection::BlankRoomId));
        }
        self.send_join(username, RoomId::new(room_id))
    }

    /// Join the room picked with [`Dispatcher::select_room`].
    pub fn join_selected(&mut self, username: &str) -> Result<Dispatch, DispatchError> {
        match self.state.directory.selected().cloned() {
            Some(room_id) => self.join(username, room_id.as_str()),
            None => Ok(self.discard("join", Rejection::BlankRoomId)),
        }
    }

    /// Create a room under a fresh id and join it.
    pub fn create_room(&mut self, username: &str) -> Result<Dispatch, DispatchError> {
        if let Some(rejection) = self.check_join(username) {
            return Ok(self.discard("create", rejection));
        }
        let room_id = self.state.directory.generate_room_id(&mut self.rng);
        info!(room_id = %room_id, "creating room");
        self.send_join(username, room_id)
    }

    /// Forward a click on `index` if the move is locally playable.
    ///
    /// The board is not touched; the authority's next update is.
    pub fn attempt_move(&mut self, index: usize) -> Result<Dispatch, DispatchError> {
        let cell = match admit_move(index, &self.state.session, &self.state.board) {
            Ok(cell) => cell,
            Err(rejection) => return Ok(self.discard("move", rejection.into())),
        };
        let mut next = self.state.clone();
        self.emit(&mut next, Outbound::Move(cell))?;
        self.commit(next);
        Ok(Dispatch::Sent)
    }

    /// Ask the authority to start a new game in this room.
    pub fn restart(&mut self) -> Result<Dispatch, DispatchError> {
        if !self.state.session.is_joined() {
            return Ok(self.discard("restart", Rejection::NotJoined));
        }
        let mut next = self.state.clone();
        self.emit(&mut next, Outbound::Restart)?;
        self.commit(next);
        Ok(Dispatch::Sent)
    }

    // Inbound

    /// Apply one transport event. On error the state is unchanged.
    ///
    /// A connect always starts from a fresh `NotJoined` session. The room
    /// refresh sent on connect is best effort: if it cannot be emitted the
    /// connection is still committed and the failure is only logged.
    pub fn handle(&mut self, event: TransportEvent) -> Result<(), DispatchError> {
        match event {
            TransportEvent::Connected => {
                info!("connected");
                let next = if self.state.session.is_joined() {
                    warn!("reconnected while joined, dropping room state");
                    self.state.disconnected(Some("reconnected".to_string())).connected()
                } else {
                    self.state.connected()
                };
                self.commit(next);
                if let Err(err) = self.refresh_rooms() {
                    warn!(error = %err, "room refresh on connect failed");
                }
            }
            TransportEvent::Message(wire) => {
                let inbound = Inbound::decode(wire)?;
                let name = inbound.name();
                let next = self.state.apply(inbound)?;
                debug!(event = name, "inbound applied");
                self.commit(next);
            }
            TransportEvent::Disconnected { reason } => {
                info!(reason = reason.as_deref().unwrap_or("unknown"), "disconnected");
                let next = self.state.disconnected(reason);
                self.commit(next);
            }
        }
        Ok(())
    }

    /// Process inbound events in delivery order until the stream ends.
    ///
    /// A closed stream counts as a disconnect.
    pub async fn run(&mut self, inbound: &mut mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = inbound.recv().await {
            if let Err(err) = self.handle(event) {
                warn!(error = %err, "inbound event dropped");
            }
        }
        if self.state.connection.is_connected() || self.state.session.is_joined() {
            let next = self.state.disconnected(Some("transport stream ended".to_string()));
            self.commit(next);
        }
    }

    /// Close the transport and drop all room state.
    pub fn close(&mut self) {
        self.transport.close();
        let next = self.state.disconnected(Some("closed by client".to_string()));
        self.commit(next);
    }

    fn check_join(&self, username: &str) -> Option<Rejection> {
        if username.trim().is_empty() {
            Some(Rejection::BlankUsername)
        } else if self.state.session.is_joined() {
            Some(Rejection::AlreadyJoined)
        } else {
            None
        }
    }

    fn send_join(&mut self, username: &str, room_id: RoomId) -> Result<Dispatch, DispatchError> {
        if let Some(rejection) = self.check_join(username) {
            return Ok(self.discard("join", rejection));
        }
        let username = username.trim();

        let mut next = self.state.clone();
        next.session.clear_error();
        next.session.set_username(username);
        next.session.set_room(room_id.clone());
        self.emit(
            &mut next,
            Outbound::JoinGame(JoinGame {
                username: username.to_string(),
                room_id: room_id.clone(),
            }),
        )?;
        info!(room_id = %room_id, username, "join requested");
        self.commit(next);
        Ok(Dispatch::Sent)
    }

    fn emit(&mut self, next: &mut ClientState, intent: Outbound) -> Result<(), DispatchError> {
        self.transport.emit(intent.encode())?;
        let ordinal = next.connection.record_sent();
        debug!(event = intent.name(), ordinal, "intent emitted");
        Ok(())
    }

    fn discard(&self, intent: &'static str, rejection: Rejection) -> Dispatch {
        debug!(intent, reason = %rejection, "intent discarded");
        Dispatch::Discarded(rejection)
    }

    fn commit(&mut self, next: ClientState) {
        let from = self.state.session.phase();
        let to = next.session.phase();
        if from != to {
            info!(from = %from, to = %to, "phase changed");
        }
        self.state = next;
        self.updates.send_replace(self.state.clone());
    }
}

impl<T: Transport> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{WireEvent, BOARD_UPDATE, GET_ROOMS, INIT, JOIN_GAME, MOVE, PLAYERS, RESTART, ROOMS_LIST, START_GAME};
    use crate::state::{Phase, Symbol};
    use crate::transport::{channel, ChannelTransport, RemoteEnd};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn setup() -> (Dispatcher<ChannelTransport>, RemoteEnd) {
        let (transport, _inbound, remote) = channel();
        let dispatcher = Dispatcher::with_rng(transport, StdRng::seed_from_u64(1));
        (dispatcher, remote)
    }

    fn deliver(dispatcher: &mut Dispatcher<ChannelTransport>, name: &str, data: Value) {
        dispatcher
            .handle(TransportEvent::Message(WireEvent::new(name, data)))
            .unwrap();
    }

    fn empty_board() -> Value {
        json!([null, null, null, null, null, null, null, null, null])
    }

    fn alice_and_bob() -> Value {
        json!([{"username": "alice", "symbol": "X"}, {"username": "bob", "symbol": "O"}])
    }

    /// Joined as alice (X), both players seated, game started.
    fn in_progress() -> (Dispatcher<ChannelTransport>, RemoteEnd) {
        let (mut dispatcher, mut remote) = setup();
        dispatcher.join("alice", "r1").unwrap();
        deliver(&mut dispatcher, INIT, json!({"symbol": "X", "board": empty_board()}));
        deliver(&mut dispatcher, PLAYERS, alice_and_bob());
        deliver(&mut dispatcher, START_GAME, json!({"start": true, "players": alice_and_bob()}));
        remote.drain();
        (dispatcher, remote)
    }

    #[test]
    fn test_scenario_join_and_init() {
        let (mut dispatcher, mut remote) = setup();

        let dispatch = dispatcher.join("alice", "r1").unwrap();
        assert_eq!(dispatch, Dispatch::Sent);
        assert_eq!(
            remote.drain(),
            vec![WireEvent::new(JOIN_GAME, json!({"username": "alice", "roomId": "r1"}))]
        );

        deliver(&mut dispatcher, INIT, json!({"symbol": "X", "board": empty_board()}));
        let state = dispatcher.state();
        assert_eq!(state.session.phase(), Phase::AwaitingOpponent);
        assert_eq!(state.session.local_symbol(), Some(Symbol::X));
        assert_eq!(state.session.room_id(), Some(&RoomId::new("r1")));
    }

    #[test]
    fn test_scenario_roster_then_start() {
        let (mut dispatcher, _remote) = setup();
        dispatcher.join("alice", "r1").unwrap();
        deliver(&mut dispatcher, INIT, json!({"symbol": "X", "board": empty_board()}));
        deliver(&mut dispatcher, PLAYERS, json!([{"username": "alice", "symbol": "X"}]));
        assert_eq!(dispatcher.state().session.phase(), Phase::AwaitingOpponent);

        deliver(&mut dispatcher, PLAYERS, alice_and_bob());
        assert_eq!(dispatcher.state().session.phase(), Phase::Ready);
        assert!(!dispatcher.state().board_visible);

        deliver(&mut dispatcher, START_GAME, json!({"start": true, "players": alice_and_bob()}));
        assert_eq!(dispatcher.state().session.phase(), Phase::InProgress);
        assert!(dispatcher.state().board_visible);
    }

    #[test]
    fn test_scenario_move_on_opponent_turn_is_discarded() {
        let (mut dispatcher, mut remote) = in_progress();
        deliver(
            &mut dispatcher,
            BOARD_UPDATE,
            json!({"board": ["X", null, null, null, null, null, null, null, null], "turn": "O", "winner": null}),
        );

        let dispatch = dispatcher.attempt_move(4).unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Discarded(Rejection::Move(MoveRejection::NotYourTurn))
        );
        assert!(remote.drain().is_empty());
    }

    #[test]
    fn test_scenario_move_on_own_turn_is_sent() {
        let (mut dispatcher, mut remote) = in_progress();
        let before = dispatcher.state().board.clone();

        assert!(dispatcher.attempt_move(4).unwrap().is_sent());
        assert_eq!(remote.drain(), vec![WireEvent::new(MOVE, json!(4))]);
        assert_eq!(dispatcher.state().board, before);

        deliver(
            &mut dispatcher,
            BOARD_UPDATE,
            json!({"board": [null, null, null, null, "X", null, null, null, null], "turn": "O", "winner": null}),
        );
        assert_eq!(dispatcher.state().board.cells[4], Some(Symbol::X));
    }

    #[test]
    fn test_scenario_draw_then_restart() {
        let (mut dispatcher, mut remote) = in_progress();
        deliver(
            &mut dispatcher,
            BOARD_UPDATE,
            json!({"board": ["X", "O", "X", "X", "O", "O", "O", "X", "X"], "turn": "O", "winner": "draw"}),
        );
        assert_eq!(dispatcher.state().session.phase(), Phase::Concluded);
        assert_eq!(dispatcher.state().status_line(), "Draw!");
        assert!(!dispatcher.attempt_move(0).unwrap().is_sent());

        assert!(dispatcher.restart().unwrap().is_sent());
        assert_eq!(remote.drain(), vec![WireEvent::new(RESTART, Value::Null)]);

        deliver(
            &mut dispatcher,
            BOARD_UPDATE,
            json!({"board": empty_board(), "turn": "X", "winner": null}),
        );
        assert_eq!(dispatcher.state().session.phase(), Phase::InProgress);
        assert_eq!(dispatcher.state().roster.len(), 2);
    }

    #[test]
    fn test_roster_update_idempotent() {
        let (mut dispatcher, _remote) = in_progress();
        deliver(&mut dispatcher, PLAYERS, alice_and_bob());
        let once = dispatcher.state().roster.clone();
        deliver(&mut dispatcher, PLAYERS, alice_and_bob());
        assert_eq!(dispatcher.state().roster, once);
        assert_eq!(dispatcher.state().session.phase(), Phase::InProgress);
    }

    #[test]
    fn test_oversized_roster_keeps_previous() {
        let (mut dispatcher, _remote) = in_progress();
        let result = dispatcher.handle(TransportEvent::Message(WireEvent::new(
            PLAYERS,
            json!([
                {"username": "alice", "symbol": "X"},
                {"username": "bob", "symbol": "O"},
                {"username": "carol", "symbol": "X"}
            ]),
        )));
        assert!(matches!(result, Err(DispatchError::Apply(_))));
        assert_eq!(dispatcher.state().roster.len(), 2);
    }

    #[test]
    fn test_blank_input_is_discarded() {
        let (mut dispatcher, mut remote) = setup();
        assert_eq!(
            dispatcher.join("  ", "r1").unwrap(),
            Dispatch::Discarded(Rejection::BlankUsername)
        );
        assert_eq!(
            dispatcher.join("alice", " ").unwrap(),
            Dispatch::Discarded(Rejection::BlankRoomId)
        );
        assert_eq!(
            dispatcher.create_room("").unwrap(),
            Dispatch::Discarded(Rejection::BlankUsername)
        );
        assert_eq!(
            dispatcher.join_selected("alice").unwrap(),
            Dispatch::Discarded(Rejection::BlankRoomId)
        );
        assert_eq!(
            dispatcher.restart().unwrap(),
            Dispatch::Discarded(Rejection::NotJoined)
        );
        assert!(remote.drain().is_empty());
    }

    #[test]
    fn test_join_trims_and_rejects_when_joined() {
        let (mut dispatcher, mut remote) = setup();
        dispatcher.join("  alice ", " r1 ").unwrap();
        assert_eq!(
            remote.drain(),
            vec![WireEvent::new(JOIN_GAME, json!({"username": "alice", "roomId": "r1"}))]
        );

        deliver(&mut dispatcher, INIT, json!({"symbol": "O", "board": empty_board()}));
        assert_eq!(
            dispatcher.join("alice", "r2").unwrap(),
            Dispatch::Discarded(Rejection::AlreadyJoined)
        );
        assert!(remote.drain().is_empty());
    }

    #[test]
    fn test_create_room() {
        let (mut dispatcher, mut remote) = setup();
        assert!(dispatcher.create_room("alice").unwrap().is_sent());

        let room_id = dispatcher.state().session.room_id().cloned().unwrap();
        assert_eq!(room_id.as_str().len(), 6);
        assert_eq!(
            remote.drain(),
            vec![WireEvent::new(
                JOIN_GAME,
                json!({"username": "alice", "roomId": room_id.as_str()})
            )]
        );
    }

    #[test]
    fn test_error_cleared_on_next_join() {
        let (mut dispatcher, _remote) = setup();
        dispatcher.join("alice", "full-room").unwrap();
        deliver(&mut dispatcher, "error", json!("Room is full"));
        assert_eq!(dispatcher.state().session.error_message(), Some("Room is full"));
        assert_eq!(dispatcher.state().session.phase(), Phase::NotJoined);

        dispatcher.join("alice", "other").unwrap();
        assert_eq!(dispatcher.state().session.error_message(), None);
    }

    #[test]
    fn test_directory_refresh_and_select() {
        let (mut dispatcher, mut remote) = setup();
        dispatcher.handle(TransportEvent::Connected).unwrap();
        assert_eq!(remote.drain(), vec![WireEvent::new("get_rooms", Value::Null)]);
        assert!(dispatcher.state().directory.is_refresh_pending());

        deliver(&mut dispatcher, ROOMS_LIST, json!(["abc123", "def456"]));
        assert_eq!(dispatcher.state().directory.len(), 2);

        dispatcher.select_room(RoomId::new("def456"));
        dispatcher.join_selected("bob").unwrap();
        assert_eq!(
            remote.drain(),
            vec![WireEvent::new(JOIN_GAME, json!({"username": "bob", "roomId": "def456"}))]
        );
    }

    #[test]
    fn test_duplicate_intents_not_suppressed() {
        let (mut dispatcher, mut remote) = in_progress();
        dispatcher.restart().unwrap();
        dispatcher.restart().unwrap();
        dispatcher.attempt_move(0).unwrap();
        dispatcher.attempt_move(0).unwrap();
        let names: Vec<String> = remote.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec![RESTART, RESTART, MOVE, MOVE]);
    }

    #[test]
    fn test_disconnect_resets() {
        let (mut dispatcher, _remote) = in_progress();
        dispatcher
            .handle(TransportEvent::Disconnected {
                reason: Some("transport close".to_string()),
            })
            .unwrap();

        let state = dispatcher.state();
        assert_eq!(state.session.phase(), Phase::NotJoined);
        assert_eq!(state.session.local_symbol(), None);
        assert!(state.roster.is_empty());
        assert!(state.board.is_reset());
    }

    #[test]
    fn test_reconnect_while_joined_starts_fresh() {
        let (mut dispatcher, mut remote) = in_progress();
        dispatcher.handle(TransportEvent::Connected).unwrap();

        let state = dispatcher.state();
        assert!(state.connection.is_connected());
        assert_eq!(state.session.phase(), Phase::NotJoined);
        assert_eq!(state.session.local_symbol(), None);
        assert!(state.roster.is_empty());
        assert!(!state.board_visible);
        assert_eq!(remote.try_next().unwrap().name, GET_ROOMS);
    }

    #[test]
    fn test_connect_survives_failed_refresh() {
        let (mut dispatcher, remote) = setup();
        drop(remote);

        dispatcher.handle(TransportEvent::Connected).unwrap();
        let state = dispatcher.state();
        assert!(state.connection.is_connected());
        assert!(!state.directory.is_refresh_pending());
        assert_eq!(state.connection.sent, 0);
    }

    #[test]
    fn test_malformed_inbound_is_rejected() {
        let (mut dispatcher, _remote) = in_progress();
        let before = dispatcher.state().clone();
        let result = dispatcher.handle(TransportEvent::Message(WireEvent::new(
            BOARD_UPDATE,
            json!({"board": "nope"}),
        )));
        assert!(matches!(result, Err(DispatchError::Protocol(_))));
        assert_eq!(dispatcher.state(), &before);
    }

    #[test]
    fn test_subscribers_see_committed_state() {
        let (mut dispatcher, _remote) = setup();
        let observer = dispatcher.subscribe();
        dispatcher.join("alice", "r1").unwrap();
        deliver(&mut dispatcher, INIT, json!({"symbol": "X", "board": empty_board()}));
        assert_eq!(observer.borrow().session.phase(), Phase::AwaitingOpponent);
    }

    #[test]
    fn test_transport_closed() {
        let (mut dispatcher, remote) = setup();
        drop(remote);
        let result = dispatcher.join("alice", "r1");
        assert!(matches!(
            result,
            Err(DispatchError::Transport(TransportError::Closed))
        ));
        assert_eq!(dispatcher.state().session.room_id(), None);
    }

    #[tokio::test]
    async fn test_run_until_stream_ends() {
        let (transport, mut inbound, remote) = channel();
        let mut dispatcher = Dispatcher::with_rng(transport, StdRng::seed_from_u64(9));

        remote.connect().unwrap();
        remote.send(ROOMS_LIST, json!(["r1"])).unwrap();
        remote.send(INIT, json!({"symbol": "O", "board": empty_board()})).unwrap();
        remote.send("bogus", json!(null)).unwrap();
        remote.send(PLAYERS, alice_and_bob()).unwrap();
        drop(remote);

        dispatcher.run(&mut inbound).await;

        let state = dispatcher.state();
        assert_eq!(state.connection.received, 3);
        assert_eq!(
            state.connection.last_disconnect.as_deref(),
            Some("transport stream ended")
        );
        assert_eq!(state.session.phase(), Phase::NotJoined);
    }

    #[tokio::test]
    async fn test_stream_end_without_connect_resets() {
        let (transport, mut inbound, remote) = channel();
        let mut dispatcher = Dispatcher::with_rng(transport, StdRng::seed_from_u64(3));

        remote.send(INIT, json!({"symbol": "X", "board": empty_board()})).unwrap();
        drop(remote);

        dispatcher.run(&mut inbound).await;

        let state = dispatcher.state();
        assert_eq!(state.session.phase(), Phase::NotJoined);
        assert_eq!(state.session.local_symbol(), None);
        assert_eq!(
            state.connection.last_disconnect.as_deref(),
            Some("transport stream ended")
        );
    }
}
