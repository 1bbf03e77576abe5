//! Connection bookkeeping.
//!
//! Tracks whether the transport is up, counts traffic, and guards against
//! stale board or roster updates when the authority numbers them.

use chrono::{DateTime, Utc};

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No transport, or the transport went away
    #[default]
    Disconnected,

    /// Transport up
    Connected { since: DateTime<Utc> },
}

impl ConnectionStatus {
    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Authoritative update streams that may carry a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStream {
    Board,
    Roster,
}

/// Last accepted sequence number of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceGuard {
    last: Option<u64>,
}

impl SequenceGuard {
    /// Accept `seq` if it is newer than anything seen. Unnumbered updates are
    /// always accepted and leave the guard alone.
    pub fn accept(&mut self, seq: Option<u64>) -> bool {
        match (seq, self.last) {
            (None, _) => true,
            (Some(seq), Some(last)) if seq <= last => false,
            (Some(seq), _) => {
                self.last = Some(seq);
                true
            }
        }
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// State of the single connection to the game authority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub status: ConnectionStatus,

    /// Reason given for the last disconnect
    pub last_disconnect: Option<String>,

    /// Intents emitted on this connection
    pub sent: u64,

    /// Inbound events applied on this connection
    pub received: u64,

    board_seq: SequenceGuard,
    roster_seq: SequenceGuard,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the transport as up and start fresh counters.
    pub fn connect(&mut self) {
        self.status = ConnectionStatus::Connected { since: Utc::now() };
        self.sent = 0;
        self.received = 0;
        self.reset_sequences();
    }

    /// Mark the transport as gone.
    pub fn disconnect(&mut self, reason: Option<String>) {
        self.status = ConnectionStatus::Disconnected;
        self.last_disconnect = reason;
        self.reset_sequences();
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// When the current connection came up.
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ConnectionStatus::Connected { since } => Some(since),
            ConnectionStatus::Disconnected => None,
        }
    }

    /// Count an emitted intent, returning its ordinal.
    pub fn record_sent(&mut self) -> u64 {
        self.sent += 1;
        self.sent
    }

    pub fn record_received(&mut self) {
        self.received += 1;
    }

    /// Check an update's sequence number against its stream.
    pub fn accept(&mut self, stream: UpdateStream, seq: Option<u64>) -> bool {
        match stream {
            UpdateStream::Board => self.board_seq.accept(seq),
            UpdateStream::Roster => self.roster_seq.accept(seq),
        }
    }

    /// Forget sequence history, e.g. when a new room session begins.
    pub fn reset_sequences(&mut self) {
        self.board_seq.reset();
        self.roster_seq.reset();
    }

    /// Convert to JSON for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "connected": self.is_connected(),
            "connected_since": self.connected_since(),
            "last_disconnect": self.last_disconnect,
            "sent": self.sent,
            "received": self.received,
            "board_seq": self.board_seq.last(),
            "roster_seq": self.roster_seq.last()
        })
    }
}
