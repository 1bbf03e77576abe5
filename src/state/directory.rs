//! Room directory.
//!
//! Tracks the rooms the authority last reported as joinable. The list is
//! replaced wholesale on every `rooms_list` event and may be stale or empty at
//! any moment; joins are validated by the authority, not here.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a generated room id.
pub const ROOM_ID_LEN: usize = 6;

/// Re-draws allowed when a generated id collides with a listed room.
pub const MAX_ROOM_ID_ATTEMPTS: usize = 8;

const ROOM_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random lowercase base-36 id. Casual collision avoidance only.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..ROOM_ID_LEN)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Client-side view of joinable rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomDirectory {
    /// Joinable rooms in the order the authority listed them
    rooms: Vec<RoomId>,

    /// Room picked by the user, not validated
    selected: Option<RoomId>,

    /// A refresh was requested and no list has arrived since
    refresh_pending: bool,

    /// When the last list arrived
    refreshed_at: Option<DateTime<Utc>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a list request went out.
    pub fn mark_refresh_requested(&mut self) {
        self.refresh_pending = true;
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// Replace the listing wholesale. Duplicates keep their first position.
    pub fn replace(&mut self, rooms: Vec<RoomId>) {
        let mut deduped: Vec<RoomId> = Vec::with_capacity(rooms.len());
        for room in rooms {
            if !deduped.contains(&room) {
                deduped.push(room);
            }
        }
        self.rooms = deduped;
        self.refresh_pending = false;
        self.refreshed_at = Some(Utc::now());
    }

    /// Pick a room for the next join. Purely local.
    pub fn select(&mut self, room: RoomId) {
        self.selected = Some(room);
    }

    pub fn selected(&self) -> Option<&RoomId> {
        self.selected.as_ref()
    }

    /// Drop the listing, keeping the user's selection.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.refresh_pending = false;
        self.refreshed_at = None;
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains(room)
    }

    pub fn rooms(&self) -> &[RoomId] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Generate a room id not currently listed.
    ///
    /// Gives up after [`MAX_ROOM_ID_ATTEMPTS`] draws and returns the last one;
    /// the authority reports any remaining collision as an error.
    pub fn generate_room_id<R: Rng + ?Sized>(&self, rng: &mut R) -> RoomId {
        let mut candidate = RoomId::generate(rng);
        for _ in 1..MAX_ROOM_ID_ATTEMPTS {
            if !self.contains(&candidate) {
                break;
            }
            candidate = RoomId::generate(rng);
        }
        candidate
    }

    /// Convert to JSON for the rendering layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rooms": self.rooms,
            "selected": self.selected,
            "refresh_pending": self.refresh_pending,
            "refreshed_at": self.refreshed_at
        })
    }
}
