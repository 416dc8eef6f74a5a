//! Core protocol types: identities, room snapshots, and messages.
//!
//! Everything in this module travels on the wire. Field names are
//! camelCase in JSON because the clients are browser pages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short code players type to find a room, e.g. `"0427"`.
///
/// Always exactly [`RoomCode::LEN`] ASCII digits. Deserialization goes
/// through [`RoomCode::parse`], so a malformed code in a client message is
/// rejected while decoding and never reaches a room.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of digits in a room code.
    pub const LEN: usize = 4;

    /// How many distinct codes exist (`10^LEN`).
    pub const SPACE: u32 = 10_000;

    /// Validates and wraps a raw code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] unless `raw` is exactly
    /// [`Self::LEN`] ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit())
        {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ProtocolError::InvalidRoomCode(raw.to_owned()))
        }
    }

    /// Builds a code from a number, zero-padded. Values past
    /// [`Self::SPACE`] wrap around.
    pub fn from_number(n: u32) -> Self {
        Self(format!("{:0width$}", n % Self::SPACE, width = Self::LEN))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a live connection bound to a player.
///
/// The room layer never looks inside it; it only stores it on the player
/// record and keeps a reverse index from subscriber to room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One player's state as seen by clients.
///
/// Exactly one of these holds at any time: `is_waiting`, `is_foul`, or
/// `buzzed_time.is_some() && !is_foul`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    /// Server time (ms since the Unix epoch) of this round's buzz.
    pub buzzed_time: Option<u64>,
    pub is_foul: bool,
    pub is_waiting: bool,
    /// The live connection bound to this player, if any.
    pub subscriber_id: Option<SubscriberId>,
}

impl PlayerSnapshot {
    /// `true` if the player buzzed validly this round.
    pub fn has_buzzed(&self) -> bool {
        self.buzzed_time.is_some() && !self.is_foul
    }

    /// `true` if a live connection is attached.
    pub fn is_connected(&self) -> bool {
        self.subscriber_id.is_some()
    }
}

/// A valid buzz, in the order the server applied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzEntry {
    pub player_name: String,
    /// Server time (ms since the Unix epoch) the buzz was applied.
    pub timestamp: u64,
}

/// The complete state of a room. Sent whole after every change, so a
/// freshly connected client can render everything from one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub name: String,
    /// Players in join order.
    pub players: Vec<PlayerSnapshot>,
    pub game_started: bool,
    pub game_start_time: Option<u64>,
    pub buzzed_order: Vec<BuzzEntry>,
    pub first_buzzer: Option<String>,
}

impl RoomSnapshot {
    /// Looks up a player by exact name.
    pub fn player(&self, name: &str) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → server commands.
///
/// Internally tagged: `{"type": "buzz", "code": "0427", "playerName": "Ana"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Moderator: create a room with a display name.
    CreateRoom { name: String },

    /// Receive room updates without joining as a player (moderator view).
    Watch { code: RoomCode },

    /// Join (or rejoin) a room as `player_name`. The connection becomes
    /// that player's subscriber.
    JoinRoom { code: RoomCode, player_name: String },

    /// Moderator: start a round.
    Start { code: RoomCode },

    /// Moderator: back to the lobby, clearing fouls.
    ResetGame { code: RoomCode },

    /// Moderator: clear this round's buzzes, keep the round running.
    ClearResults { code: RoomCode },

    /// Player: buzz.
    Buzz { code: RoomCode, player_name: String },

    /// Keep-alive. `client_time` is echoed back.
    Heartbeat { client_time: u64 },

    /// The client is leaving.
    Disconnect,
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Reply to `CreateRoom`.
    RoomCreated { code: RoomCode, name: String },

    /// Reply to `JoinRoom` with the player's own record.
    Joined { code: RoomCode, player: PlayerSnapshot },

    /// Full room state, pushed to every subscriber after each change.
    RoomStatusUpdate { code: RoomCode, room: RoomSnapshot },

    /// Reply to `Heartbeat`.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// A command was rejected. `status` follows HTTP conventions
    /// (400 bad input, 404 not found, 409 conflict, 503 unavailable).
    Error { status: u16, message: String },
}
