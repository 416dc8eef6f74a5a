//! Error types for the room layer.

use buzzer_protocol::RoomCode;

/// Errors surfaced to the caller of a room operation.
///
/// A returned error always means the room was left untouched and nothing
/// was broadcast.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A room or player name broke the naming policy.
    #[error("invalid name {0:?}: letters and digits only, 1-32 characters")]
    InvalidName(String),

    /// No live room has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The room exists but has no player with this name.
    #[error("player {name} not found in room {code}")]
    PlayerNotFound { code: RoomCode, name: String },

    /// Another player in the room already uses this name, ignoring case.
    #[error("name {name} is already taken in room {code}")]
    NameConflict { code: RoomCode, name: String },

    /// The code generator kept returning codes that are already live.
    #[error("no free room code found")]
    CodeSpaceExhausted,

    /// The room's actor is gone or not accepting commands.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}
