//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating wire data.
///
/// Every failure here happens before a room is touched, so the caller only
/// needs to report it back to the client that sent the bad input.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, an unknown
    /// message type, or a field that failed validation (e.g. a room code).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is not exactly [`RoomCode::LEN`](crate::RoomCode::LEN)
    /// ASCII digits.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}
