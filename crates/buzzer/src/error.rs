//! Unified error type for the buzzer server.

use buzzer_protocol::ProtocolError;
use buzzer_room::RoomError;
use buzzer_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BuzzerError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or malformed-message failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room operation was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value couldn't be used.
    #[error("invalid config: {0}")]
    Config(String),
}
