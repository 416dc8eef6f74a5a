//! Codec trait and implementations for turning messages into bytes.
//!
//! The server and the transport only ever see `Vec<u8>`; a [`Codec`] sits
//! between them and the typed [`ClientMessage`](crate::ClientMessage) /
//! [`ServerMessage`](crate::ServerMessage) enums. [`JsonCodec`] is the
//! only implementation today and is what browser clients speak.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// Shared by every connection task, hence `Send + Sync + 'static`.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or a
    /// field fails validation while parsing.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Output is always valid UTF-8, so the transport ships it as a text frame.
///
/// ```rust
/// use buzzer_protocol::{ClientMessage, Codec, JsonCodec, RoomCode};
///
/// let codec = JsonCodec;
/// let msg: ClientMessage = codec
///     .decode(br#"{"type":"start","code":"1234"}"#)
///     .unwrap();
/// assert_eq!(
///     msg,
///     ClientMessage::Start { code: RoomCode::parse("1234").unwrap() }
/// );
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
