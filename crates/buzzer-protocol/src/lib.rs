//! Wire protocol for the buzzer server.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity** ([`RoomCode`], [`SubscriberId`]): how rooms and live
//!   connections are named.
//! - **Snapshots** ([`RoomSnapshot`], [`PlayerSnapshot`], [`BuzzEntry`]):
//!   the complete, self-contained room state sent after every change.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): commands in,
//!   events out.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//!
//! The protocol layer knows nothing about sockets or room locking. It only
//! describes shapes and how to serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (transitions)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BuzzEntry, ClientMessage, PlayerSnapshot, RoomCode, RoomSnapshot,
    ServerMessage, SubscriberId,
};
