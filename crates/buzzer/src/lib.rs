//! # Buzzer
//!
//! Real-time multiplayer buzzer game server.
//!
//! A moderator creates a room, players join over WebSocket, and when the
//! moderator starts a round everyone races to buzz first. The server
//! decides the order, flags buzzes that came too early as fouls, and
//! pushes the full room state to every connected client after each change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buzzer::prelude::*;
//!
//! # async fn run() -> Result<(), BuzzerError> {
//! let server = BuzzerServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod server;

pub use config::{ENV_BIND, ENV_IDLE_TIMEOUT_SECS, ServerConfig};
pub use error::BuzzerError;
pub use hub::Hub;
pub use server::{BuzzerServer, BuzzerServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{BuzzerError, BuzzerServer, BuzzerServerBuilder, ServerConfig};
    pub use buzzer_protocol::{
        BuzzEntry, ClientMessage, Codec, JsonCodec, PlayerSnapshot, RoomCode,
        RoomSnapshot, ServerMessage,
    };
    pub use buzzer_room::{RoomError, RoomStore, StoreConfig};
}
