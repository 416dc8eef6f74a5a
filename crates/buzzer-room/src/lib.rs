//! Room store and buzz-ordering engine for the buzzer server.
//!
//! Each room runs as its own Tokio task (actor model) that owns the room's
//! players, round status, and buzz order. Commands for one room are applied
//! one at a time; different rooms never wait on each other.
//!
//! # Key types
//!
//! - [`RoomStore`]: creates rooms and routes every operation to them
//! - [`Room`]: the per-room state machine (join, start, buzz, ...)
//! - [`RoundStatus`]: `Lobby`, `InRound`, or `RoundClear`
//! - [`Broadcaster`]: where snapshots go after each change
//! - [`Clock`] / [`CodeGenerator`]: injectable time and room codes

mod actor;
mod broadcast;
mod clock;
mod codegen;
mod config;
mod error;
mod state;
mod store;
mod validation;

pub use actor::RoomHandle;
pub use broadcast::{Broadcaster, NullBroadcaster};
pub use clock::{Clock, SystemClock};
pub use codegen::{CodeGenerator, RandomCodeGenerator};
pub use config::{RoundStatus, StoreConfig};
pub use error::RoomError;
pub use state::{Outcome, Player, PlayerStatus, Room};
pub use store::{RoomStore, RoomStoreBuilder};
pub use validation::{MAX_NAME_CHARS, validate_name};
