//! Store configuration and the round state machine.

use std::fmt;

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Tunables for a [`RoomStore`](crate::RoomStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of each room actor's command queue. Commands arriving
    /// while it is full fail with `RoomError::Unavailable`.
    pub command_channel_size: usize,

    /// How many generated codes to try before giving up on `create_room`.
    pub max_code_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 64,
            max_code_attempts: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoundStatus
// ---------------------------------------------------------------------------

/// Where a room is in its round lifecycle.
///
/// ```text
///            start                 clear_results
///   Lobby ─────────→ InRound ─────────────────→ RoundClear
///     ↑                 ↑                            │
///     │                 └──────── first buzz ────────┘
///     └──────────── reset_game (from any state) ─────┘
/// ```
///
/// - **Lobby**: no round running. A buzz here is a foul.
/// - **InRound**: round running; valid buzzes are recorded in order.
/// - **RoundClear**: round still running, results were just wiped.
///
/// The snapshot's `gameStarted` / `gameStartTime` fields are derived from
/// this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Lobby,
    InRound { started_at: u64 },
    RoundClear { started_at: u64 },
}

impl RoundStatus {
    /// `true` between `start` and the next `reset_game`.
    pub fn is_started(&self) -> bool {
        !matches!(self, Self::Lobby)
    }

    /// When the current round started, if one is running.
    pub fn started_at(&self) -> Option<u64> {
        match *self {
            Self::Lobby => None,
            Self::InRound { started_at } | Self::RoundClear { started_at } => {
                Some(started_at)
            }
        }
    }

    /// The state after `start` at `now`, or `None` if a round is already
    /// running.
    pub fn start(self, now: u64) -> Option<Self> {
        match self {
            Self::Lobby => Some(Self::InRound { started_at: now }),
            _ => None,
        }
    }

    /// The state after `clear_results`. A lobby stays a lobby.
    pub fn clear(self) -> Self {
        match self.started_at() {
            Some(started_at) => Self::RoundClear { started_at },
            None => Self::Lobby,
        }
    }

    /// The state after a valid buzz was recorded.
    pub fn record_buzz(self) -> Self {
        match self {
            Self::RoundClear { started_at } => Self::InRound { started_at },
            other => other,
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::InRound { .. } => write!(f, "InRound"),
            Self::RoundClear { .. } => write!(f, "RoundClear"),
        }
    }
}
