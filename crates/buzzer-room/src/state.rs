//! Room and player state, and the transitions that change them.
//!
//! Everything here is synchronous and single-owner: a [`Room`] lives
//! inside exactly one room actor, which applies commands one at a time.
//! That serialization is what makes "first buzz wins" well defined.
//!
//! Each transition checks its preconditions before touching anything, so
//! a failed or ignored call leaves the room exactly as it was.

use std::collections::HashMap;

use buzzer_protocol::{
    BuzzEntry, PlayerSnapshot, RoomCode, RoomSnapshot, SubscriberId,
};

use crate::{RoomError, RoundStatus};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a transition that is allowed to be a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The room changed; this is the snapshot that was broadcast.
    Applied(RoomSnapshot),
    /// Nothing changed and nothing was broadcast (duplicate buzz, start
    /// while already started, detach of an unknown subscriber).
    Ignored,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn into_snapshot(self) -> Option<RoomSnapshot> {
        match self {
            Self::Applied(snapshot) => Some(snapshot),
            Self::Ignored => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player's standing in the current round. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Hasn't buzzed yet.
    Waiting,
    /// Buzzed validly during a running round.
    Buzzed { at: u64 },
    /// Buzzed while no round was running. Sits out every round until
    /// `reset_game` (or a rejoin while in the lobby).
    Foul { at: u64 },
}

/// One player in a room. Never removed; a disconnect only clears the
/// subscriber.
#[derive(Debug, Clone)]
pub struct Player {
    name: String,
    status: PlayerStatus,
    subscriber: Option<SubscriberId>,
}

impl Player {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            status: PlayerStatus::Waiting,
            subscriber: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn subscriber(&self) -> Option<SubscriberId> {
        self.subscriber
    }

    pub fn is_foul(&self) -> bool {
        matches!(self.status, PlayerStatus::Foul { .. })
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let (buzzed_time, is_foul, is_waiting) = match self.status {
            PlayerStatus::Waiting => (None, false, true),
            PlayerStatus::Buzzed { at } => (Some(at), false, false),
            PlayerStatus::Foul { at } => (Some(at), true, false),
        };
        PlayerSnapshot {
            name: self.name.clone(),
            buzzed_time,
            is_foul,
            is_waiting,
            subscriber_id: self.subscriber,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One game session.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    name: String,
    /// Join order is display order.
    players: Vec<Player>,
    round: RoundStatus,
    /// Valid buzzes of the current round, in applied order. The first
    /// buzzer is always the head of this list.
    buzzed_order: Vec<BuzzEntry>,
    /// Reverse index: which player each bound subscriber belongs to.
    subscribers: HashMap<SubscriberId, String>,
}

impl Room {
    /// Creates an empty room in the lobby.
    pub fn new(code: RoomCode, name: &str) -> Self {
        Self {
            code,
            name: name.to_owned(),
            players: Vec::new(),
            round: RoundStatus::Lobby,
            buzzed_order: Vec::new(),
            subscribers: HashMap::new(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn round(&self) -> RoundStatus {
        self.round
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn buzzed_order(&self) -> &[BuzzEntry] {
        &self.buzzed_order
    }

    pub fn first_buzzer(&self) -> Option<&str> {
        self.buzzed_order.first().map(|e| e.player_name.as_str())
    }

    fn player_index(&self, name: &str) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RoomError::PlayerNotFound {
                code: self.code.clone(),
                name: name.to_owned(),
            })
    }

    // -- Membership -------------------------------------------------------

    /// Adds a new player or reactivates an existing one.
    ///
    /// A name that matches an existing player exactly is a rejoin. If no
    /// round is running, a rejoining player's foul or buzz is wiped. A name
    /// that matches a different player only when ignoring case is a
    /// conflict.
    pub fn join(&mut self, name: &str) -> Result<PlayerSnapshot, RoomError> {
        if let Ok(idx) = self.player_index(name) {
            let started = self.round.is_started();
            let player = &mut self.players[idx];
            if !started {
                player.status = PlayerStatus::Waiting;
            }
            return Ok(player.snapshot());
        }

        let folded = name.to_lowercase();
        if self.players.iter().any(|p| p.name.to_lowercase() == folded) {
            return Err(RoomError::NameConflict {
                code: self.code.clone(),
                name: name.to_owned(),
            });
        }

        let player = Player::new(name);
        let snapshot = player.snapshot();
        self.players.push(player);
        Ok(snapshot)
    }

    /// Binds a live connection to a player.
    ///
    /// A subscriber belongs to one player at a time: if it was bound to
    /// someone else in this room, that binding is dropped. If the player
    /// already had a different subscriber, the old one is replaced.
    pub fn bind(
        &mut self,
        name: &str,
        subscriber: SubscriberId,
    ) -> Result<(), RoomError> {
        let idx = self.player_index(name)?;

        if let Some(previous) = self.subscribers.remove(&subscriber) {
            if let Some(p) = self
                .players
                .iter_mut()
                .find(|p| p.name == previous && p.subscriber == Some(subscriber))
            {
                p.subscriber = None;
            }
        }

        let player = &mut self.players[idx];
        if let Some(old) = player.subscriber.replace(subscriber) {
            self.subscribers.remove(&old);
        }
        self.subscribers.insert(subscriber, name.to_owned());
        Ok(())
    }

    /// Clears the binding for `subscriber`. The player record stays.
    ///
    /// Returns `false` if the subscriber wasn't bound here.
    pub fn unbind(&mut self, subscriber: SubscriberId) -> bool {
        let Some(name) = self.subscribers.remove(&subscriber) else {
            return false;
        };
        match self
            .players
            .iter_mut()
            .find(|p| p.name == name && p.subscriber == Some(subscriber))
        {
            Some(player) => {
                player.subscriber = None;
                true
            }
            None => false,
        }
    }

    // -- Round transitions ------------------------------------------------

    /// Starts a round at `now`. Returns `false` (no-op) if one is running.
    ///
    /// Fouled players stay fouled and sit this round out; everyone else
    /// goes back to waiting.
    pub fn start(&mut self, now: u64) -> bool {
        let Some(next) = self.round.start(now) else {
            return false;
        };
        self.round = next;
        self.buzzed_order.clear();
        for player in &mut self.players {
            if !player.is_foul() {
                player.status = PlayerStatus::Waiting;
            }
        }
        true
    }

    /// Back to the lobby: no round, no buzzes, no fouls.
    pub fn reset(&mut self) {
        self.round = RoundStatus::Lobby;
        self.buzzed_order.clear();
        for player in &mut self.players {
            player.status = PlayerStatus::Waiting;
        }
    }

    /// Wipes this round's buzzes without ending the round. Fouls stay.
    pub fn clear_results(&mut self) {
        self.round = self.round.clear();
        self.buzzed_order.clear();
        for player in &mut self.players {
            if !player.is_foul() {
                player.status = PlayerStatus::Waiting;
            }
        }
    }

    /// Applies a buzz from `name` at server time `now`.
    ///
    /// - Unknown player, or player already buzzed or fouled: `false`,
    ///   nothing changes. Late or re-delivered buzzes land here.
    /// - No round running: the player fouls.
    /// - Round running: the buzz is appended to the order. Its timestamp
    ///   is clamped to the previous entry's so the order never goes
    ///   backwards in time.
    pub fn buzz(&mut self, name: &str, now: u64) -> bool {
        let Some(idx) = self.players.iter().position(|p| p.name == name)
        else {
            return false;
        };
        if self.players[idx].status != PlayerStatus::Waiting {
            return false;
        }

        if !self.round.is_started() {
            self.players[idx].status = PlayerStatus::Foul { at: now };
            return true;
        }

        let at = self
            .buzzed_order
            .last()
            .map_or(now, |last| now.max(last.timestamp));
        self.players[idx].status = PlayerStatus::Buzzed { at };
        self.buzzed_order.push(BuzzEntry {
            player_name: name.to_owned(),
            timestamp: at,
        });
        self.round = self.round.record_buzz();
        true
    }

    /// The full wire view of this room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            name: self.name.clone(),
            players: self.players.iter().map(Player::snapshot).collect(),
            game_started: self.round.is_started(),
            game_start_time: self.round.started_at(),
            buzzed_order: self.buzzed_order.clone(),
            first_buzzer: self.first_buzzer().map(str::to_owned),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
