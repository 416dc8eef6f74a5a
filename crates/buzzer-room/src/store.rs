//! Room store: creates rooms, finds them, and routes operations to them.

use std::collections::HashMap;
use std::sync::Arc;

use buzzer_protocol::{PlayerSnapshot, RoomCode, RoomSnapshot, SubscriberId};
use tokio::sync::{Mutex, RwLock};

use crate::actor::spawn_room;
use crate::{
    Broadcaster, Clock, CodeGenerator, Outcome, RandomCodeGenerator, Room,
    RoomError, RoomHandle, StoreConfig, SystemClock, validate_name,
};

/// Every live room in the process, plus the subscriber reverse index.
///
/// The room map lock is only held long enough to look up or insert a
/// [`RoomHandle`]; the actual work happens on the room's own actor. The
/// subscriber index is likewise never held across a call into a room.
///
/// Operations for one subscriber are expected to arrive one at a time
/// (one connection handler owns each subscriber id).
pub struct RoomStore {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    /// Which room each bound subscriber is in.
    subscribers: Mutex<HashMap<SubscriberId, RoomCode>>,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    codes: Box<dyn CodeGenerator>,
    config: StoreConfig,
}

impl RoomStore {
    /// A store with the system clock, random codes, and default config.
    pub fn new(broadcaster: impl Broadcaster) -> Self {
        Self::builder(broadcaster).build()
    }

    pub fn builder(broadcaster: impl Broadcaster) -> RoomStoreBuilder {
        RoomStoreBuilder {
            broadcaster: Arc::new(broadcaster),
            clock: Arc::new(SystemClock),
            codes: Box::new(RandomCodeGenerator),
            config: StoreConfig::default(),
        }
    }

    async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Creates an empty room in the lobby under a fresh code.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] for a bad name,
    /// [`RoomError::CodeSpaceExhausted`] if no unused code turned up within
    /// [`StoreConfig::max_code_attempts`] tries.
    pub async fn create_room(
        &self,
        name: &str,
    ) -> Result<RoomSnapshot, RoomError> {
        validate_name(name)?;

        // The write lock spans the collision check and the insert so two
        // creations can't claim the same code.
        let mut rooms = self.rooms.write().await;
        let code = (0..self.config.max_code_attempts)
            .map(|_| self.codes.generate())
            .find(|code| !rooms.contains_key(code))
            .ok_or(RoomError::CodeSpaceExhausted)?;

        let room = Room::new(code.clone(), name);
        let snapshot = room.snapshot();
        let handle = spawn_room(
            room,
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.clock),
            self.config.command_channel_size,
        );
        rooms.insert(code.clone(), handle);

        tracing::info!(room = %code, %name, rooms = rooms.len(), "room created");
        Ok(snapshot)
    }

    /// The current state of a room.
    pub async fn snapshot(
        &self,
        code: &RoomCode,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(code).await?.snapshot().await
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Codes of every live room, sorted.
    pub async fn room_codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<_> = self.rooms.read().await.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Stops every room actor and forgets every binding.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.rooms.write().await.drain().collect();
        self.subscribers.lock().await.clear();

        for (code, handle) in handles {
            if let Err(e) = handle.shutdown().await {
                tracing::debug!(room = %code, error = %e, "room already stopped");
            }
        }
        tracing::info!("room store shut down");
    }

    // -- Players and subscribers ---------------------------------------------

    /// Adds a player, or reactivates one that joined before.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`], [`RoomError::RoomNotFound`], or
    /// [`RoomError::NameConflict`] if the name matches a different player
    /// when case is ignored.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player_name: &str,
    ) -> Result<PlayerSnapshot, RoomError> {
        validate_name(player_name)?;
        self.handle(code).await?.join(player_name).await
    }

    /// Binds a live connection to a player and returns the room state.
    ///
    /// If the subscriber was bound in a different room, that binding is
    /// cleared once the new one succeeds. On error nothing changes.
    pub async fn attach_subscriber(
        &self,
        code: &RoomCode,
        player_name: &str,
        subscriber: SubscriberId,
    ) -> Result<RoomSnapshot, RoomError> {
        let snapshot = self.handle(code).await?.bind(player_name, subscriber).await?;

        let previous = self
            .subscribers
            .lock()
            .await
            .insert(subscriber, code.clone());

        if let Some(previous) = previous.filter(|prev| prev != code) {
            tracing::debug!(%subscriber, from = %previous, to = %code, "subscriber moved rooms");
            if let Ok(handle) = self.handle(&previous).await {
                if let Err(e) = handle.unbind(subscriber).await {
                    tracing::debug!(room = %previous, error = %e, "stale binding not cleared");
                }
            }
        }

        Ok(snapshot)
    }

    /// Clears whatever binding `subscriber` has. The player stays in the
    /// room as dormant. Unknown subscribers are ignored.
    pub async fn detach_subscriber(
        &self,
        subscriber: SubscriberId,
    ) -> Result<Outcome, RoomError> {
        let Some(code) = self.subscribers.lock().await.remove(&subscriber)
        else {
            return Ok(Outcome::Ignored);
        };
        match self.handle(&code).await {
            Ok(handle) => handle.unbind(subscriber).await,
            Err(_) => Ok(Outcome::Ignored),
        }
    }

    /// The room `subscriber` is currently bound in.
    pub async fn subscriber_room(
        &self,
        subscriber: SubscriberId,
    ) -> Option<RoomCode> {
        self.subscribers.lock().await.get(&subscriber).cloned()
    }

    // -- Round transitions --------------------------------------------------

    /// Starts a round. Ignored if one is already running.
    pub async fn start(&self, code: &RoomCode) -> Result<Outcome, RoomError> {
        self.handle(code).await?.start().await
    }

    /// Back to the lobby, clearing every buzz and foul.
    pub async fn reset_game(
        &self,
        code: &RoomCode,
    ) -> Result<Outcome, RoomError> {
        self.handle(code).await?.reset().await
    }

    /// Wipes this round's buzzes. Fouls and the running round stay.
    pub async fn clear_results(
        &self,
        code: &RoomCode,
    ) -> Result<Outcome, RoomError> {
        self.handle(code).await?.clear_results().await
    }

    /// Records a buzz at the moment the room applies it.
    ///
    /// Before a round starts this is a foul. Duplicate buzzes, buzzes from
    /// fouled players, and buzzes from unknown names are ignored.
    pub async fn buzz(
        &self,
        code: &RoomCode,
        player_name: &str,
    ) -> Result<Outcome, RoomError> {
        self.handle(code).await?.buzz(player_name).await
    }
}

/// Builder for [`RoomStore`], for swapping in a different clock, code
/// generator, or config.
pub struct RoomStoreBuilder {
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    codes: Box<dyn CodeGenerator>,
    config: StoreConfig,
}

impl RoomStoreBuilder {
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn code_generator(mut self, codes: impl CodeGenerator) -> Self {
        self.codes = Box::new(codes);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RoomStore {
        RoomStore {
            rooms: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            broadcaster: self.broadcaster,
            clock: self.clock,
            codes: self.codes,
            config: self.config,
        }
    }
}
