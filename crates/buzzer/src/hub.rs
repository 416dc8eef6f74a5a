//! Room topics: which connections hear about which room.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use buzzer_protocol::{Codec, RoomCode, RoomSnapshot, ServerMessage};
use buzzer_room::Broadcaster;
use buzzer_transport::{ConnectionId, Outbound, TransportError};

type Topics = HashMap<RoomCode, HashMap<ConnectionId, Outbound>>;

/// The server's [`Broadcaster`]: one topic per room, fanning each snapshot
/// out to every subscribed connection.
///
/// Publishing only queues frames on each connection's [`Outbound`], so a
/// room actor never waits on a slow socket. A connection whose writer has
/// gone away, or whose queue is full, is dropped from the topic.
pub struct Hub<C: Codec> {
    codec: C,
    topics: Mutex<Topics>,
}

impl<C: Codec> Hub<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            topics: Mutex::new(HashMap::new()),
        }
    }

    // Poison is ignored: no critical section leaves the map inconsistent.
    fn topics(&self) -> MutexGuard<'_, Topics> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a connection to a room's topic. Re-subscribing is harmless.
    pub fn subscribe(&self, code: &RoomCode, outbound: Outbound) {
        self.topics()
            .entry(code.clone())
            .or_default()
            .insert(outbound.id(), outbound);
    }

    /// Removes a connection from one room's topic.
    pub fn unsubscribe(&self, code: &RoomCode, conn: ConnectionId) {
        let mut topics = self.topics();
        if let Some(subs) = topics.get_mut(code) {
            subs.remove(&conn);
            if subs.is_empty() {
                topics.remove(code);
            }
        }
    }

    /// Removes a connection from every topic.
    pub fn unsubscribe_all(&self, conn: ConnectionId) {
        let mut topics = self.topics();
        topics.retain(|_, subs| {
            subs.remove(&conn);
            !subs.is_empty()
        });
    }

    pub fn subscriber_count(&self, code: &RoomCode) -> usize {
        self.topics().get(code).map_or(0, HashMap::len)
    }

    pub fn is_subscribed(&self, code: &RoomCode, conn: ConnectionId) -> bool {
        self.topics()
            .get(code)
            .is_some_and(|subs| subs.contains_key(&conn))
    }
}

impl<C: Codec> Broadcaster for Hub<C> {
    fn publish(&self, code: &RoomCode, snapshot: &RoomSnapshot) {
        let msg = ServerMessage::RoomStatusUpdate {
            code: code.clone(),
            room: snapshot.clone(),
        };
        let bytes = match self.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(room = %code, error = %e, "failed to encode snapshot");
                return;
            }
        };

        let mut topics = self.topics();
        let Some(subs) = topics.get_mut(code) else {
            return;
        };
        subs.retain(|conn, outbound| match outbound.send(bytes.clone()) {
            Ok(()) => true,
            Err(TransportError::QueueFull(_)) => {
                tracing::warn!(room = %code, %conn, "dropping subscriber that is not keeping up");
                false
            }
            Err(_) => {
                tracing::debug!(room = %code, %conn, "pruning closed subscriber");
                false
            }
        });
        tracing::trace!(room = %code, subscribers = subs.len(), "snapshot published");
        if subs.is_empty() {
            topics.remove(code);
        }
    }
}
