//! Room actor: one Tokio task per room that owns its [`Room`].
//!
//! Every operation on a room becomes a [`RoomCommand`] on that room's
//! channel. The actor applies them strictly one at a time, which is what
//! serializes buzzes per room. Rooms never share a lock, so a busy room
//! can't stall another one.

use std::sync::Arc;

use buzzer_protocol::{PlayerSnapshot, RoomCode, RoomSnapshot, SubscriberId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::{Broadcaster, Clock, Outcome, Room, RoomError};

/// Commands sent to a room actor.
///
/// Each carries a `oneshot` reply channel; the caller sends the command
/// and awaits the answer on it.
pub(crate) enum RoomCommand {
    Join {
        name: String,
        reply: oneshot::Sender<Result<PlayerSnapshot, RoomError>>,
    },
    Bind {
        name: String,
        subscriber: SubscriberId,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    Unbind {
        subscriber: SubscriberId,
        reply: oneshot::Sender<Outcome>,
    },
    Start {
        reply: oneshot::Sender<Outcome>,
    },
    Reset {
        reply: oneshot::Sender<Outcome>,
    },
    ClearResults {
        reply: oneshot::Sender<Outcome>,
    },
    Buzz {
        name: String,
        reply: oneshot::Sender<Outcome>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to a running room actor.
///
/// If the actor has stopped, every call fails with
/// [`RoomError::Unavailable`].
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Queues a command built around a fresh reply channel and waits for
    /// the answer. A full queue is refused rather than waited on.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender.try_send(make(reply_tx)).map_err(|e| {
            if let TrySendError::Full(_) = e {
                tracing::warn!(room = %self.code, "room command queue full");
            }
            RoomError::Unavailable(self.code.clone())
        })?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn join(&self, name: &str) -> Result<PlayerSnapshot, RoomError> {
        let name = name.to_owned();
        self.request(|reply| RoomCommand::Join { name, reply }).await?
    }

    pub async fn bind(
        &self,
        name: &str,
        subscriber: SubscriberId,
    ) -> Result<RoomSnapshot, RoomError> {
        let name = name.to_owned();
        self.request(|reply| RoomCommand::Bind {
            name,
            subscriber,
            reply,
        })
        .await?
    }

    pub async fn unbind(
        &self,
        subscriber: SubscriberId,
    ) -> Result<Outcome, RoomError> {
        self.request(|reply| RoomCommand::Unbind { subscriber, reply })
            .await
    }

    pub async fn start(&self) -> Result<Outcome, RoomError> {
        self.request(|reply| RoomCommand::Start { reply }).await
    }

    pub async fn reset(&self) -> Result<Outcome, RoomError> {
        self.request(|reply| RoomCommand::Reset { reply }).await
    }

    pub async fn clear_results(&self) -> Result<Outcome, RoomError> {
        self.request(|reply| RoomCommand::ClearResults { reply }).await
    }

    pub async fn buzz(&self, name: &str) -> Result<Outcome, RoomError> {
        let name = name.to_owned();
        self.request(|reply| RoomCommand::Buzz { name, reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Asks the actor to stop. Commands already queued ahead of this one
    /// are still applied.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// The task side: owns the room and applies commands.
struct RoomActor {
    room: Room,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        let code = self.room.code().clone();
        tracing::info!(room = %code, name = %self.room.name(), "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { name, reply } => {
                    let _ = reply.send(self.handle_join(&name));
                }
                RoomCommand::Bind {
                    name,
                    subscriber,
                    reply,
                } => {
                    let _ = reply.send(self.handle_bind(&name, subscriber));
                }
                RoomCommand::Unbind { subscriber, reply } => {
                    let _ = reply.send(self.handle_unbind(subscriber));
                }
                RoomCommand::Start { reply } => {
                    let _ = reply.send(self.handle_start());
                }
                RoomCommand::Reset { reply } => {
                    self.room.reset();
                    tracing::info!(room = %code, "game reset");
                    let _ = reply.send(Outcome::Applied(self.publish()));
                }
                RoomCommand::ClearResults { reply } => {
                    self.room.clear_results();
                    tracing::info!(room = %code, round = %self.room.round(), "results cleared");
                    let _ = reply.send(Outcome::Applied(self.publish()));
                }
                RoomCommand::Buzz { name, reply } => {
                    let _ = reply.send(self.handle_buzz(&name));
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.room.snapshot());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room = %code, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(room = %code, "room actor stopped");
    }

    /// Hands the current snapshot to the broadcaster. Only called after a
    /// transition actually changed the room.
    fn publish(&self) -> RoomSnapshot {
        let snapshot = self.room.snapshot();
        self.broadcaster.publish(self.room.code(), &snapshot);
        snapshot
    }

    fn handle_join(&mut self, name: &str) -> Result<PlayerSnapshot, RoomError> {
        let rejoin = self.room.player(name).is_some();
        let player = self.room.join(name)?;
        tracing::info!(
            room = %self.room.code(),
            player = %name,
            rejoin,
            players = self.room.players().len(),
            "player joined"
        );
        self.publish();
        Ok(player)
    }

    fn handle_bind(
        &mut self,
        name: &str,
        subscriber: SubscriberId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room.bind(name, subscriber)?;
        tracing::debug!(room = %self.room.code(), player = %name, %subscriber, "subscriber bound");
        Ok(self.publish())
    }

    fn handle_unbind(&mut self, subscriber: SubscriberId) -> Outcome {
        if !self.room.unbind(subscriber) {
            tracing::debug!(room = %self.room.code(), %subscriber, "unbind ignored, not bound here");
            return Outcome::Ignored;
        }
        tracing::debug!(room = %self.room.code(), %subscriber, "subscriber unbound");
        Outcome::Applied(self.publish())
    }

    fn handle_start(&mut self) -> Outcome {
        let now = self.clock.now_millis();
        if !self.room.start(now) {
            tracing::debug!(room = %self.room.code(), "start ignored, round already running");
            return Outcome::Ignored;
        }
        tracing::info!(room = %self.room.code(), started_at = now, "game started");
        Outcome::Applied(self.publish())
    }

    fn handle_buzz(&mut self, name: &str) -> Outcome {
        let now = self.clock.now_millis();
        if !self.room.buzz(name, now) {
            tracing::debug!(room = %self.room.code(), player = %name, "buzz ignored");
            return Outcome::Ignored;
        }

        match self.room.player(name).map(|p| p.is_foul()) {
            Some(true) => {
                tracing::info!(room = %self.room.code(), player = %name, "foul buzz");
            }
            _ => {
                tracing::debug!(
                    room = %self.room.code(),
                    player = %name,
                    position = self.room.buzzed_order().len(),
                    "buzz recorded"
                );
            }
        }
        Outcome::Applied(self.publish())
    }
}

/// Spawns a room actor for `room` and returns a handle to it.
pub(crate) fn spawn_room(
    room: Room,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = room.code().clone();

    let actor = RoomActor {
        room,
        broadcaster,
        clock,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
