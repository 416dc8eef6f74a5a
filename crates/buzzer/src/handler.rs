//! Per-connection handler: decode commands, run them, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   0. Finish the WebSocket handshake within the idle timeout
//!   1. Receive a frame (or time out after the idle timeout)
//!   2. Decode it as a [`ClientMessage`]
//!   3. Run it against the room store; room changes reach subscribers
//!      through the hub, direct replies go back on this connection
//!   4. On exit, the guard detaches the subscriber and drops its topics

use std::sync::Arc;

use buzzer_protocol::{
    ClientMessage, Codec, RoomCode, ServerMessage, SubscriberId,
};
use buzzer_room::{Clock, RoomError, SystemClock};
use buzzer_transport::{Connection, ConnectionId, Incoming, IncomingWebSocket, Outbound};

use crate::BuzzerError;
use crate::server::ServerState;

/// Drop guard that cleans up after a connection when the handler exits.
///
/// Hub topics are cleared right away; the subscriber is detached from its
/// room on a spawned task since `Drop` can't await.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    subscriber: SubscriberId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.state.hub.unsubscribe_all(self.conn_id);

        let subscriber = self.subscriber;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = state.store.detach_subscriber(subscriber).await {
                tracing::debug!(%subscriber, error = %e, "detach on disconnect failed");
            }
        });
    }
}

/// What the loop does after a command.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: IncomingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), BuzzerError> {
    let conn_id = incoming.id();
    let peer = incoming.peer_addr();
    let conn = match tokio::time::timeout(
        state.config.idle_timeout,
        incoming.upgrade(),
    )
    .await
    {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            tracing::info!(%conn_id, %peer, "handshake timed out");
            return Ok(());
        }
    };

    let subscriber = SubscriberId(conn_id.into_inner());
    let outbound = conn.outbound();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let _guard = ConnectionGuard {
        conn_id,
        subscriber,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(
            state.config.idle_timeout,
            conn.recv(),
        )
        .await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "rejected malformed message");
                send_error(&outbound, &state.codec, 400, &e.to_string())?;
                continue;
            }
        };

        match dispatch(&outbound, &state, subscriber, msg).await? {
            Flow::Continue => {}
            Flow::Close => break,
        }
    }

    // Flush anything queued, then close. _guard drops after this.
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after handler exit failed");
    }
    Ok(())
}

/// Runs one command. Room errors become `Error` replies; only a dead
/// connection ends the handler with an error.
async fn dispatch<C: Codec>(
    outbound: &Outbound,
    state: &ServerState<C>,
    subscriber: SubscriberId,
    msg: ClientMessage,
) -> Result<Flow, BuzzerError> {
    let result = match msg {
        ClientMessage::CreateRoom { name } => {
            match state.store.create_room(&name).await {
                Ok(room) => send(
                    outbound,
                    &state.codec,
                    &ServerMessage::RoomCreated {
                        code: room.code,
                        name: room.name,
                    },
                ),
                Err(e) => Err(e.into()),
            }
        }

        ClientMessage::Watch { code } => watch(outbound, state, code).await,

        ClientMessage::JoinRoom { code, player_name } => {
            join(outbound, state, subscriber, code, &player_name).await
        }

        ClientMessage::Start { code } => {
            state.store.start(&code).await.map(drop).map_err(Into::into)
        }
        ClientMessage::ResetGame { code } => {
            state.store.reset_game(&code).await.map(drop).map_err(Into::into)
        }
        ClientMessage::ClearResults { code } => state
            .store
            .clear_results(&code)
            .await
            .map(drop)
            .map_err(Into::into),
        ClientMessage::Buzz { code, player_name } => state
            .store
            .buzz(&code, &player_name)
            .await
            .map(drop)
            .map_err(Into::into),

        ClientMessage::Heartbeat { client_time } => send(
            outbound,
            &state.codec,
            &ServerMessage::HeartbeatAck {
                client_time,
                server_time: SystemClock.now_millis(),
            },
        ),

        ClientMessage::Disconnect => {
            tracing::debug!(%subscriber, "client disconnected");
            return Ok(Flow::Close);
        }
    };

    match result {
        Ok(()) => Ok(Flow::Continue),
        Err(BuzzerError::Room(e)) => {
            tracing::warn!(%subscriber, error = %e, "command rejected");
            send_error(outbound, &state.codec, room_error_status(&e), &e.to_string())?;
            Ok(Flow::Continue)
        }
        Err(e) => Err(e),
    }
}

/// Subscribes the connection to a room without joining it, and sends the
/// current state straight away.
async fn watch<C: Codec>(
    outbound: &Outbound,
    state: &ServerState<C>,
    code: RoomCode,
) -> Result<(), BuzzerError> {
    let newly_subscribed = !state.hub.is_subscribed(&code, outbound.id());
    state.hub.subscribe(&code, outbound.clone());
    let room = match state.store.snapshot(&code).await {
        Ok(room) => room,
        Err(e) => {
            if newly_subscribed {
                state.hub.unsubscribe(&code, outbound.id());
            }
            return Err(e.into());
        }
    };
    tracing::debug!(room = %code, conn_id = %outbound.id(), "watching room");
    send(
        outbound,
        &state.codec,
        &ServerMessage::RoomStatusUpdate { code, room },
    )
}

/// Joins (or rejoins) as a player and binds this connection to them.
///
/// The connection is subscribed before the binding, so the snapshot the
/// binding publishes reaches this connection too.
async fn join<C: Codec>(
    outbound: &Outbound,
    state: &ServerState<C>,
    subscriber: SubscriberId,
    code: RoomCode,
    player_name: &str,
) -> Result<(), BuzzerError> {
    let player = state.store.join_room(&code, player_name).await?;
    send(
        outbound,
        &state.codec,
        &ServerMessage::Joined {
            code: code.clone(),
            player,
        },
    )?;

    let previous = state.store.subscriber_room(subscriber).await;
    let newly_subscribed = !state.hub.is_subscribed(&code, outbound.id());
    state.hub.subscribe(&code, outbound.clone());

    if let Err(e) = state
        .store
        .attach_subscriber(&code, player_name, subscriber)
        .await
    {
        if newly_subscribed {
            state.hub.unsubscribe(&code, outbound.id());
        }
        return Err(e.into());
    }

    if let Some(previous) = previous.filter(|prev| *prev != code) {
        state.hub.unsubscribe(&previous, outbound.id());
    }
    Ok(())
}

/// Maps a room error to the status code sent to the client.
pub(crate) fn room_error_status(err: &RoomError) -> u16 {
    match err {
        RoomError::InvalidName(_) => 400,
        RoomError::RoomNotFound(_) | RoomError::PlayerNotFound { .. } => 404,
        RoomError::NameConflict { .. } => 409,
        RoomError::CodeSpaceExhausted | RoomError::Unavailable(_) => 503,
    }
}

fn send(
    outbound: &Outbound,
    codec: &impl Codec,
    msg: &ServerMessage,
) -> Result<(), BuzzerError> {
    let bytes = codec.encode(msg)?;
    outbound.send(bytes)?;
    Ok(())
}

/// Sends a `ServerMessage::Error` to the client.
fn send_error(
    outbound: &Outbound,
    codec: &impl Codec,
    status: u16,
    message: &str,
) -> Result<(), BuzzerError> {
    send(
        outbound,
        codec,
        &ServerMessage::Error {
            status,
            message: message.to_string(),
        },
    )
}
