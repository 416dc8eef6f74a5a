//! Transport layer for the buzzer server.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits plus
//! the [`Outbound`] handle used to push frames to a connection without
//! waiting on the network.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod outbound;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use outbound::{DEFAULT_OUTBOUND_CAPACITY, Frame, Outbound};
#[cfg(feature = "websocket")]
pub use websocket::{IncomingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only takes a peer off the listener. Any protocol handshake
/// happens later in [`Incoming::upgrade`], so a peer that never finishes
/// it can't hold up the next accept.
pub trait Transport: Send + Sync + 'static {
    type Incoming: Incoming;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted peer that has not completed its handshake yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn id(&self) -> ConnectionId;

    /// Runs the handshake. Callers bound this with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Queues data for the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection after everything already queued is sent.
    async fn close(&self) -> Result<(), Self::Error>;

    /// A cloneable sender other tasks can use to push frames to this
    /// connection.
    fn outbound(&self) -> Outbound;

    fn id(&self) -> ConnectionId;
}
