//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Connection, ConnectionId, DEFAULT_OUTBOUND_CAPACITY, Frame, Incoming,
    Outbound, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    outbound_capacity: usize,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr).await.map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        })
    }

    /// Sets how many frames each connection may have queued for sending.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(IncomingWebSocket {
            id,
            peer,
            stream,
            outbound_capacity: self.outbound_capacity,
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener.local_addr().map_err(TransportError::BindFailed)
    }
}

/// A TCP peer waiting for its WebSocket upgrade.
pub struct IncomingWebSocket {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
    outbound_capacity: usize,
}

impl IncomingWebSocket {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let ws = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        tracing::debug!(id = %self.id, peer = %self.peer, "WebSocket handshake complete");

        Ok(WebSocketConnection::new(
            self.id,
            self.peer,
            ws,
            self.outbound_capacity,
        ))
    }
}

/// A single WebSocket connection.
///
/// Writes go through a dedicated writer task fed by an [`Outbound`], so
/// any number of tasks can push frames without holding a lock across the
/// network. Reads stay with whoever calls [`Connection::recv`].
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: Outbound,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(
        id: ConnectionId,
        peer: SocketAddr,
        ws: WsStream,
        outbound_capacity: usize,
    ) -> Self {
        let (sink, stream) = ws.split();
        let (outbound, frames) = Outbound::with_capacity(id, outbound_capacity);
        tokio::spawn(write_loop(id, sink, frames));
        Self {
            id,
            peer,
            outbound,
            stream: Mutex::new(stream),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// Drains queued frames into the socket until a close frame, a write
/// error, or every [`Outbound`] is dropped.
async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut frames: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = frames.recv().await {
        let msg = match frame {
            Frame::Data(data) => match String::from_utf8(data) {
                Ok(text) => Message::text(text),
                Err(e) => Message::binary(e.into_bytes()),
            },
            Frame::Close => break,
        };
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(%id, error = %e, "write failed, stopping writer");
            return;
        }
    }
    if let Err(e) = sink.close().await {
        tracing::trace!(%id, error = %e, "close after writer stop failed");
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.outbound.send(data.to_vec())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.outbound.close()
    }

    fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
