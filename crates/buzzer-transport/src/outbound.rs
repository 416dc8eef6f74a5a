//! Fire-and-forget outbound frames.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{ConnectionId, TransportError};

/// Frames a connection may have queued before it counts as not keeping up.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// What a connection's writer task can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Send these bytes. UTF-8 payloads go out as text frames.
    Data(Vec<u8>),
    /// Send a close frame and stop writing.
    Close,
}

/// Cloneable sender feeding one connection's writer task.
///
/// Sending never waits on the network: frames are queued and the writer
/// task drains them in order. The queue is bounded. A send to a full queue
/// fails with [`TransportError::QueueFull`], and once the connection is
/// gone every send fails with [`TransportError::ConnectionClosed`].
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl Outbound {
    /// Creates a sender for connection `id` with the default capacity,
    /// plus the receiving end its writer task should drain.
    pub fn channel(id: ConnectionId) -> (Self, mpsc::Receiver<Frame>) {
        Self::with_capacity(id, DEFAULT_OUTBOUND_CAPACITY)
    }

    /// Like [`channel`](Self::channel) with room for `capacity` frames
    /// (at least one).
    pub fn with_capacity(
        id: ConnectionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(Frame::Data(data))
    }

    pub fn close(&self) -> Result<(), TransportError> {
        self.push(Frame::Close)
    }

    /// `true` once the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull(self.id),
            TrySendError::Closed(_) => TransportError::ConnectionClosed(self.id),
        })
    }
}
