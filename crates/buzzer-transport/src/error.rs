/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer or the writer task is gone.
    #[error("connection {0} closed")]
    ConnectionClosed(crate::ConnectionId),

    /// The connection's outbound queue is full; the peer is not reading.
    #[error("connection {0} is not keeping up")]
    QueueFull(crate::ConnectionId),

    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
