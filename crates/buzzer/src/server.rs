//! `BuzzerServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → room store, with the
//! [`Hub`] carrying room snapshots back out to connections.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use buzzer_protocol::{Codec, JsonCodec};
use buzzer_room::{CodeGenerator, RandomCodeGenerator, RoomStore};
use buzzer_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{BuzzerError, Hub, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) store: RoomStore,
    pub(crate) hub: Arc<Hub<C>>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a buzzer server.
///
/// # Example
///
/// ```rust,no_run
/// use buzzer::prelude::*;
///
/// # async fn run() -> Result<(), BuzzerError> {
/// let server = BuzzerServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BuzzerServerBuilder {
    config: ServerConfig,
    codes: Box<dyn CodeGenerator>,
}

impl BuzzerServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            codes: Box::new(RandomCodeGenerator),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a silent connection is kept open.
    pub fn idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets how many frames may wait on one connection before it stops
    /// receiving room updates.
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Sets where room codes come from.
    pub fn code_generator(mut self, codes: impl CodeGenerator) -> Self {
        self.codes = Box::new(codes);
        self
    }

    /// Binds the listener and wires up the store and hub.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<BuzzerServer<JsonCodec>, BuzzerError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_outbound_capacity(self.config.outbound_capacity);

        let hub = Arc::new(Hub::new(JsonCodec));
        let store = RoomStore::builder(Arc::clone(&hub))
            .config(self.config.store.clone())
            .code_generator(self.codes)
            .build();

        let state = Arc::new(ServerState {
            store,
            hub,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(BuzzerServer { transport, state })
    }
}

impl Default for BuzzerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound buzzer server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BuzzerServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl BuzzerServer<JsonCodec> {
    pub fn builder() -> BuzzerServerBuilder {
        BuzzerServerBuilder::new()
    }
}

impl<C: Codec> BuzzerServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BuzzerError> {
        Ok(self.transport.local_addr()?)
    }

    /// The room store behind this server.
    pub fn store(&self) -> &RoomStore {
        &self.state.store
    }

    /// Runs the accept loop until the process ends.
    pub async fn run(self) -> Result<(), BuzzerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops every
    /// room.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), BuzzerError> {
        tracing::info!(addr = %self.local_addr()?, "buzzer server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(incoming, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.state.store.shutdown().await;
        Ok(())
    }
}
