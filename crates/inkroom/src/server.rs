//! `InkroomServer` builder and server loop.
//!
//! This is the entry point for running an inkroom broker. It ties
//! together all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use inkroom_protocol::JsonCodec;
use inkroom_room::{RoomConfig, RoomRegistry};
use inkroom_transport::{Transport, WebSocketTransport};

use crate::InkroomError;
use crate::handler::handle_connection;

/// Default address when none is given.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";

/// How long a connection may stay silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry does its own locking.
pub(crate) struct ServerState {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting an inkroom server.
///
/// # Example
///
/// ```rust,no_run
/// use inkroom::prelude::*;
///
/// # async fn start() -> Result<(), InkroomError> {
/// let server = InkroomServer::builder()
///     .bind("0.0.0.0:3001")
///     .room_config(RoomConfig {
///         capacity: 8,
///         ..RoomConfig::default()
///     })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct InkroomServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
}

impl InkroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a silent connection is kept before it is treated as
    /// disconnected.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and creates the room registry.
    pub async fn build(self) -> Result<InkroomServer, InkroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(self.room_config),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(InkroomServer { transport, state })
    }
}

impl Default for InkroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound inkroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct InkroomServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl InkroomServer {
    /// Creates a new builder.
    pub fn builder() -> InkroomServerBuilder {
        InkroomServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry holding this server's rooms.
    pub fn registry(&self) -> &RoomRegistry {
        &self.state.registry
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), InkroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops every
    /// room.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), InkroomError> {
        tracing::info!(addr = ?self.local_addr().ok(), "inkroom server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("inkroom server shutting down");
        self.state.registry.shutdown().await;
        Ok(())
    }
}
