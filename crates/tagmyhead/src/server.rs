//! `TagmyheadServer` builder and server loop.
//!
//! This is the entry point for running a tagmyhead server. It ties
//! together the layers: transport → room registry → per-room pumps.

use std::sync::Arc;

use tagmyhead_room::{RegistryConfig, RoomRegistry};
use tagmyhead_transport::{Transport, WebSocketTransport};

use crate::TagmyheadError;
use crate::api::Lobby;
use crate::handler::handle_connection;

/// Address used when none is configured.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Builder for configuring and starting a tagmyhead server.
///
/// # Example
///
/// ```rust,no_run
/// use tagmyhead::prelude::*;
///
/// # async fn start() -> Result<(), TagmyheadError> {
/// let server = TagmyheadServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TagmyheadServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
}

impl TagmyheadServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            registry_config: RegistryConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the registry configuration (room TTL, sweep interval, and
    /// per-room settings).
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Binds the listener and creates an empty registry.
    pub async fn build(self) -> Result<TagmyheadServer, TagmyheadError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = Arc::new(RoomRegistry::new(self.registry_config));
        Ok(TagmyheadServer {
            transport,
            registry,
        })
    }
}

impl Default for TagmyheadServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound tagmyhead server.
///
/// Grab a [`lobby`](Self::lobby) for the routing layer, then call
/// [`run()`](Self::run) to start accepting connections.
pub struct TagmyheadServer {
    transport: WebSocketTransport,
    registry: Arc<RoomRegistry>,
}

impl TagmyheadServer {
    /// Creates a new builder.
    pub fn builder() -> TagmyheadServerBuilder {
        TagmyheadServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// A lobby sharing this server's rooms.
    pub fn lobby(&self) -> Lobby {
        Lobby::new(Arc::clone(&self.registry))
    }

    /// Runs the server accept loop.
    ///
    /// Starts the eviction sweeper, then accepts connections and spawns
    /// a handler task for each. WebSocket upgrades happen off this loop.
    /// Returns only if the listener stops.
    pub async fn run(mut self) -> Result<(), TagmyheadError> {
        let _sweeper = self.registry.spawn_sweeper();
        tracing::info!("tagmyhead server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, registry).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(e.into());
                }
            }
        }
    }
}
