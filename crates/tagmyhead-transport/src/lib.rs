//! Transport abstraction layer for tagmyhead.
//!
//! A connection is split into two halves as soon as it is attached to a
//! room: a [`FrameSink`] owned by the connection's send pump (the only
//! writer) and a [`FrameSource`] owned by its receive pump.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `memory`: in-process loopback connections for tests

#![allow(async_fn_in_trait)]

mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketSink, WebSocketSource,
    WebSocketTransport,
};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One inbound frame as seen by a receive pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An application message.
    Data(Vec<u8>),
    /// A ping or pong. Carries no payload but proves the peer is alive.
    KeepAlive,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// An accepted connection, not yet split into its two halves.
pub trait Connection: Send + 'static {
    /// Writing half.
    type Sink: FrameSink;
    /// Reading half.
    type Source: FrameSource;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The request path the peer connected with (e.g. `/ws/ABC123/P1`).
    fn path(&self) -> &str;

    /// Splits the connection into independently owned halves.
    fn split(self) -> (Self::Sink, Self::Source);
}

/// The writing half of a connection.
///
/// Futures are `Send` so a generic send pump can be handed to
/// `tokio::spawn`.
pub trait FrameSink: Send + 'static {
    /// Writes one message. UTF-8 payloads go out as text frames.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Writes a keep-alive ping.
    fn ping(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Writes a close frame and flushes.
    fn close(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The reading half of a connection.
pub trait FrameSource: Send + 'static {
    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;
}
