//! In-process loopback connections.
//!
//! [`pair`] returns a [`MemoryConnection`] that a room can attach exactly
//! like a WebSocket, plus a [`MemoryClient`] playing the remote peer.
//! [`pair_with_capacity`] bounds the server → client direction so a client
//! that never reads eventually stalls the writer, which is how tests model
//! a slow consumer.

use tokio::sync::mpsc;

use crate::{
    Connection, ConnectionId, Frame, FrameSink, FrameSource, TransportError,
};

/// What the client side observes from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Data(Vec<u8>),
    Ping,
    Close,
}

/// Server-side end of a loopback connection.
pub struct MemoryConnection {
    id: ConnectionId,
    path: String,
    to_client: mpsc::Sender<Outgoing>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

/// Client-side end of a loopback connection.
pub struct MemoryClient {
    to_server: Option<mpsc::UnboundedSender<Frame>>,
    from_server: mpsc::Receiver<Outgoing>,
}

/// Creates a connected pair with a generous outbound buffer.
pub fn pair(path: &str) -> (MemoryConnection, MemoryClient) {
    pair_with_capacity(path, 1024)
}

/// Creates a connected pair whose server → client buffer holds at most
/// `capacity` frames.
pub fn pair_with_capacity(
    path: &str,
    capacity: usize,
) -> (MemoryConnection, MemoryClient) {
    let (to_client, from_server) = mpsc::channel(capacity);
    let (to_server, from_client) = mpsc::unbounded_channel();
    (
        MemoryConnection {
            id: ConnectionId::next(),
            path: path.to_string(),
            to_client,
            from_client,
        },
        MemoryClient {
            to_server: Some(to_server),
            from_server,
        },
    )
}

impl MemoryClient {
    /// Sends an application message to the server.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.push(Frame::Data(data.into()))
    }

    /// Sends a keep-alive frame (as a pong would be).
    pub fn keep_alive(&self) -> Result<(), TransportError> {
        self.push(Frame::KeepAlive)
    }

    /// Closes the client → server direction. The server's source then
    /// reports a clean close.
    pub fn close(&mut self) {
        self.to_server = None;
    }

    /// Waits for the next frame from the server. `None` once the server
    /// side has been dropped.
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.from_server.recv().await
    }

    /// Returns the next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Outgoing> {
        self.from_server.try_recv().ok()
    }

    fn push(&self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.to_server.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("client closed".into())
        })?;
        tx.send(frame).map_err(|_| {
            TransportError::ConnectionClosed("server dropped".into())
        })
    }
}

impl Connection for MemoryConnection {
    type Sink = MemorySink;
    type Source = MemorySource;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn split(self) -> (MemorySink, MemorySource) {
        (
            MemorySink { tx: self.to_client },
            MemorySource {
                rx: self.from_client,
            },
        )
    }
}

/// Writing half of a [`MemoryConnection`].
pub struct MemorySink {
    tx: mpsc::Sender<Outgoing>,
}

impl MemorySink {
    async fn push(&self, frame: Outgoing) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| {
            TransportError::ConnectionClosed("client dropped".into())
        })
    }
}

impl FrameSink for MemorySink {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(Outgoing::Data(data)).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.push(Outgoing::Ping).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.push(Outgoing::Close).await
    }
}

/// Reading half of a [`MemoryConnection`].
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        Ok(self.rx.recv().await)
    }
}
