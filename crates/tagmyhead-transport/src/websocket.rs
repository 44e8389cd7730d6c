//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};

use crate::{
    Connection, ConnectionId, Frame, FrameSink, FrameSource, Transport,
    TransportError,
};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// How long a client gets to finish the WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgraded connections waiting for [`Transport::accept`].
const ACCEPT_BACKLOG: usize = 64;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// A background task accepts TCP streams and runs each upgrade in its own
/// task, so a client that stalls mid-handshake never holds up the next.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    listener: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_handshake_timeout(addr, HANDSHAKE_TIMEOUT).await
    }

    /// Like [`bind`](Self::bind), dropping clients that take longer than
    /// `handshake_timeout` to upgrade.
    pub async fn bind_with_handshake_timeout(
        addr: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let listener = tokio::spawn(listen(listener, tx, handshake_timeout));
        Ok(Self {
            local_addr,
            incoming,
            listener,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or_else(|| {
            TransportError::ConnectionClosed("listener stopped".into())
        })
    }
}

async fn listen(
    listener: TcpListener,
    incoming: mpsc::Sender<WebSocketConnection>,
    handshake_timeout: Duration,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "tcp accept failed");
                continue;
            }
        };

        let incoming = incoming.clone();
        tokio::spawn(async move {
            match timeout(handshake_timeout, handshake(stream)).await {
                Ok(Ok(conn)) => {
                    tracing::debug!(id = %conn.id, %addr, path = %conn.path, "accepted WebSocket connection");
                    if incoming.send(conn).await.is_err() {
                        tracing::debug!(%addr, "transport dropped before accept");
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                }
                Err(_) => {
                    tracing::debug!(%addr, "WebSocket handshake timed out");
                }
            }
        });
    }
}

async fn handshake(stream: TcpStream) -> Result<WebSocketConnection, TransportError> {
    // The upgrade request path carries the room code and player id.
    let mut path = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| {
            path = req.uri().path().to_string();
            Ok::<Response, ErrorResponse>(resp)
        },
    )
    .await
    .map_err(|e| {
        TransportError::AcceptFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            e,
        ))
    })?;

    Ok(WebSocketConnection {
        id: ConnectionId::next(),
        path,
        ws,
    })
}

/// A single accepted WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    path: String,
    ws: WsStream,
}

impl Connection for WebSocketConnection {
    type Sink = WebSocketSink;
    type Source = WebSocketSource;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn split(self) -> (WebSocketSink, WebSocketSource) {
        let (sink, stream) = self.ws.split();
        (WebSocketSink { inner: sink }, WebSocketSource { inner: stream })
    }
}

/// Writing half of a [`WebSocketConnection`].
pub struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
}

fn send_failed(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}

impl FrameSink for WebSocketSink {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.inner.send(msg).await.map_err(send_failed)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.inner
            .send(Message::Ping(Default::default()))
            .await
            .map_err(send_failed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(send_failed)
    }
}

/// Reading half of a [`WebSocketConnection`].
pub struct WebSocketSource {
    inner: SplitStream<WsStream>,
}

impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Data(data.into())));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Data(text.as_bytes().to_vec())));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Some(Frame::KeepAlive));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}
