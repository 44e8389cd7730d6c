//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a `tokio-tungstenite` client to
//! check that the request path is captured and that frames flow through
//! the split halves.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tagmyhead_transport::{
        Connection, Frame, FrameSink, FrameSource, Transport,
        WebSocketTransport,
    };
    use tokio::io::AsyncReadExt;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str, path: &str) -> ClientWs {
        let url = format!("ws://{addr}{path}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_accept_captures_request_path() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let _client = connect_client(&addr, "/ws/ABC123/player-1").await;
        let conn = server.await.expect("task should complete");

        assert_eq!(conn.path(), "/ws/ABC123/player-1");
    }

    #[tokio::test]
    async fn test_split_halves_send_and_receive() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client = connect_client(&addr, "/").await;
        let (mut sink, mut source) = server.await.unwrap().split();

        // Client → server.
        client
            .send(Message::Text(r#"{"type":"ping"}"#.into()))
            .await
            .unwrap();
        let frame = source.recv().await.unwrap();
        assert_eq!(frame, Some(Frame::Data(br#"{"type":"ping"}"#.to_vec())));

        // Server → client: UTF-8 goes out as a text frame.
        sink.send(br#"{"type":"pong"}"#.to_vec()).await.unwrap();
        match client.next().await {
            Some(Ok(Message::Text(text))) => {
                assert_eq!(text.as_str(), r#"{"type":"pong"}"#);
            }
            other => panic!("expected text frame, got {other:?}"),
        }

        // Non UTF-8 payloads are sent as binary.
        sink.send(vec![0xff, 0xfe]).await.unwrap();
        match client.next().await {
            Some(Ok(Message::Binary(data))) => {
                assert_eq!(data.as_ref(), &[0xff, 0xfe]);
            }
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_pong_is_reported_as_keep_alive() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client = connect_client(&addr, "/").await;
        let (_sink, mut source) = server.await.unwrap().split();

        client.send(Message::Pong(Default::default())).await.unwrap();
        assert_eq!(source.recv().await.unwrap(), Some(Frame::KeepAlive));
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client = connect_client(&addr, "/").await;
        let (_sink, mut source) = server.await.unwrap().split();

        client.close(None).await.unwrap();
        assert_eq!(source.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stalled_handshake_does_not_block_accept() {
        let (mut transport, addr) = bind().await;
        // Connects but never sends an upgrade request.
        let _stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let _client = connect_client(&addr, "/ws/ABC123/p2").await;
        let conn = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("accept should not wait on the stalled client")
            .unwrap();

        assert_eq!(conn.path(), "/ws/ABC123/p2");
    }

    #[tokio::test]
    async fn test_stalled_handshake_is_dropped_after_timeout() {
        let transport = WebSocketTransport::bind_with_handshake_timeout(
            "127.0.0.1:0",
            Duration::from_millis(50),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let mut stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut buf))
            .await
            .expect("server should hang up on the stalled client");

        // EOF or reset, either way the socket was closed.
        assert!(matches!(read, Ok(0) | Err(_)));
        drop(transport);
    }
}
