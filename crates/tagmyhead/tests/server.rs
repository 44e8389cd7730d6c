//! Integration tests for the server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tagmyhead::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and lobby.
async fn start_server() -> (String, Lobby) {
    let server = TagmyheadServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let lobby = server.lobby();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, lobby)
}

async fn connect(addr: &str, code: &RoomCode, player: &PlayerId) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/{code}/{player}"))
        .await
        .expect("should connect");
    ws
}

/// Next JSON event, skipping control frames.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid json");
            }
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("valid json");
            }
            _ => continue,
        }
    }
}

async fn recv_type(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let event = recv(ws).await;
        if event["type"] == kind {
            return event;
        }
    }
}

async fn send(ws: &mut ClientWs, json: &str) {
    ws.send(Message::Text(json.into())).await.expect("send");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_attach_receives_init_and_join() {
    let (addr, lobby) = start_server().await;
    let code = lobby.create_room().await;
    let alice = lobby.join_room(&code, "Alice").await.unwrap();
    lobby.join_room(&code, "Bob").await.unwrap();

    let mut ws = connect(&addr, &code, &alice.id).await;

    let init = recv(&mut ws).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["started"], false);
    assert_eq!(init["opponentName"], "Bob");

    let join = recv(&mut ws).await;
    assert_eq!(join["type"], "join");
    assert_eq!(join["playerId"], alice.id.as_str());
}

#[tokio::test]
async fn test_unknown_room_gets_error_and_close() {
    let (addr, _lobby) = start_server().await;
    let mut ws = connect(&addr, &RoomCode::from("ZZZZZZ"), &PlayerId::from("P1")).await;

    let error = recv(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error"], "room ZZZZZZ not found");

    // The server closes after the error.
    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("should close");
    assert!(matches!(next, Some(Ok(Message::Close(_))) | None));
}

#[tokio::test]
async fn test_full_game_flow() {
    let (addr, lobby) = start_server().await;
    let code = lobby.create_room().await;
    let alice = lobby.join_room(&code, "Alice").await.unwrap();
    let bob = lobby.join_room(&code, "Bob").await.unwrap();

    let mut a = connect(&addr, &code, &alice.id).await;
    recv_type(&mut a, "join").await;
    let mut b = connect(&addr, &code, &bob.id).await;
    recv_type(&mut b, "init").await;

    lobby.start_game(&code).await.unwrap();
    let started = recv_type(&mut a, "game_started").await;
    assert_eq!(started["text"], "Game has started!");
    recv_type(&mut b, "game_started").await;

    // Alice picks for Bob. Bob only learns that something was picked.
    send(&mut a, r#"{"type":"set_character","character":"Sherlock"}"#).await;
    let seen_by_a = recv_type(&mut a, "set_character").await;
    assert_eq!(seen_by_a["character"], "Sherlock");
    assert_eq!(seen_by_a["text"], "Bob is a Sherlock");
    let seen_by_b = recv_type(&mut b, "set_character").await;
    assert_eq!(seen_by_b["character"], "?");

    send(&mut b, r#"{"type":"question","text":"Am I a detective?"}"#).await;
    let question = recv_type(&mut a, "question").await;
    assert_eq!(question["playerName"], "Bob");

    send(&mut a, r#"{"type":"answer","text":"yes"}"#).await;
    recv_type(&mut b, "answer").await;

    send(&mut b, r#"{"type":"guess","character":"Sherlock"}"#).await;
    let guess = recv_type(&mut a, "guess_result").await;
    assert_eq!(guess["correct"], true);
    assert_eq!(guess["text"], "Bob guessed: Sherlock");

    send(&mut a, &format!(r#"{{"type":"add_winner","winnerId":"{}"}}"#, bob.id)).await;
    let winner = recv_type(&mut b, "winner_added").await;
    assert_eq!(winner["text"], "Bob won the game!");

    // A poller sees the same history, with Bob's character hidden from him.
    let snapshot = lobby.room_snapshot(&code, &bob.id).await.unwrap();
    assert!(snapshot.started);
    assert_eq!(snapshot.characters[&bob.id], "?");
    assert!(snapshot.players.iter().any(|p| p.id == bob.id && p.is_winner));
    assert!(snapshot.messages.iter().any(|e| e.kind() == "guess_result"));
}

#[tokio::test]
async fn test_ping_pong_and_bad_message() {
    let (addr, lobby) = start_server().await;
    let code = lobby.create_room().await;
    let alice = lobby.join_room(&code, "Alice").await.unwrap();
    let mut ws = connect(&addr, &code, &alice.id).await;

    send(&mut ws, r#"{"type":"ping"}"#).await;
    recv_type(&mut ws, "pong").await;

    send(&mut ws, "not json").await;
    let error = recv_type(&mut ws, "error").await;
    assert!(error["error"].as_str().unwrap().contains("decode"));

    // Still connected.
    send(&mut ws, r#"{"type":"ping"}"#).await;
    recv_type(&mut ws, "pong").await;
}

#[tokio::test]
async fn test_delete_room_closes_sockets() {
    let (addr, lobby) = start_server().await;
    let code = lobby.create_room().await;
    let alice = lobby.join_room(&code, "Alice").await.unwrap();
    let mut ws = connect(&addr, &code, &alice.id).await;
    recv_type(&mut ws, "join").await;

    lobby.delete_room(&code).await.unwrap();

    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("should close");
        match next {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }
    assert_eq!(
        lobby.join_room(&code, "Bob").await.unwrap_err().status(),
        404
    );
}
