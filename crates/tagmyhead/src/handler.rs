//! Per-connection handler: route the socket to its room and player.
//!
//! The flow is:
//!   1. Parse `/ws/{code}/{playerId}` from the upgrade request path
//!   2. Look up the room and check the player is seated there
//!   3. Hand the connection to the room, which seeds it and starts its
//!      pumps
//!
//! A connection that fails 1 or 2 gets a single `error` event and is
//! closed.

use std::sync::Arc;

use tagmyhead_protocol::{Codec, JsonCodec, PlayerId, RoomCode, ServerEvent};
use tagmyhead_room::RoomRegistry;
use tagmyhead_transport::{Connection, FrameSink};

use crate::TagmyheadError;

/// Splits an attach path into room code and player id.
///
/// Accepts `/ws/{code}/{playerId}` with an optional trailing slash or
/// query string. Returns `None` for anything else.
pub(crate) fn parse_attach_path(path: &str) -> Option<(RoomCode, PlayerId)> {
    let path = path.split('?').next().unwrap_or(path);
    let rest = path.strip_prefix("/ws/")?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let mut segments = rest.split('/');
    let code = segments.next().filter(|s| !s.is_empty())?;
    let player = segments.next().filter(|s| !s.is_empty())?;
    if segments.next().is_some() {
        return None;
    }
    Some((RoomCode::from(code), PlayerId::from(player)))
}

/// Handles a single connection from accept to attach.
///
/// Once attached the connection belongs to its room; this returns as
/// soon as the room has taken it.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    registry: Arc<RoomRegistry>,
) -> Result<(), TagmyheadError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.path(), "handling new connection");

    let Some((code, player_id)) = parse_attach_path(conn.path()) else {
        let message = format!("invalid path: {}", conn.path());
        return reject(conn, message).await;
    };

    let Some(room) = registry.get_room(&code).await else {
        return reject(conn, format!("room {code} not found")).await;
    };
    if room.player(&player_id).await.is_none() {
        return reject(conn, format!("player {player_id} not found")).await;
    }

    room.attach(&player_id, conn).await?;
    Ok(())
}

/// Sends one error event and closes the connection.
async fn reject<C: Connection>(
    conn: C,
    message: String,
) -> Result<(), TagmyheadError> {
    tracing::info!(conn_id = %conn.id(), reason = %message, "rejecting connection");
    let (mut sink, _source) = conn.split();
    let bytes = JsonCodec.encode(&ServerEvent::error(message))?;
    sink.send(bytes).await?;
    sink.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tagmyhead_transport::memory::{self, Outgoing};

    use super::*;

    #[test]
    fn test_parse_attach_path() {
        let (code, player) = parse_attach_path("/ws/ABC123/P1").unwrap();
        assert_eq!(code, RoomCode::from("ABC123"));
        assert_eq!(player, PlayerId::from("P1"));

        assert!(parse_attach_path("/ws/ABC123/P1/").is_some());
        assert!(parse_attach_path("/ws/ABC123/P1?v=2").is_some());
    }

    #[test]
    fn test_parse_attach_path_rejects_malformed() {
        for path in ["/", "/ws/", "/ws/ABC123", "/ws//P1", "/ws/A/B/C", "/rooms/A/B"] {
            assert!(parse_attach_path(path).is_none(), "{path}");
        }
    }

    async fn expect_error(client: &mut memory::MemoryClient) -> serde_json::Value {
        let Some(Outgoing::Data(bytes)) = client.recv().await else {
            panic!("expected an error event");
        };
        let event: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event["type"], "error");
        assert_eq!(client.recv().await, Some(Outgoing::Close));
        event
    }

    #[tokio::test]
    async fn test_unknown_room_is_rejected() {
        let registry = Arc::new(RoomRegistry::default());
        let (conn, mut client) = memory::pair("/ws/ZZZZZZ/P1");

        handle_connection(conn, registry).await.unwrap();
        let event = expect_error(&mut client).await;
        assert_eq!(event["error"], "room ZZZZZZ not found");
    }

    #[tokio::test]
    async fn test_unknown_player_is_rejected() {
        let registry = Arc::new(RoomRegistry::default());
        let room = registry.create_room().await;
        let (conn, mut client) = memory::pair(&format!("/ws/{}/nobody", room.code()));

        handle_connection(conn, registry).await.unwrap();
        let event = expect_error(&mut client).await;
        assert_eq!(event["error"], "player nobody not found");
        assert_eq!(room.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_seated_player_is_attached() {
        let registry = Arc::new(RoomRegistry::default());
        let room = registry.create_room().await;
        let player = room.add_player("Alice").await.unwrap();
        let (conn, mut client) =
            memory::pair(&format!("/ws/{}/{}", room.code(), player.id));

        handle_connection(conn, Arc::clone(&registry)).await.unwrap();
        assert!(room.is_connected(&player.id).await);

        let Some(Outgoing::Data(bytes)) = client.recv().await else {
            panic!("expected init");
        };
        let init: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(init["type"], "init");
    }
}
