//! Connection hub: per-player mailboxes and the two tasks that pump
//! each connection.
//!
//! ```text
//!   broadcast ──try_send──► mailbox ──► send pump ──► FrameSink
//!                                                      (peer)
//!   dispatch ◄── receive pump ◄────────────────────── FrameSource
//! ```
//!
//! Fan-out never waits on a connection. A full mailbox drops the event
//! for that connection only, so one slow reader cannot hold up the room.

use std::sync::Arc;
use std::time::Duration;

use tagmyhead_protocol::{Codec, JsonCodec, Player, PlayerId, ServerEvent};
use tagmyhead_transport::{
    Connection, ConnectionId, Frame, FrameSink, FrameSource,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::{Room, RoomError};

/// Outbound events queued for one connection.
pub(crate) type Mailbox = mpsc::Sender<Arc<ServerEvent>>;

/// A registered connection: which socket it is and where its events go.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionHandle {
    pub(crate) id: ConnectionId,
    pub(crate) mailbox: Mailbox,
}

impl ConnectionHandle {
    /// Queues `event` without waiting. Returns `false` if it was dropped.
    fn offer(&self, event: &Arc<ServerEvent>, room: &Room, player_id: &PlayerId) -> bool {
        match self.mailbox.try_send(Arc::clone(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    room = %room.code,
                    player_id = %player_id,
                    conn = %self.id,
                    kind = event.kind(),
                    "mailbox full, dropping event"
                );
                false
            }
            // The send pump is gone; its receive pump detaches shortly.
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

// ===========================================================================
// Fan-out
// ===========================================================================

impl Room {
    /// Logs `event` and offers it to every connection.
    pub async fn broadcast(&self, event: ServerEvent) {
        self.log_and_fan_out(event, None).await;
    }

    /// Logs `event` and offers it to every connection but `excluded`'s.
    pub async fn broadcast_except(&self, event: ServerEvent, excluded: &PlayerId) {
        self.log_and_fan_out(event, Some(excluded)).await;
    }

    /// Offers `event` to one player's connection. Not logged.
    pub async fn send_to(&self, player_id: &PlayerId, event: ServerEvent) {
        let event = Arc::new(event);
        let connections = self.connections.read().await;
        if let Some(handle) = connections.get(player_id) {
            handle.offer(&event, self, player_id);
        }
    }

    /// Broadcasts are serialized on `fan_out`, so each connection sees them
    /// in log order. The state lock is only held for the append; mutations
    /// and reads proceed while fan-out waits on the connection table.
    async fn log_and_fan_out(&self, event: ServerEvent, excluded: Option<&PlayerId>) {
        let event = Arc::new(event);
        let _order = self.fan_out.lock().await;
        self.data.write().await.message_log.push(Arc::clone(&event));

        let connections = self.connections.read().await;
        for (player_id, handle) in connections.iter() {
            if Some(player_id) == excluded {
                continue;
            }
            handle.offer(&event, self, player_id);
        }
    }

    // =======================================================================
    // Attach / detach
    // =======================================================================

    /// Binds a live connection to a seated player and starts its pumps.
    ///
    /// The connection is seeded with an `init` event, then everyone
    /// (the new connection included) hears a `join`. A previous
    /// connection for the same player is replaced and closed.
    pub async fn attach<C: Connection>(
        self: &Arc<Self>,
        player_id: &PlayerId,
        conn: C,
    ) -> Result<ConnectionId, RoomError> {
        let conn_id = conn.id();
        let (sink, source) = conn.split();
        let (mailbox, outbox) = mpsc::channel(self.config.mailbox_capacity.max(1));

        // Seeding and registering under the state lock means every
        // broadcast is reflected in `init`, delivered after it, or both.
        let player = {
            let data = self.data.read().await;
            let player = data
                .player(player_id)
                .cloned()
                .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;
            let init = data.game_state_for(player_id)?;
            // Cannot fail: the channel is fresh and holds at least one event.
            let _ = mailbox.try_send(Arc::new(ServerEvent::Init(init)));

            let mut connections = self.connections.write().await;
            if self.is_closed() {
                return Err(RoomError::Closed(self.code.clone()));
            }
            let previous = connections.insert(
                player_id.clone(),
                ConnectionHandle {
                    id: conn_id,
                    mailbox,
                },
            );
            if let Some(previous) = previous {
                info!(
                    room = %self.code,
                    player_id = %player_id,
                    old = %previous.id,
                    new = %conn_id,
                    "connection replaced"
                );
            }
            player
        };

        let pump = PumpConfig::from_room(self);
        tokio::spawn(send_pump(
            self.code.to_string(),
            player_id.clone(),
            sink,
            outbox,
            pump,
        ));
        tokio::spawn(receive_pump(
            Arc::clone(self),
            player.clone(),
            conn_id,
            source,
            pump.read_idle_timeout,
        ));

        info!(room = %self.code, player_id = %player_id, conn = %conn_id, "connection attached");
        self.broadcast(ServerEvent::join(&player)).await;
        Ok(conn_id)
    }

    /// Drops whatever connection `player_id` has. Its send pump drains
    /// the mailbox and closes the transport.
    pub async fn detach(&self, player_id: &PlayerId) -> bool {
        let removed = self.connections.write().await.remove(player_id);
        if let Some(handle) = &removed {
            debug!(room = %self.code, player_id = %player_id, conn = %handle.id, "connection detached");
        }
        removed.is_some()
    }

    /// Like [`detach`](Self::detach) but only if `conn_id` is still the
    /// registered connection, so a superseded connection can't remove
    /// its replacement.
    pub(crate) async fn detach_connection(
        &self,
        player_id: &PlayerId,
        conn_id: ConnectionId,
    ) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(player_id) {
            Some(handle) if handle.id == conn_id => {
                connections.remove(player_id);
                debug!(room = %self.code, player_id = %player_id, conn = %conn_id, "connection detached");
                true
            }
            _ => false,
        }
    }

    pub async fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.connections.read().await.contains_key(player_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

// ===========================================================================
// Pumps
// ===========================================================================

#[derive(Debug, Clone, Copy)]
struct PumpConfig {
    write_timeout: Duration,
    read_idle_timeout: Duration,
    ping_interval: Duration,
}

impl PumpConfig {
    fn from_room(room: &Room) -> Self {
        Self {
            write_timeout: room.config.write_timeout,
            read_idle_timeout: room.config.read_idle_timeout,
            ping_interval: room.config.ping_interval,
        }
    }
}

/// Drains the mailbox into the transport and pings the peer on a timer.
///
/// Exits when the mailbox is closed (after draining it) or on the first
/// failed or timed-out write; either way the transport is closed.
async fn send_pump<S: FrameSink>(
    room: String,
    player_id: PlayerId,
    mut sink: S,
    mut outbox: mpsc::Receiver<Arc<ServerEvent>>,
    config: PumpConfig,
) {
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = outbox.recv() => {
                let Some(event) = next else {
                    debug!(room = %room, player_id = %player_id, "mailbox closed");
                    break;
                };
                let bytes = match JsonCodec.encode(event.as_ref()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(room = %room, error = %e, kind = event.kind(), "failed to encode event");
                        continue;
                    }
                };
                match timeout(config.write_timeout, sink.send(bytes)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(room = %room, player_id = %player_id, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        info!(room = %room, player_id = %player_id, "write timed out");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match timeout(config.write_timeout, sink.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(room = %room, player_id = %player_id, error = %e, "ping failed");
                        break;
                    }
                    Err(_) => {
                        info!(room = %room, player_id = %player_id, "ping timed out");
                        break;
                    }
                }
            }
        }
    }

    let _ = timeout(config.write_timeout, sink.close()).await;
}

/// Reads frames and dispatches them until the peer goes away, goes
/// quiet for too long, or the transport fails. Then announces the leave
/// and detaches, unless a newer connection has taken over.
async fn receive_pump<R: FrameSource>(
    room: Arc<Room>,
    player: Player,
    conn_id: ConnectionId,
    mut source: R,
    read_idle_timeout: Duration,
) {
    loop {
        match timeout(read_idle_timeout, source.recv()).await {
            Ok(Ok(Some(Frame::Data(data)))) => {
                if let Err(e) = dispatch(&room, &player, &data).await {
                    debug!(room = %room.code, player_id = %player.id, error = %e, "rejected message");
                    room.send_to(&player.id, ServerEvent::error(e.to_string()))
                        .await;
                }
            }
            Ok(Ok(Some(Frame::KeepAlive))) => {}
            Ok(Ok(None)) => {
                debug!(room = %room.code, player_id = %player.id, "peer closed connection");
                break;
            }
            Ok(Err(e)) => {
                debug!(room = %room.code, player_id = %player.id, error = %e, "read failed");
                break;
            }
            Err(_) => {
                info!(room = %room.code, player_id = %player.id, "connection idle, dropping");
                break;
            }
        }
    }

    let current = room.detach_connection(&player.id, conn_id).await;
    if current && !room.is_closed() {
        room.broadcast(ServerEvent::leave(&player)).await;
    }
}

#[cfg(test)]
mod tests {
    use tagmyhead_protocol::RoomCode;

    use super::*;
    use crate::RoomConfig;

    #[tokio::test]
    async fn test_mutations_proceed_while_broadcast_waits_on_connections() {
        let room = Room::new(RoomCode::from("ABC123"), RoomConfig::default());
        room.add_player("Alice").await.unwrap();

        let table = room.connections.write().await;
        let broadcasting = {
            let room = Arc::clone(&room);
            tokio::spawn(async move { room.broadcast(ServerEvent::game_started()).await })
        };
        tokio::task::yield_now().await;

        let added = timeout(Duration::from_millis(300), room.add_player("Bob"))
            .await
            .expect("add_player should not wait on fan-out");
        assert!(added.is_ok());
        let started = timeout(Duration::from_millis(300), room.is_started())
            .await
            .expect("reads should not wait on fan-out");
        assert!(!started);

        drop(table);
        broadcasting.await.unwrap();
        let log = room.message_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), "game_started");
    }

    #[tokio::test]
    async fn test_offer_drops_when_mailbox_full() {
        let room = Room::new(RoomCode::from("ABC123"), RoomConfig::default());
        let (mailbox, mut outbox) = mpsc::channel(1);
        let handle = ConnectionHandle {
            id: ConnectionId::next(),
            mailbox,
        };
        let player_id = PlayerId::from("p1");
        let event = Arc::new(ServerEvent::game_started());

        assert!(handle.offer(&event, &room, &player_id));
        assert!(!handle.offer(&event, &room, &player_id));
        assert!(outbox.try_recv().is_ok());
        assert!(outbox.try_recv().is_err());
    }
}
