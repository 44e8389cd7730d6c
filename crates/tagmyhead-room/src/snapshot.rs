//! Snapshot actor: serves viewer-scoped copies of a room to pollers.
//!
//! Requests arrive on a bounded queue and are answered one at a time
//! under a read lock, so every snapshot reflects a single moment even
//! while connections keep mutating the room.

use std::sync::Arc;

use tagmyhead_protocol::{
    HIDDEN_CHARACTER, PlayerId, RoomCode, RoomSnapshot, ServerEvent,
};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::game::RoomData;
use crate::{Room, RoomError};

/// A pending snapshot: who is asking and where to send the answer.
#[derive(Debug)]
pub(crate) struct SnapshotRequest {
    pub(crate) viewer: PlayerId,
    pub(crate) reply: oneshot::Sender<RoomSnapshot>,
}

/// Starts the actor and returns its request queue. The actor stops once
/// every sender has been dropped.
pub(crate) fn spawn_actor(
    code: RoomCode,
    data: Arc<RwLock<RoomData>>,
    queue_depth: usize,
) -> mpsc::Sender<SnapshotRequest> {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    tokio::spawn(run(code, data, rx));
    tx
}

async fn run(
    code: RoomCode,
    data: Arc<RwLock<RoomData>>,
    mut requests: mpsc::Receiver<SnapshotRequest>,
) {
    while let Some(request) = requests.recv().await {
        let snapshot = {
            let data = data.read().await;
            build_snapshot(&code, &data, &request.viewer)
        };
        if request.reply.send(snapshot).is_err() {
            debug!(room = %code, viewer = %request.viewer, "snapshot requester went away");
        }
    }
    debug!(room = %code, "snapshot actor stopped");
}

/// Copies the room as `viewer` may see it.
pub(crate) fn build_snapshot(
    code: &RoomCode,
    data: &RoomData,
    viewer: &PlayerId,
) -> RoomSnapshot {
    RoomSnapshot {
        code: code.clone(),
        players: data.players.clone(),
        started: data.started,
        characters: data.visible_characters(viewer),
        messages: data
            .message_log
            .iter()
            .map(|event| redact(event, viewer))
            .collect(),
    }
}

/// A logged `set_character` naming the viewer's own character comes back
/// masked. Everything else is copied as is.
fn redact(event: &ServerEvent, viewer: &PlayerId) -> ServerEvent {
    match event {
        ServerEvent::SetCharacter {
            player_id,
            timestamp,
            ..
        } if player_id == viewer => ServerEvent::SetCharacter {
            player_id: player_id.clone(),
            character: HIDDEN_CHARACTER.to_string(),
            text: String::new(),
            timestamp: *timestamp,
        },
        other => other.clone(),
    }
}

impl Room {
    /// Queues a snapshot request for `viewer`.
    ///
    /// Waits at most the configured accept timeout for queue space. If
    /// the request can't be queued (timeout, or the room is closed) the
    /// returned receiver is already closed.
    pub async fn request_snapshot(
        &self,
        viewer: &PlayerId,
    ) -> oneshot::Receiver<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        let Some(queue) = self.snapshots.lock().await.clone() else {
            return rx;
        };

        let request = SnapshotRequest {
            viewer: viewer.clone(),
            reply,
        };
        match timeout(self.config.snapshot_accept_timeout, queue.send(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!(room = %self.code, "snapshot actor gone"),
            Err(_) => warn!(room = %self.code, viewer = %viewer, "snapshot queue full"),
        }
        rx
    }

    /// Requests a snapshot and waits for it.
    ///
    /// # Errors
    /// `PlayerNotFound` if `viewer` isn't seated, `Unavailable` if the
    /// actor can't answer within the configured timeouts.
    pub async fn snapshot_for(
        &self,
        viewer: &PlayerId,
    ) -> Result<RoomSnapshot, RoomError> {
        if self.player(viewer).await.is_none() {
            return Err(RoomError::PlayerNotFound(viewer.clone()));
        }

        let rx = self.request_snapshot(viewer).await;
        match timeout(self.config.snapshot_reply_timeout, rx).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Err(RoomError::Unavailable(self.code.clone())),
            Err(_) => {
                warn!(room = %self.code, viewer = %viewer, "snapshot timed out");
                Err(RoomError::Unavailable(self.code.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::RoomConfig;

    fn started_room() -> (RoomData, Vec<PlayerId>) {
        let mut data = RoomData::default();
        let ids: Vec<PlayerId> = ["A", "B", "C"]
            .iter()
            .map(|name| data.add_player(name).unwrap().id)
            .collect();
        data.start();
        (data, ids)
    }

    #[test]
    fn test_snapshot_redacts_viewers_character_in_log() {
        let (mut data, ids) = started_room();
        let target = data.set_character(&ids[0], "Batman").unwrap();
        data.message_log
            .push(Arc::new(ServerEvent::set_character(&target, "Batman")));

        let code = RoomCode::from("ABC123");
        let for_b = build_snapshot(&code, &data, &ids[1]);
        match &for_b.messages[0] {
            ServerEvent::SetCharacter {
                character, text, ..
            } => {
                assert_eq!(character, HIDDEN_CHARACTER);
                assert!(text.is_empty());
            }
            other => panic!("expected set_character, got {other:?}"),
        }
        assert_eq!(for_b.characters[&ids[1]], HIDDEN_CHARACTER);

        let for_c = build_snapshot(&code, &data, &ids[2]);
        match &for_c.messages[0] {
            ServerEvent::SetCharacter {
                character, text, ..
            } => {
                assert_eq!(character, "Batman");
                assert_eq!(text, "B is a Batman");
            }
            other => panic!("expected set_character, got {other:?}"),
        }
        assert_eq!(for_c.characters[&ids[1]], "Batman");
    }

    #[test]
    fn test_snapshot_copies_other_events() {
        let (mut data, _) = started_room();
        data.message_log.push(Arc::new(ServerEvent::game_started()));
        let player = data.players[0].clone();
        data.message_log
            .push(Arc::new(ServerEvent::chat(&player, "hello".into())));

        let snapshot =
            build_snapshot(&RoomCode::from("ABC123"), &data, &player.id);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0], *data.message_log[0]);
        assert_eq!(snapshot.messages[1], *data.message_log[1]);
        assert!(snapshot.started);
        assert_eq!(snapshot.players.len(), 3);
    }

    #[tokio::test]
    async fn test_actor_answers_requests() {
        let (data, ids) = started_room();
        let code = RoomCode::from("ABC123");
        let queue = spawn_actor(code.clone(), Arc::new(RwLock::new(data)), 4);

        let (reply, rx) = oneshot::channel();
        queue
            .send(SnapshotRequest {
                viewer: ids[0].clone(),
                reply,
            })
            .await
            .unwrap();

        let snapshot = rx.await.unwrap();
        assert_eq!(snapshot.code, code);
        assert!(snapshot.started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_gives_up_when_queue_stays_full() {
        let config = RoomConfig {
            snapshot_queue: 1,
            snapshot_accept_timeout: Duration::from_millis(50),
            ..RoomConfig::default()
        };
        let room = Room::new(RoomCode::from("ABC123"), config);
        let viewer = room.add_player("A").await.unwrap().id;

        // The actor takes the first request and then blocks on the state
        // lock; the second fills the queue.
        let held = room.data.write().await;
        let first = room.request_snapshot(&viewer).await;
        let second = room.request_snapshot(&viewer).await;

        let asked = Instant::now();
        let third = room.request_snapshot(&viewer).await;
        assert!(asked.elapsed() >= Duration::from_millis(50));
        assert!(third.await.is_err());

        drop(held);
        assert_eq!(first.await.unwrap().players.len(), 1);
        assert_eq!(second.await.unwrap().players.len(), 1);
    }
}
