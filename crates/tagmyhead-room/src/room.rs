//! The room: shared state behind a lock plus its live connections.
//!
//! Every mutation takes the state lock, applies a rule from
//! [`RoomData`], releases the lock, and only then fans the resulting
//! event out. No lock is ever held across a network write.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tagmyhead_protocol::{GameState, Player, PlayerId, RoomCode, ServerEvent};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::RoomError;
use crate::config::RoomConfig;
use crate::game::RoomData;
use crate::hub::ConnectionHandle;
use crate::snapshot::{self, SnapshotRequest};

/// One game session.
///
/// Always handled as `Arc<Room>`: the registry, the snapshot actor's
/// callers, and every receive pump hold a reference.
pub struct Room {
    pub(crate) code: RoomCode,
    pub(crate) created_at: Instant,
    pub(crate) config: RoomConfig,
    pub(crate) data: Arc<RwLock<RoomData>>,
    pub(crate) connections: RwLock<HashMap<PlayerId, ConnectionHandle>>,
    /// Serializes broadcasts so mailboxes receive them in log order.
    pub(crate) fan_out: Mutex<()>,
    pub(crate) snapshots: Mutex<Option<mpsc::Sender<SnapshotRequest>>>,
    pub(crate) closed: AtomicBool,
}

impl Room {
    /// Creates an empty room and starts its snapshot actor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(code: RoomCode, config: RoomConfig) -> Arc<Self> {
        let data = Arc::new(RwLock::new(RoomData::default()));
        let snapshots = snapshot::spawn_actor(
            code.clone(),
            Arc::clone(&data),
            config.snapshot_queue,
        );
        debug!(room = %code, "room created");

        Arc::new(Self {
            code,
            created_at: Instant::now(),
            config,
            data,
            connections: RwLock::new(HashMap::new()),
            fan_out: Mutex::new(()),
            snapshots: Mutex::new(Some(snapshots)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the room was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // =====================================================================
    // Reads
    // =====================================================================

    pub async fn player(&self, id: &PlayerId) -> Option<Player> {
        self.data.read().await.player(id).cloned()
    }

    /// Players in seating order.
    pub async fn players(&self) -> Vec<Player> {
        self.data.read().await.players.clone()
    }

    pub async fn player_count(&self) -> usize {
        self.data.read().await.players.len()
    }

    pub async fn is_started(&self) -> bool {
        self.data.read().await.started
    }

    /// Who `picker` chooses a character for, if anyone.
    pub async fn turn_target(&self, picker: &PlayerId) -> Option<PlayerId> {
        self.data.read().await.turn_assignment.get(picker).cloned()
    }

    pub async fn turn_assignment(&self) -> HashMap<PlayerId, PlayerId> {
        self.data.read().await.turn_assignment.clone()
    }

    /// The unredacted character of `id`.
    pub async fn character_of(&self, id: &PlayerId) -> Option<String> {
        self.data.read().await.characters.get(id).cloned()
    }

    /// Every broadcast so far, unredacted.
    pub async fn message_log(&self) -> Vec<ServerEvent> {
        self.data
            .read()
            .await
            .message_log
            .iter()
            .map(|event| ServerEvent::clone(event))
            .collect()
    }

    /// The view a connection for `viewer` is seeded with.
    pub async fn game_state_for(
        &self,
        viewer: &PlayerId,
    ) -> Result<GameState, RoomError> {
        self.data.read().await.game_state_for(viewer)
    }

    // =====================================================================
    // Membership
    // =====================================================================

    /// Seats a new player. Rejected once the game has started.
    pub async fn add_player(&self, name: &str) -> Result<Player, RoomError> {
        let player = self.data.write().await.add_player(name)?;
        info!(room = %self.code, player_id = %player.id, name = %player.name, "player joined");
        Ok(player)
    }

    /// Removes a player from the game state only. Nobody is told and any
    /// connection stays attached; use
    /// [`remove_player_with_notification`](Self::remove_player_with_notification)
    /// to also sever it. Returns `false` if they weren't seated.
    pub async fn remove_player(&self, id: &PlayerId) -> bool {
        let removed = self.data.write().await.remove_player(id);
        match removed {
            Some(player) => {
                info!(room = %self.code, player_id = %player.id, "player removed");
                true
            }
            None => false,
        }
    }

    /// Removes a player and announces it to everyone still connected.
    pub async fn remove_player_with_notification(&self, id: &PlayerId) -> bool {
        let removed = self.data.write().await.remove_player(id);
        let Some(player) = removed else {
            return false;
        };
        info!(room = %self.code, player_id = %player.id, "player removed");

        // The removed player hears about it before their connection goes.
        self.broadcast(ServerEvent::player_removed(&player)).await;
        self.detach(id).await;
        true
    }

    // =====================================================================
    // Game flow
    // =====================================================================

    /// Starts the game and assigns the ring. The start is announced the
    /// first time only; later calls return `false`.
    pub async fn start_game(&self) -> bool {
        let started = self.data.write().await.start();
        if started {
            info!(room = %self.code, "game started");
            self.broadcast(ServerEvent::game_started()).await;
        }
        started
    }

    /// Starts the game if at least `min_players` are seated, checking and
    /// starting under a single write lock.
    pub async fn start_game_with_min(&self, min_players: usize) -> Result<(), RoomError> {
        self.data.write().await.start_with_min(min_players)?;
        info!(room = %self.code, "game started");
        self.broadcast(ServerEvent::game_started()).await;
        Ok(())
    }

    /// Moves a player to seat `index`.
    pub async fn move_player(
        &self,
        id: &PlayerId,
        index: usize,
    ) -> Result<(), RoomError> {
        self.data.write().await.move_player(id, index)?;
        debug!(room = %self.code, player_id = %id, index, "player moved");
        Ok(())
    }

    /// `picker` names the character of whoever they are assigned to.
    ///
    /// Everyone but the target hears the character. The target only
    /// learns that one was set.
    pub async fn set_character(
        &self,
        picker: &PlayerId,
        character: &str,
    ) -> Result<(), RoomError> {
        let (target, character) = {
            let mut data = self.data.write().await;
            let target = data.set_character(picker, character)?;
            let character = data
                .characters
                .get(&target.id)
                .cloned()
                .unwrap_or_default();
            (target, character)
        };
        debug!(room = %self.code, picker = %picker, target = %target.id, "character set");

        self.broadcast_except(
            ServerEvent::set_character(&target, &character),
            &target.id,
        )
        .await;
        self.send_to(&target.id, ServerEvent::set_character_hidden(&target.id))
            .await;
        Ok(())
    }

    /// Flags `id` as a winner. Announced once; returns `false` if they
    /// already were one.
    pub async fn add_winner(&self, id: &PlayerId) -> Result<bool, RoomError> {
        let newly = self.data.write().await.add_winner(id)?;
        match newly {
            Some(winner) => {
                info!(room = %self.code, player_id = %winner.id, "winner added");
                self.broadcast(ServerEvent::winner_added(&winner)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Checks `player`'s guess and broadcasts the result.
    pub async fn guess(&self, player: &Player, character: String) -> bool {
        let correct = self.data.read().await.check_guess(&player.id, &character);
        self.broadcast(ServerEvent::guess_result(player, character, correct))
            .await;
        correct
    }

    // =====================================================================
    // Teardown
    // =====================================================================

    /// Shuts the room down: every mailbox is closed (their send pumps
    /// drain and close the transport), the connection table is emptied,
    /// and the snapshot actor is stopped. Later attaches are refused and
    /// later snapshot requests fail as unavailable.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, handle)| handle).collect()
        };
        let closed = handles.len();
        drop(handles);

        self.snapshots.lock().await.take();
        info!(room = %self.code, connections = closed, "room closed");
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("code", &self.code)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
