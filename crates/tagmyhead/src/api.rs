//! The lobby: what a request-routing layer calls to manage rooms.
//!
//! Every failure comes back as an [`ApiError`] carrying the HTTP status
//! a router should answer with.

use std::sync::Arc;

use serde::Serialize;
use tagmyhead_protocol::{GameState, Player, PlayerId, RoomCode, RoomSnapshot};
use tagmyhead_room::{Room, RoomError, RoomRegistry};
use tracing::info;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A room error as seen from outside the engine.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] RoomError);

impl ApiError {
    /// The HTTP status for this error.
    pub fn status(&self) -> u16 {
        match &self.0 {
            RoomError::MissingField(_)
            | RoomError::NotEnoughPlayers { .. }
            | RoomError::InvalidIndex { .. } => 400,
            RoomError::PlayerNotFound(_) => 403,
            RoomError::NotFound(_) | RoomError::Closed(_) => 404,
            RoomError::NameTaken(_)
            | RoomError::AlreadyStarted
            | RoomError::NotStarted
            | RoomError::NoAssignment(_) => 409,
            RoomError::Unavailable(_) => 503,
        }
    }

    /// The JSON body a router sends along with [`status`](Self::status).
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.0.to_string(),
        }
    }

    pub fn room_error(&self) -> &RoomError {
        &self.0
    }

    pub fn into_room_error(self) -> RoomError {
        self.0
    }
}

/// `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// Room management facade over a shared [`RoomRegistry`].
///
/// Cheap to clone; every clone sees the same rooms.
#[derive(Clone)]
pub struct Lobby {
    registry: Arc<RoomRegistry>,
}

impl Lobby {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Opens a new, empty room.
    pub async fn create_room(&self) -> RoomCode {
        self.registry.create_room().await.code().clone()
    }

    /// Seats a player named `name` in room `code`.
    ///
    /// # Errors
    /// 404 for an unknown room, 400 for an empty name, 409 if the name is
    /// taken or the game has started.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        name: &str,
    ) -> Result<Player, ApiError> {
        let room = self.room(code).await?;
        Ok(room.add_player(name).await?)
    }

    /// Starts the game in room `code`.
    ///
    /// # Errors
    /// 404 for an unknown room, 400 with too few players, 409 if it has
    /// already started.
    pub async fn start_game(&self, code: &RoomCode) -> Result<(), ApiError> {
        let room = self.room(code).await?;
        room.start_game_with_min(room.config().min_players).await?;
        Ok(())
    }

    /// A consistent, redacted copy of the room for `player_id`.
    ///
    /// # Errors
    /// 404 for an unknown room, 403 if the player isn't seated there,
    /// 503 if the room can't answer in time.
    pub async fn room_snapshot(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<RoomSnapshot, ApiError> {
        let room = self.room(code).await?;
        Ok(room.snapshot_for(player_id).await?)
    }

    /// The state a client is seeded with, read directly from the room.
    pub async fn game_state(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<GameState, ApiError> {
        let room = self.room(code).await?;
        Ok(room.game_state_for(player_id).await?)
    }

    /// Closes room `code` and disconnects everyone in it.
    pub async fn delete_room(&self, code: &RoomCode) -> Result<(), ApiError> {
        if !self.registry.delete_room(code).await {
            return Err(RoomError::NotFound(code.clone()).into());
        }
        info!(room = %code, "room deleted via lobby");
        Ok(())
    }

    async fn room(&self, code: &RoomCode) -> Result<Arc<Room>, ApiError> {
        self.registry
            .get_room(code)
            .await
            .ok_or_else(|| RoomError::NotFound(code.clone()).into())
    }
}
