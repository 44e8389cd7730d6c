//! Error types for the room layer.

use tagmyhead_protocol::{PlayerId, ProtocolError, RoomCode};

/// Errors that can occur during room operations.
///
/// None of these are fatal to the room: each is reported to whoever made
/// the request and leaves room state untouched.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The player is not a member of the room.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// Another player in the room already uses this name.
    #[error("there is already a player named {0}")]
    NameTaken(String),

    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The operation is only allowed before the game starts.
    #[error("game already started")]
    AlreadyStarted,

    /// The operation needs a started game.
    #[error("game has not started")]
    NotStarted,

    /// Starting needs more players.
    #[error("need at least {required} players, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },

    /// The player has nobody to pick a character for.
    #[error("player {0} has no assignment")]
    NoAssignment(PlayerId),

    /// A seat index outside the roster.
    #[error("index {index} out of range for {len} players")]
    InvalidIndex { index: usize, len: usize },

    /// The room's snapshot actor didn't answer in time or is gone.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// The room has been torn down.
    #[error("room {0} is closed")]
    Closed(RoomCode),
}

/// Why an inbound message could not be applied.
///
/// Reported back to the sending connection as an `error` event; the
/// connection keeps running.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The bytes did not decode into a known event.
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    /// The event decoded but the room rejected it.
    #[error(transparent)]
    Room(#[from] RoomError),
}
