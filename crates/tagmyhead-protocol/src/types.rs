//! Identity types and the room views handed to clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ServerEvent;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for a player. Also the key of the player's
/// connection inside a room.
///
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The six character code that names a room (e.g. `K7Q2ZD`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Unique within the room.
    pub name: String,
    /// Set once the player has guessed their character.
    pub is_winner: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_winner: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// The state a freshly attached connection is seeded with.
///
/// `characters` never contains the viewer's own character: their entry
/// is `"?"` once assigned and absent before that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Player>,
    pub started: bool,
    pub characters: BTreeMap<PlayerId, String>,
    /// The player the viewer picks a character for.
    #[serde(rename = "opponentName")]
    pub opponent_name: Option<String>,
}

/// A consistent, viewer-scoped copy of a room, served to pollers.
///
/// Built by the room's snapshot actor. Redaction follows the same rule
/// as [`GameState`], and logged `set_character` events addressed to the
/// viewer carry `"?"` instead of the character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub players: Vec<Player>,
    pub started: bool,
    pub characters: BTreeMap<PlayerId, String>,
    pub messages: Vec<ServerEvent>,
}
