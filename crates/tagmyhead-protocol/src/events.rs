//! Inbound and outbound events.
//!
//! Every message on the wire is a JSON object with a `type`
//! discriminator. Inbound messages become a [`ClientEvent`]; everything
//! the server sends is a [`ServerEvent`].
//!
//! Inbound decoding happens in two steps: first only the discriminator is
//! read into an [`EventTag`], then the whole message is decoded again
//! into the body that tag calls for. Fields a client adds on its own
//! (a forged `playerId` on a chat message, say) are ignored. The sender's
//! identity always comes from the connection.

use serde::{Deserialize, Serialize};

use crate::{Codec, GameState, Player, PlayerId, ProtocolError};

/// What a player sees in place of their own character.
pub const HIDDEN_CHARACTER: &str = "?";

/// Current unix time in seconds, the `timestamp` of every logged event.
pub fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// The discriminator of an inbound message.
///
/// A closed set plus [`EventTag::Unknown`], so an unrecognised `type` is
/// handled explicitly rather than falling through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTag {
    Chat,
    Question,
    Answer,
    SetCharacter,
    AddWinner,
    RemovePlayer,
    MovePlayer,
    Ping,
    Guess,
    Unknown(String),
}

impl From<&str> for EventTag {
    fn from(tag: &str) -> Self {
        match tag {
            "chat" => Self::Chat,
            "question" => Self::Question,
            "answer" => Self::Answer,
            "set_character" => Self::SetCharacter,
            "add_winner" => Self::AddWinner,
            "remove_player" => Self::RemovePlayer,
            "move_player" => Self::MovePlayer,
            "ping" => Self::Ping,
            "guess" => Self::Guess,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A message from a connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Free-text chat.
    Chat { text: String },
    /// A yes/no question about the asker's own character.
    Question { text: String },
    /// An answer to someone's question.
    Answer { text: String },
    /// Sets the character of the player the sender is responsible for.
    SetCharacter { character: String },
    /// Marks a player as having won.
    #[serde(rename_all = "camelCase")]
    AddWinner { winner_id: PlayerId },
    /// Kicks a player out of the room.
    #[serde(rename_all = "camelCase")]
    RemovePlayer { removed_id: PlayerId },
    /// Moves a player to another seat, which changes the ring.
    #[serde(rename_all = "camelCase")]
    MovePlayer { player_id: PlayerId, index: usize },
    /// Application-level ping, answered with `pong` to the sender only.
    Ping,
    /// The sender's guess of their own character.
    Guess { character: String },
}

#[derive(Deserialize)]
struct TagHeader {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

#[derive(Deserialize)]
struct CharacterBody {
    character: String,
}

#[derive(Deserialize)]
struct WinnerBody {
    #[serde(rename = "winnerId")]
    winner_id: PlayerId,
}

#[derive(Deserialize)]
struct RemoveBody {
    #[serde(rename = "removedId")]
    removed_id: PlayerId,
}

#[derive(Deserialize)]
struct MoveBody {
    #[serde(rename = "playerId", alias = "playerName")]
    player_id: PlayerId,
    index: usize,
}

impl ClientEvent {
    /// Decodes raw inbound bytes.
    ///
    /// # Errors
    /// - [`ProtocolError::Decode`]: not an object with a string `type`,
    ///   or the body doesn't match the type.
    /// - [`ProtocolError::UnknownEventType`]: the `type` is not one of
    ///   the inbound events.
    pub fn decode<C: Codec>(
        codec: &C,
        data: &[u8],
    ) -> Result<Self, ProtocolError> {
        let header: TagHeader = codec.decode(data)?;

        let event = match EventTag::from(header.kind.as_str()) {
            EventTag::Chat => {
                let body: TextBody = codec.decode(data)?;
                Self::Chat { text: body.text }
            }
            EventTag::Question => {
                let body: TextBody = codec.decode(data)?;
                Self::Question { text: body.text }
            }
            EventTag::Answer => {
                let body: TextBody = codec.decode(data)?;
                Self::Answer { text: body.text }
            }
            EventTag::SetCharacter => {
                let body: CharacterBody = codec.decode(data)?;
                Self::SetCharacter {
                    character: body.character,
                }
            }
            EventTag::AddWinner => {
                let body: WinnerBody = codec.decode(data)?;
                Self::AddWinner {
                    winner_id: body.winner_id,
                }
            }
            EventTag::RemovePlayer => {
                let body: RemoveBody = codec.decode(data)?;
                Self::RemovePlayer {
                    removed_id: body.removed_id,
                }
            }
            EventTag::MovePlayer => {
                let body: MoveBody = codec.decode(data)?;
                Self::MovePlayer {
                    player_id: body.player_id,
                    index: body.index,
                }
            }
            EventTag::Ping => Self::Ping,
            EventTag::Guess => {
                let body: CharacterBody = codec.decode(data)?;
                Self::Guess {
                    character: body.character,
                }
            }
            EventTag::Unknown(kind) => {
                return Err(ProtocolError::UnknownEventType(kind));
            }
        };

        Ok(event)
    }

    /// The wire name of this event's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Question { .. } => "question",
            Self::Answer { .. } => "answer",
            Self::SetCharacter { .. } => "set_character",
            Self::AddWinner { .. } => "add_winner",
            Self::RemovePlayer { .. } => "remove_player",
            Self::MovePlayer { .. } => "move_player",
            Self::Ping => "ping",
            Self::Guess { .. } => "guess",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Everything the server sends to players.
///
/// Broadcast events are also appended to the room's message log, which
/// pollers read back through a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Seeds a newly attached connection.
    Init(GameState),

    #[serde(rename_all = "camelCase")]
    Join {
        player_id: PlayerId,
        player_name: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    Leave {
        player_id: PlayerId,
        player_name: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    Chat {
        player_id: PlayerId,
        player_name: String,
        text: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    Question {
        player_id: PlayerId,
        player_name: String,
        text: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        player_id: PlayerId,
        player_name: String,
        text: String,
        timestamp: i64,
    },

    /// `player_id` is the player the character belongs to.
    #[serde(rename_all = "camelCase")]
    SetCharacter {
        player_id: PlayerId,
        character: String,
        text: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    WinnerAdded {
        winner_id: PlayerId,
        text: String,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    PlayerRemoved {
        removed_id: PlayerId,
        player_name: String,
        text: String,
        timestamp: i64,
    },

    GameStarted {
        text: String,
        timestamp: i64,
    },

    Pong,

    #[serde(rename_all = "camelCase")]
    GuessResult {
        player_id: PlayerId,
        player_name: String,
        character: String,
        correct: bool,
        text: String,
        timestamp: i64,
    },

    Error {
        error: String,
        timestamp: i64,
    },
}

impl ServerEvent {
    pub fn join(player: &Player) -> Self {
        Self::Join {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn leave(player: &Player) -> Self {
        Self::Leave {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn chat(player: &Player, text: String) -> Self {
        Self::Chat {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            text,
            timestamp: unix_timestamp(),
        }
    }

    pub fn question(player: &Player, text: String) -> Self {
        Self::Question {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            text,
            timestamp: unix_timestamp(),
        }
    }

    pub fn answer(player: &Player, text: String) -> Self {
        Self::Answer {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            text,
            timestamp: unix_timestamp(),
        }
    }

    /// The announcement everyone except `target` receives.
    pub fn set_character(target: &Player, character: &str) -> Self {
        Self::SetCharacter {
            player_id: target.id.clone(),
            character: character.to_string(),
            text: format!("{} is a {}", target.name, character),
            timestamp: unix_timestamp(),
        }
    }

    /// The copy `target` receives: an assignment happened, nothing more.
    pub fn set_character_hidden(target: &PlayerId) -> Self {
        Self::SetCharacter {
            player_id: target.clone(),
            character: HIDDEN_CHARACTER.to_string(),
            text: String::new(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn winner_added(winner: &Player) -> Self {
        Self::WinnerAdded {
            winner_id: winner.id.clone(),
            text: format!("{} won the game!", winner.name),
            timestamp: unix_timestamp(),
        }
    }

    pub fn player_removed(player: &Player) -> Self {
        Self::PlayerRemoved {
            removed_id: player.id.clone(),
            player_name: player.name.clone(),
            text: format!("{} was removed from the game", player.name),
            timestamp: unix_timestamp(),
        }
    }

    pub fn game_started() -> Self {
        Self::GameStarted {
            text: "Game has started!".to_string(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn guess_result(player: &Player, character: String, correct: bool) -> Self {
        Self::GuessResult {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            text: format!("{} guessed: {}", player.name, character),
            character,
            correct,
            timestamp: unix_timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            timestamp: unix_timestamp(),
        }
    }

    /// The wire name of this event's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Chat { .. } => "chat",
            Self::Question { .. } => "question",
            Self::Answer { .. } => "answer",
            Self::SetCharacter { .. } => "set_character",
            Self::WinnerAdded { .. } => "winner_added",
            Self::PlayerRemoved { .. } => "player_removed",
            Self::GameStarted { .. } => "game_started",
            Self::Pong => "pong",
            Self::GuessResult { .. } => "guess_result",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
