//! Turns inbound bytes into room operations.

use tagmyhead_protocol::{ClientEvent, JsonCodec, Player, ServerEvent};
use tracing::debug;

use crate::{DispatchError, Room, RoomError};

/// Decodes `data` from `sender` and applies it to `room`.
///
/// # Errors
/// Decode failures and rejected operations. The caller reports them to
/// the sender only; nothing is broadcast for a failed message.
pub async fn dispatch(
    room: &Room,
    sender: &Player,
    data: &[u8],
) -> Result<(), DispatchError> {
    let event = ClientEvent::decode(&JsonCodec, data)?;
    apply(room, sender, event).await
}

/// Applies an already decoded event.
pub async fn apply(
    room: &Room,
    sender: &Player,
    event: ClientEvent,
) -> Result<(), DispatchError> {
    if room.player(&sender.id).await.is_none() {
        return Err(RoomError::PlayerNotFound(sender.id.clone()).into());
    }
    debug!(room = %room.code(), player_id = %sender.id, kind = event.kind(), "dispatching");

    match event {
        ClientEvent::Chat { text } => {
            room.broadcast(ServerEvent::chat(sender, text)).await;
        }
        ClientEvent::Question { text } => {
            room.broadcast(ServerEvent::question(sender, text)).await;
        }
        ClientEvent::Answer { text } => {
            room.broadcast(ServerEvent::answer(sender, text)).await;
        }
        ClientEvent::SetCharacter { character } => {
            room.set_character(&sender.id, &character).await?;
        }
        ClientEvent::AddWinner { winner_id } => {
            room.add_winner(&winner_id).await?;
        }
        ClientEvent::RemovePlayer { removed_id } => {
            if !room.remove_player_with_notification(&removed_id).await {
                return Err(RoomError::PlayerNotFound(removed_id).into());
            }
        }
        ClientEvent::MovePlayer { player_id, index } => {
            room.move_player(&player_id, index).await?;
        }
        ClientEvent::Ping => {
            room.send_to(&sender.id, ServerEvent::Pong).await;
        }
        ClientEvent::Guess { character } => {
            room.guess(sender, character).await;
        }
    }
    Ok(())
}
