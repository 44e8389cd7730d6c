//! Wire protocol for tagmyhead.
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): what players send and
//!   what the server sends back.
//! - **Types** ([`PlayerId`], [`RoomCode`], [`Player`], [`GameState`],
//!   [`RoomSnapshot`]): identities and the views handed to clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Room (mutation, fan-out)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, EventTag, HIDDEN_CHARACTER, ServerEvent, unix_timestamp,
};
pub use types::{GameState, Player, PlayerId, RoomCode, RoomSnapshot};
