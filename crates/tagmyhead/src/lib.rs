//! # tagmyhead
//!
//! Realtime room server for a party guessing game: everyone wears a
//! secret character picked by the player before them in the ring, and
//! tries to guess it from the others' answers.
//!
//! Browsers attach over WebSocket at `/ws/{code}/{playerId}`; a routing
//! layer manages rooms through the [`Lobby`](api::Lobby).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tagmyhead::prelude::*;
//!
//! # async fn start() -> Result<(), TagmyheadError> {
//! let server = TagmyheadServer::builder().bind("0.0.0.0:8080").build().await?;
//! let lobby = server.lobby();
//! let code = lobby.create_room().await;
//! # let _ = code;
//! server.run().await
//! # }
//! ```

pub mod api;
mod error;
mod handler;
mod server;

pub use error::TagmyheadError;
pub use server::{DEFAULT_ADDR, TagmyheadServer, TagmyheadServerBuilder};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::api::{ApiError, ErrorBody, Lobby};
    pub use crate::{TagmyheadError, TagmyheadServer, TagmyheadServerBuilder};
    pub use tagmyhead_protocol::{
        ClientEvent, GameState, Player, PlayerId, RoomCode, RoomSnapshot,
        ServerEvent,
    };
    pub use tagmyhead_room::{RegistryConfig, Room, RoomConfig, RoomError, RoomRegistry};
}
