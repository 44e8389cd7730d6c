//! Room session engine for tagmyhead.
//!
//! A room holds a handful of players in a seating order. Once the game
//! starts each player picks a secret character for the next player in
//! the ring, and everyone but the wearer gets to see it.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, finds, and evicts rooms
//! - [`Room`]: state, fan-out to connections, snapshots
//! - [`dispatch`]: applies one inbound message to a room
//! - [`RoomConfig`] / [`RegistryConfig`]: sizing and deadlines
//!
//! Each attached connection gets a bounded mailbox and two tasks: a send
//! pump that is the only writer to the transport, and a receive pump
//! that feeds the dispatcher. Pollers read rooms through a per-room
//! snapshot actor instead of touching the lock directly.

pub mod code;
mod config;
mod dispatch;
mod error;
mod game;
mod hub;
mod registry;
mod room;
mod snapshot;

pub use config::{RegistryConfig, RoomConfig};
pub use dispatch::{apply, dispatch};
pub use error::{DispatchError, RoomError};
pub use registry::RoomRegistry;
pub use room::Room;
