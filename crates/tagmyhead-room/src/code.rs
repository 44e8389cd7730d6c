//! Short random codes for rooms and players.

use rand::Rng;
use tagmyhead_protocol::{PlayerId, RoomCode};

/// The symbols codes are drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Length of a player id.
pub const PLAYER_ID_LEN: usize = 8;

/// Draws `len` symbols from [`CODE_ALPHABET`].
///
/// `rand::rng()` is a ChaCha-based CSPRNG seeded from the OS and
/// reseeded periodically.
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// A fresh room code. Uniqueness is the registry's job.
pub fn room_code() -> RoomCode {
    RoomCode(generate_code(ROOM_CODE_LEN))
}

/// A fresh player id. Uniqueness within a room is the room's job.
pub fn player_id() -> PlayerId {
    PlayerId(generate_code(PLAYER_ID_LEN))
}

/// Returns `true` if `code` looks like something [`room_code`] produced.
pub fn is_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
