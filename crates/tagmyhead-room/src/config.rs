//! Room and registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Per-room settings: mailbox sizing, connection deadlines, and the
/// snapshot actor's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum players required to start the game.
    pub min_players: usize,

    /// Outbound events buffered per connection before new ones are
    /// dropped for that connection.
    pub mailbox_capacity: usize,

    /// Pending snapshot requests the actor queue holds.
    pub snapshot_queue: usize,

    /// Deadline for a single transport write.
    pub write_timeout: Duration,

    /// A connection with no inbound traffic (keep-alives included) for
    /// this long is dropped.
    pub read_idle_timeout: Duration,

    /// How often the send pump pings the peer.
    pub ping_interval: Duration,

    /// How long a snapshot request may wait for room in the actor queue.
    pub snapshot_accept_timeout: Duration,

    /// How long a caller waits for the actor's reply.
    pub snapshot_reply_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            mailbox_capacity: 256,
            snapshot_queue: 10,
            write_timeout: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
            snapshot_accept_timeout: Duration::from_secs(2),
            snapshot_reply_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Settings for the process-wide room registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Rooms older than this are evicted.
    pub room_ttl: Duration,

    /// How often the sweeper looks for expired rooms.
    pub sweep_interval: Duration,

    /// Settings every new room is created with.
    pub room: RoomConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            room: RoomConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.mailbox_capacity, 256);
        assert_eq!(config.snapshot_queue, 10);
        assert_eq!(config.read_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_registry_sweeps_well_inside_ttl() {
        let config = RegistryConfig::default();
        assert!(config.sweep_interval * 4 <= config.room_ttl);
    }
}
