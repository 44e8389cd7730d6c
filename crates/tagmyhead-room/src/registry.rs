//! Room registry: creates, finds, and retires rooms.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tagmyhead_protocol::RoomCode;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::{Room, code};

/// Every live room, keyed by code.
///
/// This is the entry point for room operations from higher layers (the
/// lobby facade and the WebSocket accept loop). The registry lock is
/// never held while calling into a room, except that a room's creation
/// happens under it so codes stay unique.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, Arc<Room>>>,
    config: RegistryConfig,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Creates a room under a fresh code and starts its snapshot actor.
    pub async fn create_room(&self) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = code::room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            debug!(room = %candidate, "room code collision, retrying");
        };

        let room = Room::new(code.clone(), self.config.room.clone());
        rooms.insert(code.clone(), Arc::clone(&room));
        info!(room = %code, rooms = rooms.len(), "room created");
        room
    }

    pub async fn get_room(&self, code: &RoomCode) -> Option<Arc<Room>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Tears a room down and forgets it. Returns `false` if no such room.
    pub async fn delete_room(&self, code: &RoomCode) -> bool {
        let Some(room) = self.get_room(code).await else {
            return false;
        };
        room.close().await;
        self.forget(&room).await;
        info!(room = %code, "room deleted");
        true
    }

    /// Retires every room older than the configured TTL. Each is torn
    /// down before it leaves the map. Returns the evicted codes.
    pub async fn evict_expired(&self) -> Vec<RoomCode> {
        let ttl = self.config.room_ttl;
        let expired: Vec<Arc<Room>> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|room| room.age() > ttl)
            .cloned()
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for room in expired {
            room.close().await;
            self.forget(&room).await;
            info!(room = %room.code(), age_secs = room.age().as_secs(), "room evicted");
            evicted.push(room.code().clone());
        }
        evicted
    }

    /// Starts the background sweeper. It runs `evict_expired` every
    /// sweep interval and stops once the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + period,
                period,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_expired().await;
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "sweep evicted rooms");
                }
            }
        })
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Removes `room` from the map if it is still the one registered
    /// under its code.
    async fn forget(&self, room: &Arc<Room>) {
        let mut rooms = self.rooms.write().await;
        if rooms
            .get(room.code())
            .is_some_and(|current| Arc::ptr_eq(current, room))
        {
            rooms.remove(room.code());
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_room() {
        let registry = RoomRegistry::default();
        let room = registry.create_room().await;
        assert!(code::is_room_code(room.code().as_str()));

        let found = registry.get_room(room.code()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &room));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_room() {
        let registry = RoomRegistry::default();
        assert!(registry.get_room(&RoomCode::from("ZZZZZZ")).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_room_closes_it() {
        let registry = RoomRegistry::default();
        let room = registry.create_room().await;

        assert!(registry.delete_room(room.code()).await);
        assert!(room.is_closed());
        assert!(registry.get_room(room.code()).await.is_none());
        assert!(!registry.delete_room(room.code()).await);
    }

    #[tokio::test]
    async fn test_evict_keeps_fresh_rooms() {
        let registry = RoomRegistry::default();
        registry.create_room().await;
        assert!(registry.evict_expired().await.is_empty());
        assert_eq!(registry.room_count().await, 1);
    }
}
