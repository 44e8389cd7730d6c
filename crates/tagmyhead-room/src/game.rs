//! Pure room state and the rules that mutate it.
//!
//! [`RoomData`] knows nothing about locks, connections, or tasks. The
//! [`Room`](crate::Room) wraps it in a lock and turns each successful
//! mutation into a broadcast.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tagmyhead_protocol::{GameState, HIDDEN_CHARACTER, Player, PlayerId, ServerEvent};

use crate::RoomError;
use crate::code;

/// Everything a room remembers.
#[derive(Debug, Default)]
pub(crate) struct RoomData {
    /// Seating order. The ring follows it.
    pub(crate) players: Vec<Player>,
    /// Character per player, keyed by who wears it.
    pub(crate) characters: HashMap<PlayerId, String>,
    /// Picker → the player they choose a character for.
    pub(crate) turn_assignment: HashMap<PlayerId, PlayerId>,
    pub(crate) started: bool,
    /// Every broadcast event, in broadcast order.
    pub(crate) message_log: Vec<Arc<ServerEvent>>,
}

impl RoomData {
    pub(crate) fn index_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    pub(crate) fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    // -- membership ----------------------------------------------------------

    /// Seats a new player at the end of the roster.
    pub(crate) fn add_player(&mut self, name: &str) -> Result<Player, RoomError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::MissingField("name"));
        }
        if self.started {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(RoomError::NameTaken(name.to_string()));
        }

        let id = loop {
            let candidate = code::player_id();
            if self.index_of(&candidate).is_none() {
                break candidate;
            }
        };
        let player = Player::new(id, name);
        self.players.push(player.clone());
        Ok(player)
    }

    /// Removes a player and every trace of them. Returns the removed
    /// player, or `None` if they weren't seated.
    pub(crate) fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.index_of(id)?;
        let player = self.players.remove(index);

        self.characters.remove(id);
        self.turn_assignment.remove(id);
        self.turn_assignment.retain(|_, target| target != id);

        if self.started {
            self.assign_ring();
        }
        Some(player)
    }

    // -- game flow -----------------------------------------------------------

    /// Marks the game started and assigns the ring. Returns `false` if it
    /// had already started.
    pub(crate) fn start(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.assign_ring();
        true
    }

    /// Starts only if at least `min_players` are seated. Callers hold the
    /// write lock across the count and the start.
    pub(crate) fn start_with_min(&mut self, min_players: usize) -> Result<(), RoomError> {
        if self.started {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.len() < min_players {
            return Err(RoomError::NotEnoughPlayers {
                required: min_players,
                actual: self.players.len(),
            });
        }
        self.start();
        Ok(())
    }

    /// Each player picks for the next one in seating order, wrapping
    /// around. With fewer than two players nobody has anyone to pick for.
    pub(crate) fn assign_ring(&mut self) {
        self.turn_assignment.clear();
        let n = self.players.len();
        if n < 2 {
            return;
        }
        for (i, picker) in self.players.iter().enumerate() {
            let target = &self.players[(i + 1) % n];
            self.turn_assignment
                .insert(picker.id.clone(), target.id.clone());
        }
    }

    /// Moves a player to `target` by adjacent swaps, leaving everyone
    /// else in their relative order.
    pub(crate) fn move_player(
        &mut self,
        id: &PlayerId,
        target: usize,
    ) -> Result<(), RoomError> {
        let mut index = self
            .index_of(id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))?;
        let len = self.players.len();
        if target >= len {
            return Err(RoomError::InvalidIndex { index: target, len });
        }

        while index < target {
            self.players.swap(index, index + 1);
            index += 1;
        }
        while index > target {
            self.players.swap(index, index - 1);
            index -= 1;
        }

        if self.started {
            self.assign_ring();
        }
        Ok(())
    }

    /// Records `character` for whoever `picker` is assigned to. Returns
    /// the player who now wears it.
    pub(crate) fn set_character(
        &mut self,
        picker: &PlayerId,
        character: &str,
    ) -> Result<Player, RoomError> {
        let character = character.trim();
        if character.is_empty() {
            return Err(RoomError::MissingField("character"));
        }
        let target_id = match self.turn_assignment.get(picker) {
            Some(target) => target.clone(),
            None if !self.started => return Err(RoomError::NotStarted),
            None => return Err(RoomError::NoAssignment(picker.clone())),
        };
        let target = self
            .player(&target_id)
            .cloned()
            .ok_or(RoomError::PlayerNotFound(target_id))?;

        self.characters
            .insert(target.id.clone(), character.to_string());
        Ok(target)
    }

    /// Flags a winner. `Ok(None)` if they already were one.
    pub(crate) fn add_winner(
        &mut self,
        id: &PlayerId,
    ) -> Result<Option<Player>, RoomError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))?;
        if player.is_winner {
            return Ok(None);
        }
        player.is_winner = true;
        Ok(Some(player.clone()))
    }

    /// A guess is right only if a character is set and matches exactly.
    pub(crate) fn check_guess(&self, id: &PlayerId, guess: &str) -> bool {
        self.characters
            .get(id)
            .is_some_and(|character| character == guess)
    }

    // -- views ---------------------------------------------------------------

    /// Characters as `viewer` may see them: their own is masked.
    pub(crate) fn visible_characters(
        &self,
        viewer: &PlayerId,
    ) -> BTreeMap<PlayerId, String> {
        self.characters
            .iter()
            .map(|(owner, character)| {
                let shown = if owner == viewer {
                    HIDDEN_CHARACTER.to_string()
                } else {
                    character.clone()
                };
                (owner.clone(), shown)
            })
            .collect()
    }

    pub(crate) fn game_state_for(
        &self,
        viewer: &PlayerId,
    ) -> Result<GameState, RoomError> {
        let index = self
            .index_of(viewer)
            .ok_or_else(|| RoomError::PlayerNotFound(viewer.clone()))?;
        let n = self.players.len();
        let opponent_name =
            (n > 1).then(|| self.players[(index + 1) % n].name.clone());

        Ok(GameState {
            players: self.players.clone(),
            started: self.started,
            characters: self.visible_characters(viewer),
            opponent_name,
        })
    }
}
