//! Room registry and auto-matchmaking.
//!
//! Rooms are values owned exclusively by the registry; handlers get
//! short-lived access to a room (and its game state) through [`RoomRegistry::with_room`]
//! while the registry lock is held. Game state is never copied or handed out.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::game::{GamePhase, GameState};

use super::SessionError;

/// Rooms hold exactly two players in this variant.
pub const ROOM_CAPACITY: usize = 2;

pub struct Room {
    id: String,
    members: Vec<String>,
    game: GameState,
}

impl Room {
    fn new(id: String) -> Self {
        Self {
            id,
            members: Vec::new(),
            game: GameState::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }
}

/// Result of a successful auto-match.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRoom {
    pub id: String,
    pub members: Vec<String>,
    pub room_full: bool,
}

/// Result of leaving a room.
#[derive(Clone, Debug, PartialEq)]
pub struct LeftRoom {
    pub id: String,
    /// Members still in the room after the departure.
    pub remaining: Vec<String>,
    pub destroyed: bool,
}

#[derive(Default)]
struct RoomsInner {
    rooms: HashMap<String, Room>,
    next_id: u64,
}

pub struct RoomRegistry {
    inner: Mutex<RoomsInner>,
    max_rooms: usize,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            inner: Mutex::new(RoomsInner::default()),
            max_rooms,
        }
    }

    /// Auto-matchmaking: joins a room that is waiting on a second player, or
    /// creates a fresh one. Fails only when the room limit is reached.
    pub fn join_any_available(&self, name: &str) -> Result<JoinedRoom, SessionError> {
        let mut inner = self.inner.lock().unwrap();

        let open_room = inner
            .rooms
            .values()
            .find(|room| {
                room.members.len() == 1
                    && room.game.phase() == GamePhase::Waiting
                    && !room.members.contains(&name.to_string())
            })
            .map(|room| room.id.clone());

        let room_id = match open_room {
            Some(id) => id,
            None => {
                if inner.rooms.len() >= self.max_rooms {
                    return Err(SessionError::RoomLimitReached);
                }
                inner.next_id += 1;
                let id = format!("ROOM_{}", inner.next_id);
                inner.rooms.insert(id.clone(), Room::new(id.clone()));
                tracing::info!(room = %id, "created room");
                id
            }
        };

        let room = inner
            .rooms
            .get_mut(&room_id)
            .expect("room looked up or inserted above");
        room.members.push(name.to_string());
        room.game
            .add_player(name)
            .expect("room was waiting with a free seat");
        tracing::info!(player = name, room = %room_id, "player joined room");

        Ok(JoinedRoom {
            id: room_id,
            members: room.members.clone(),
            room_full: room.is_full(),
        })
    }

    /// Removes a player from a room, destroying the room once empty.
    pub fn leave(&self, name: &str, room_id: &str) -> Result<LeftRoom, SessionError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(room) = inner.rooms.get_mut(room_id) else {
            return Err(SessionError::NotInRoom);
        };
        let Some(index) = room.members.iter().position(|m| m == name) else {
            return Err(SessionError::NotInRoom);
        };
        room.members.remove(index);
        room.game.remove_player(name);

        let remaining = room.members.clone();
        let destroyed = remaining.is_empty();
        if destroyed {
            inner.rooms.remove(room_id);
            tracing::info!(room = room_id, "destroyed empty room");
        }
        tracing::info!(player = name, room = room_id, "player left room");

        Ok(LeftRoom {
            id: room_id.to_string(),
            remaining,
            destroyed,
        })
    }

    /// Destroys a room outright, returning its members at destruction time.
    pub fn destroy(&self, room_id: &str) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rooms.remove(room_id) {
            Some(room) => {
                tracing::info!(room = room_id, "destroyed room");
                room.members
            }
            None => Vec::new(),
        }
    }

    /// Runs `f` against a room (and its game state) under the registry lock.
    /// Callers must not perform I/O inside `f`.
    pub fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        let mut inner = self.inner.lock().unwrap();
        inner.rooms.get_mut(room_id).map(f)
    }

    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(room_id)
            .map(|room| room.members.clone())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().unwrap().rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_join_creates_a_room() {
        let rooms = RoomRegistry::new(4);
        let joined = rooms.join_any_available("Alice").unwrap();
        assert_eq!(joined.id, "ROOM_1");
        assert_eq!(joined.members, vec!["Alice".to_string()]);
        assert!(!joined.room_full);
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn second_join_fills_the_open_room() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        let joined = rooms.join_any_available("Bob").unwrap();
        assert_eq!(joined.id, "ROOM_1");
        assert_eq!(
            joined.members,
            vec!["Alice".to_string(), "Bob".to_string()]
        );
        assert!(joined.room_full);
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn third_join_opens_a_second_room() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        rooms.join_any_available("Bob").unwrap();
        let joined = rooms.join_any_available("Carol").unwrap();
        assert_eq!(joined.id, "ROOM_2");
        assert!(!joined.room_full);
    }

    #[test]
    fn room_limit_is_enforced() {
        let rooms = RoomRegistry::new(1);
        rooms.join_any_available("Alice").unwrap();
        rooms.join_any_available("Bob").unwrap();
        assert_eq!(
            rooms.join_any_available("Carol"),
            Err(SessionError::RoomLimitReached)
        );
    }

    #[test]
    fn active_games_are_not_rejoinable() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        rooms.join_any_available("Bob").unwrap();
        rooms
            .with_room("ROOM_1", |room| room.game_mut().start())
            .unwrap()
            .unwrap();
        rooms.leave("Bob", "ROOM_1").unwrap();

        // ROOM_1 has one member but an active game; Carol gets a new room.
        let joined = rooms.join_any_available("Carol").unwrap();
        assert_eq!(joined.id, "ROOM_2");
    }

    #[test]
    fn leaving_last_member_destroys_room() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        let left = rooms.leave("Alice", "ROOM_1").unwrap();
        assert!(left.destroyed);
        assert!(left.remaining.is_empty());
        assert_eq!(rooms.room_count(), 0);
    }

    #[test]
    fn leaving_reports_remaining_members() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        rooms.join_any_available("Bob").unwrap();
        let left = rooms.leave("Alice", "ROOM_1").unwrap();
        assert!(!left.destroyed);
        assert_eq!(left.remaining, vec!["Bob".to_string()]);
    }

    #[test]
    fn leave_requires_membership() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        assert_eq!(
            rooms.leave("Bob", "ROOM_1"),
            Err(SessionError::NotInRoom)
        );
        assert_eq!(
            rooms.leave("Alice", "ROOM_9"),
            Err(SessionError::NotInRoom)
        );
    }

    #[test]
    fn destroyed_room_reports_final_members() {
        let rooms = RoomRegistry::new(4);
        rooms.join_any_available("Alice").unwrap();
        rooms.join_any_available("Bob").unwrap();
        let mut members = rooms.destroy("ROOM_1");
        members.sort();
        assert_eq!(members, vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(rooms.room_count(), 0);
    }
}
