//! Player session registry.
//!
//! Two maps live under one mutex: name → session record and connection →
//! name. Mutating them together keeps the invariant that a live connection
//! always maps to a record with `connected = true` and a matching handle.
//! `last_ping` timestamps sit under their own mutex so the PING hot path
//! never contends with session mutations; neither lock is ever taken while
//! the other is held.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::SessionError;

/// Opaque handle for one accepted connection. Issued by the connection
/// manager; the registry never touches the socket itself.
pub type ConnectionId = u64;

/// Cloned view of a player's session record.
#[derive(Clone, Debug)]
pub struct PlayerRecord {
    pub name: String,
    pub room: String,
    pub connection: Option<ConnectionId>,
    pub connected: bool,
    pub temporarily_disconnected: bool,
}

#[derive(Debug)]
struct PlayerEntry {
    room: String,
    connection: Option<ConnectionId>,
    connected: bool,
    temporarily_disconnected: bool,
    disconnection_start: Option<Instant>,
}

#[derive(Default)]
struct Sessions {
    players: HashMap<String, PlayerEntry>,
    by_connection: HashMap<ConnectionId, String>,
}

#[derive(Default)]
pub struct PlayerRegistry {
    sessions: Mutex<Sessions>,
    last_ping: Mutex<HashMap<String, Instant>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new player bound to `connection`. Fails if the name is
    /// already registered, connected or not.
    pub fn connect(&self, name: &str, connection: ConnectionId) -> Result<(), SessionError> {
        {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.players.contains_key(name) {
                return Err(SessionError::NameTaken);
            }
            sessions.players.insert(
                name.to_string(),
                PlayerEntry {
                    room: String::new(),
                    connection: Some(connection),
                    connected: true,
                    temporarily_disconnected: false,
                    disconnection_start: None,
                },
            );
            sessions.by_connection.insert(connection, name.to_string());
        }
        self.stamp_ping(name);
        tracing::info!(player = name, "player connected");
        Ok(())
    }

    /// Rebinds a temporarily disconnected player to a new connection.
    pub fn reconnect(&self, name: &str, connection: ConnectionId) -> Result<(), SessionError> {
        {
            let mut sessions = self.sessions.lock().unwrap();
            let Some(entry) = sessions.players.get_mut(name) else {
                return Err(SessionError::ReconnectRefused);
            };
            if !entry.temporarily_disconnected {
                return Err(SessionError::ReconnectRefused);
            }
            entry.connection = Some(connection);
            entry.connected = true;
            entry.temporarily_disconnected = false;
            entry.disconnection_start = None;
            sessions.by_connection.insert(connection, name.to_string());
        }
        self.stamp_ping(name);
        tracing::info!(player = name, "player reconnected");
        Ok(())
    }

    /// Releases a player's connection but preserves the session, starting
    /// the grace clock.
    pub fn mark_temp_disconnected(&self, name: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let taken_connection = if let Some(entry) = sessions.players.get_mut(name) {
            let taken = entry.connection.take();
            entry.connected = false;
            entry.temporarily_disconnected = true;
            entry.disconnection_start = Some(Instant::now());
            tracing::info!(player = name, "player temporarily disconnected");
            taken
        } else {
            None
        };
        if let Some(connection) = taken_connection {
            sessions.by_connection.remove(&connection);
        }
    }

    /// Destroys a player record entirely.
    pub fn remove(&self, name: &str) {
        {
            let mut sessions = self.sessions.lock().unwrap();
            if let Some(entry) = sessions.players.remove(name) {
                if let Some(connection) = entry.connection {
                    sessions.by_connection.remove(&connection);
                }
                tracing::info!(player = name, "player removed");
            }
        }
        self.last_ping.lock().unwrap().remove(name);
    }

    pub fn name_of(&self, connection: ConnectionId) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .by_connection
            .get(&connection)
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<PlayerRecord> {
        let sessions = self.sessions.lock().unwrap();
        sessions.players.get(name).map(|entry| PlayerRecord {
            name: name.to_string(),
            room: entry.room.clone(),
            connection: entry.connection,
            connected: entry.connected,
            temporarily_disconnected: entry.temporarily_disconnected,
        })
    }

    pub fn connection_of(&self, name: &str) -> Option<ConnectionId> {
        let sessions = self.sessions.lock().unwrap();
        sessions.players.get(name).and_then(|entry| entry.connection)
    }

    pub fn set_room(&self, name: &str, room: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.players.get_mut(name) {
            entry.room = room.to_string();
        }
    }

    /// Empty string means the lobby.
    pub fn room_of(&self, name: &str) -> String {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .players
            .get(name)
            .map(|entry| entry.room.clone())
            .unwrap_or_default()
    }

    pub fn clear_room(&self, name: &str) {
        self.set_room(name, "");
    }

    /// Records activity for a player. No-op for unknown names.
    pub fn update_last_ping(&self, name: &str) {
        let known = self.sessions.lock().unwrap().players.contains_key(name);
        if known {
            self.stamp_ping(name);
        }
    }

    /// Names of connected players whose last ping is older than `timeout`.
    pub fn timed_out(&self, timeout: Duration) -> Vec<String> {
        let connected: Vec<String> = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .players
                .iter()
                .filter(|(_, entry)| entry.connected)
                .map(|(name, _)| name.clone())
                .collect()
        };
        let now = Instant::now();
        let pings = self.last_ping.lock().unwrap();
        connected
            .into_iter()
            .filter(|name| {
                pings
                    .get(name)
                    .is_some_and(|last| now.duration_since(*last) > timeout)
            })
            .collect()
    }

    /// Names of temporarily disconnected players whose absence has outlived
    /// the grace window.
    pub fn grace_expired(&self, grace: Duration) -> Vec<String> {
        let now = Instant::now();
        let sessions = self.sessions.lock().unwrap();
        sessions
            .players
            .iter()
            .filter(|(_, entry)| {
                entry.temporarily_disconnected
                    && entry
                        .disconnection_start
                        .is_some_and(|start| now.duration_since(start) > grace)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn members_of(&self, room: &str) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .players
            .iter()
            .filter(|(_, entry)| entry.room == room)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.sessions.lock().unwrap().players.len()
    }

    fn stamp_ping(&self, name: &str) {
        self.last_ping
            .lock()
            .unwrap()
            .insert(name.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_duplicate_names() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        assert_eq!(registry.connect("Alice", 2), Err(SessionError::NameTaken));
        // The losing connection must not steal the socket mapping.
        assert_eq!(registry.name_of(1).as_deref(), Some("Alice"));
        assert_eq!(registry.name_of(2), None);
    }

    #[test]
    fn duplicate_name_fails_even_while_disconnected() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.mark_temp_disconnected("Alice");
        assert_eq!(registry.connect("Alice", 2), Err(SessionError::NameTaken));
    }

    #[test]
    fn temp_disconnect_releases_connection_but_keeps_record() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.set_room("Alice", "ROOM_1");
        registry.mark_temp_disconnected("Alice");

        assert_eq!(registry.name_of(1), None);
        let record = registry.get("Alice").unwrap();
        assert!(!record.connected);
        assert!(record.temporarily_disconnected);
        assert_eq!(record.connection, None);
        assert_eq!(record.room, "ROOM_1");
    }

    #[test]
    fn reconnect_requires_temp_disconnected_state() {
        let registry = PlayerRegistry::new();
        assert_eq!(
            registry.reconnect("Ghost", 1),
            Err(SessionError::ReconnectRefused)
        );

        registry.connect("Alice", 1).unwrap();
        assert_eq!(
            registry.reconnect("Alice", 2),
            Err(SessionError::ReconnectRefused)
        );

        registry.mark_temp_disconnected("Alice");
        registry.reconnect("Alice", 2).unwrap();
        let record = registry.get("Alice").unwrap();
        assert!(record.connected);
        assert!(!record.temporarily_disconnected);
        assert_eq!(record.connection, Some(2));
        assert_eq!(registry.name_of(2).as_deref(), Some("Alice"));
    }

    #[test]
    fn remove_clears_both_maps() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.remove("Alice");
        assert!(registry.get("Alice").is_none());
        assert_eq!(registry.name_of(1), None);
        assert_eq!(registry.player_count(), 0);
    }

    #[test]
    fn room_assignment_roundtrip() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        assert_eq!(registry.room_of("Alice"), "");
        registry.set_room("Alice", "ROOM_1");
        assert_eq!(registry.room_of("Alice"), "ROOM_1");
        registry.clear_room("Alice");
        assert_eq!(registry.room_of("Alice"), "");
    }

    #[test]
    fn timed_out_reports_only_stale_connected_players() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.connect("Bob", 2).unwrap();
        registry.mark_temp_disconnected("Bob");

        assert!(registry.timed_out(Duration::from_secs(60)).is_empty());
        let stale = registry.timed_out(Duration::ZERO);
        assert_eq!(stale, vec!["Alice".to_string()]);
    }

    #[test]
    fn grace_expired_reports_only_long_absences() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.connect("Bob", 2).unwrap();
        registry.mark_temp_disconnected("Alice");

        assert!(registry.grace_expired(Duration::from_secs(60)).is_empty());
        assert_eq!(
            registry.grace_expired(Duration::ZERO),
            vec!["Alice".to_string()]
        );
    }

    #[test]
    fn members_of_scans_room_assignments() {
        let registry = PlayerRegistry::new();
        registry.connect("Alice", 1).unwrap();
        registry.connect("Bob", 2).unwrap();
        registry.connect("Carol", 3).unwrap();
        registry.set_room("Alice", "ROOM_1");
        registry.set_room("Bob", "ROOM_1");

        let mut members = registry.members_of("ROOM_1");
        members.sort();
        assert_eq!(members, vec!["Alice".to_string(), "Bob".to_string()]);
    }
}
