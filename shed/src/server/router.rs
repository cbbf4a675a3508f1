//! Request dispatch and handlers.
//!
//! Handlers never touch sockets. Each one reads and mutates the registries,
//! then returns an ordered delivery plan; the connection layer executes the
//! plan after every lock is released. This keeps game logic synchronous and
//! testable without any networking.

use std::sync::Arc;

use crate::game::engine::{ReserveOutcome, Snapshot};
use crate::game::{Card, GameError, GamePhase};
use crate::net::messages::{Message, MessageType};

use super::players::{ConnectionId, PlayerRegistry};
use super::rooms::{Room, RoomRegistry};
use super::SessionError;

/// Names are bare identifiers: short, alphanumeric plus `_` and `-`.
const MAX_NAME_LEN: usize = 32;

/// Token clients send in place of a card list to play a face-down reserve.
const RESERVE_TOKEN: &str = "RESERVE";

/// Stand-in top card when the discard pile is empty; clients treat it as
/// "any card is valid".
const EMPTY_PILE_TOP: &str = "1S";

/// Where a handler wants a message delivered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeliveryMode {
    /// Send on the originating connection.
    Reply,
    /// Send on the named player's current connection, skipping them if
    /// disconnected.
    Targeted(String),
    /// Send to every other connected member of the room.
    Broadcast { room: String, exclude: String },
}

/// One entry of a handler's delivery plan.
#[derive(Clone, Debug)]
pub struct Outbound {
    pub mode: DeliveryMode,
    pub message: Message,
}

impl Outbound {
    pub fn reply(message: Message) -> Self {
        Self {
            mode: DeliveryMode::Reply,
            message,
        }
    }

    pub fn targeted(name: &str, message: Message) -> Self {
        Self {
            mode: DeliveryMode::Targeted(name.to_string()),
            message,
        }
    }

    pub fn broadcast(room: &str, exclude: &str, message: Message) -> Self {
        Self {
            mode: DeliveryMode::Broadcast {
                room: room.to_string(),
                exclude: exclude.to_string(),
            },
            message,
        }
    }
}

/// Dispatches parsed requests to handlers and assembles their plans.
pub struct Router {
    players: Arc<PlayerRegistry>,
    rooms: Arc<RoomRegistry>,
}

impl Router {
    pub fn new(players: Arc<PlayerRegistry>, rooms: Arc<RoomRegistry>) -> Self {
        Self { players, rooms }
    }

    /// Routes one raw frame from `connection`. Always returns a plan; hard
    /// protocol violations yield an ERROR reply carrying `disconnect=true`.
    pub fn process(&self, raw: &str, connection: ConnectionId) -> Vec<Outbound> {
        let msg = match Message::parse(raw) {
            Ok(msg) => msg,
            Err(error) => {
                tracing::warn!(%error, connection, "invalid frame");
                return vec![Outbound::reply(
                    Message::error("invalid message format").with_data("disconnect", "true"),
                )];
            }
        };
        tracing::debug!(msg_type = %msg.msg_type, connection, "routing request");

        match msg.msg_type {
            MessageType::Connect => self.handle_connect(&msg, connection),
            MessageType::Reconnect => self.handle_reconnect(&msg, connection),
            MessageType::Ping => self.with_sender(connection, |s| self.handle_ping(s)),
            MessageType::JoinRoom => self.with_sender(connection, |s| self.handle_join_room(s)),
            MessageType::LeaveRoom => self.with_sender(connection, |s| self.handle_leave_room(s)),
            MessageType::StartGame => self.with_sender(connection, |s| self.handle_start_game(s)),
            MessageType::PlayCards => {
                self.with_sender(connection, |s| self.handle_play_cards(&msg, s))
            }
            MessageType::PickupPile => self.with_sender(connection, |s| self.handle_pickup_pile(s)),
            other => {
                // A client pushing server-to-client types is off-protocol.
                tracing::warn!(msg_type = %other, connection, "unexpected message direction");
                vec![Outbound::reply(
                    Message::error("unknown message type").with_data("disconnect", "true"),
                )]
            }
        }
    }

    /// Resolves the sender for request types that require an established
    /// session.
    fn with_sender(
        &self,
        connection: ConnectionId,
        handler: impl FnOnce(&str) -> Vec<Outbound>,
    ) -> Vec<Outbound> {
        match self.players.name_of(connection) {
            Some(name) => handler(&name),
            None => error_reply(SessionError::MustConnectFirst),
        }
    }

    fn handle_connect(&self, msg: &Message, connection: ConnectionId) -> Vec<Outbound> {
        let name = msg.data("name").unwrap_or_default();
        if !valid_name(name) {
            return error_reply(SessionError::InvalidName);
        }
        match self.players.connect(name, connection) {
            Ok(()) => vec![Outbound::reply(
                Message::new(MessageType::Connected)
                    .with_player(name)
                    .with_data("name", name)
                    .with_data("status", "success"),
            )],
            Err(error) => error_reply(error),
        }
    }

    fn handle_reconnect(&self, msg: &Message, connection: ConnectionId) -> Vec<Outbound> {
        let name = msg.data("name").unwrap_or_default();
        if !valid_name(name) {
            return error_reply(SessionError::InvalidName);
        }
        if let Err(error) = self.players.reconnect(name, connection) {
            return error_reply(error);
        }

        let mut plan = vec![Outbound::reply(
            Message::new(MessageType::Connected)
                .with_player(name)
                .with_data("name", name)
                .with_data("status", "success"),
        )];

        let room = self.players.room_of(name);
        if !room.is_empty() {
            // Re-synchronise the returning player with the game in progress.
            let snapshot = self
                .rooms
                .with_room(&room, |r| {
                    if r.game().phase() == GamePhase::Active {
                        r.game().snapshot(name)
                    } else {
                        None
                    }
                })
                .flatten();
            if let Some(snapshot) = snapshot {
                plan.push(Outbound::targeted(
                    name,
                    game_state_message(&room, name, &snapshot),
                ));
            }
            for member in self.rooms.members_of(&room) {
                if member != name {
                    plan.push(Outbound::targeted(
                        &member,
                        Message::new(MessageType::PlayerReconnected)
                            .with_player(name)
                            .with_room(&room)
                            .with_data("reconnected_player", name)
                            .with_data("status", "reconnected"),
                    ));
                }
            }
        }
        plan
    }

    fn handle_ping(&self, sender: &str) -> Vec<Outbound> {
        self.players.update_last_ping(sender);
        vec![Outbound::reply(Message::new(MessageType::Pong))]
    }

    fn handle_join_room(&self, sender: &str) -> Vec<Outbound> {
        if !self.players.room_of(sender).is_empty() {
            return error_reply(SessionError::AlreadyInRoom);
        }
        let joined = match self.rooms.join_any_available(sender) {
            Ok(joined) => joined,
            Err(error) => return error_reply(error),
        };
        self.players.set_room(sender, &joined.id);

        let players_csv = joined.members.join(",");
        let reply = Message::new(MessageType::RoomJoined)
            .with_player(sender)
            .with_room(&joined.id)
            .with_data("status", "success")
            .with_data("players", &players_csv)
            .with_data("player_count", joined.members.len())
            .with_data("room_full", joined.room_full);
        let notice = Message::new(MessageType::RoomJoined)
            .with_player(sender)
            .with_room(&joined.id)
            .with_data("joined_player", sender)
            .with_data("players", &players_csv)
            .with_data("player_count", joined.members.len())
            .with_data("room_full", joined.room_full)
            .with_data("broadcast_type", "room_notification");

        vec![
            Outbound::reply(reply),
            Outbound::broadcast(&joined.id, sender, notice),
        ]
    }

    fn handle_leave_room(&self, sender: &str) -> Vec<Outbound> {
        let room = self.players.room_of(sender);
        if room.is_empty() {
            return error_reply(SessionError::NotInRoom);
        }
        let left = match self.rooms.leave(sender, &room) {
            Ok(left) => left,
            Err(error) => return error_reply(error),
        };
        self.players.clear_room(sender);

        let mut plan = vec![Outbound::reply(
            Message::new(MessageType::RoomLeft)
                .with_player(sender)
                .with_data("status", "left"),
        )];
        for member in &left.remaining {
            plan.push(Outbound::targeted(
                member,
                Message::new(MessageType::RoomLeft)
                    .with_player(sender)
                    .with_room(&room)
                    .with_data("status", "left")
                    .with_data("broadcast_type", "room_notification"),
            ));
        }
        plan
    }

    fn handle_start_game(&self, sender: &str) -> Vec<Outbound> {
        let room = self.players.room_of(sender);
        if room.is_empty() {
            return error_reply(SessionError::NotInRoom);
        }
        let result = self.rooms.with_room(&room, |r| {
            r.game_mut().start()?;
            Ok::<_, GameError>(member_snapshots(r))
        });
        match result {
            None => error_reply(SessionError::NotInRoom),
            Some(Err(error)) => error_reply(error),
            Some(Ok(snapshots)) => {
                tracing::info!(room = %room, by = sender, "game started");
                let started = Message::new(MessageType::GameStarted)
                    .with_room(&room)
                    .with_data("status", "started");
                let mut plan = vec![
                    Outbound::reply(started.clone()),
                    Outbound::broadcast(&room, sender, started),
                ];
                push_snapshots(&mut plan, &room, &snapshots);
                plan
            }
        }
    }

    fn handle_play_cards(&self, msg: &Message, sender: &str) -> Vec<Outbound> {
        let Some(cards_str) = msg.data("cards") else {
            return error_reply(GameError::NoCards);
        };
        let room = self.players.room_of(sender);
        if room.is_empty() {
            return error_reply(SessionError::NotInRoom);
        }

        let result = if cards_str == RESERVE_TOKEN {
            self.rooms.with_room(&room, |r| {
                let outcome = r.game_mut().play_from_reserve(sender)?;
                let result = match outcome {
                    ReserveOutcome::Played(_) => "play_success",
                    ReserveOutcome::PickedUp(_) => "pickup_success",
                };
                Ok::<_, GameError>((result, PostTurn::capture(r)))
            })
        } else {
            let cards = match parse_cards(cards_str) {
                Ok(cards) => cards,
                Err(reply) => return reply,
            };
            self.rooms.with_room(&room, |r| {
                r.game_mut().play_cards(sender, &cards)?;
                Ok::<_, GameError>(("play_success", PostTurn::capture(r)))
            })
        };

        match result {
            None => error_reply(SessionError::NotInRoom),
            Some(Err(error)) => error_reply(error),
            Some(Ok((result, post))) => self.finish_turn(sender, &room, result, post),
        }
    }

    fn handle_pickup_pile(&self, sender: &str) -> Vec<Outbound> {
        let room = self.players.room_of(sender);
        if room.is_empty() {
            return error_reply(SessionError::NotInRoom);
        }
        let result = self.rooms.with_room(&room, |r| {
            r.game_mut().pickup_pile(sender)?;
            Ok::<_, GameError>(PostTurn::capture(r))
        });
        match result {
            None => error_reply(SessionError::NotInRoom),
            Some(Err(error)) => error_reply(error),
            Some(Ok(post)) => self.finish_turn(sender, &room, "pickup_success", post),
        }
    }

    /// Shared tail of the turn handlers: TURN_RESULT reply, then either the
    /// end-of-game batch or fresh per-member snapshots.
    fn finish_turn(
        &self,
        sender: &str,
        room: &str,
        result: &str,
        post: PostTurn,
    ) -> Vec<Outbound> {
        let mut plan = vec![Outbound::reply(
            Message::new(MessageType::TurnResult)
                .with_player(sender)
                .with_room(room)
                .with_data("result", result)
                .with_data("status", "success"),
        )];

        if post.finished {
            let winner = post.winner.unwrap_or_default();
            tracing::info!(room = %room, winner = %winner, "game over");
            for member in &post.members {
                plan.push(Outbound::targeted(
                    member,
                    game_over_message(room, &winner, None),
                ));
                plan.push(Outbound::targeted(member, room_left_message(room, member)));
            }
            for member in self.rooms.destroy(room) {
                self.players.clear_room(&member);
            }
        } else {
            push_snapshots(&mut plan, room, &post.snapshots);
        }
        plan
    }
}

/// Everything the turn handlers need after mutating a game, captured while
/// the room lock is still held.
struct PostTurn {
    finished: bool,
    winner: Option<String>,
    members: Vec<String>,
    snapshots: Vec<(String, Snapshot)>,
}

impl PostTurn {
    fn capture(room: &Room) -> Self {
        let finished = room.game().phase() == GamePhase::Finished;
        Self {
            finished,
            winner: room.game().winner().map(str::to_string),
            members: room.members().to_vec(),
            snapshots: if finished {
                Vec::new()
            } else {
                member_snapshots(room)
            },
        }
    }
}

fn member_snapshots(room: &Room) -> Vec<(String, Snapshot)> {
    room.members()
        .iter()
        .filter_map(|member| {
            room.game()
                .snapshot(member)
                .map(|snapshot| (member.clone(), snapshot))
        })
        .collect()
}

fn push_snapshots(plan: &mut Vec<Outbound>, room: &str, snapshots: &[(String, Snapshot)]) {
    for (member, snapshot) in snapshots {
        plan.push(Outbound::targeted(
            member,
            game_state_message(room, member, snapshot),
        ));
    }
}

fn parse_cards(cards_str: &str) -> Result<Vec<Card>, Vec<Outbound>> {
    cards_str
        .split(',')
        .map(|token| token.trim().parse())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error: crate::game::entities::ParseCardError| {
            vec![Outbound::reply(Message::error(&error.to_string()))]
        })
}

fn error_reply(error: impl std::fmt::Display) -> Vec<Outbound> {
    vec![Outbound::reply(Message::error(&error.to_string()))]
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// GAME_STATE from one player's viewpoint.
pub(crate) fn game_state_message(room: &str, viewer: &str, snapshot: &Snapshot) -> Message {
    let hand = snapshot
        .hand
        .iter()
        .map(|card| card.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let top_card = snapshot
        .top_card
        .map(|card| card.to_string())
        .unwrap_or_else(|| EMPTY_PILE_TOP.to_string());

    let mut msg = Message::new(MessageType::GameState)
        .with_player(viewer)
        .with_room(room)
        .with_data("hand", hand)
        .with_data("reserves", snapshot.reserve_count)
        .with_data("top_card", top_card)
        .with_data("current_player", &snapshot.current_player)
        .with_data("your_turn", snapshot.your_turn)
        .with_data("must_play_low", snapshot.must_play_low)
        .with_data("deck_size", snapshot.deck_size)
        .with_data("discard_pile_size", snapshot.discard_pile_size);
    if let Some(opponent) = snapshot.opponents.first() {
        msg.set_data("opponent_name", &opponent.name);
        msg.set_data("opponent_hand", opponent.hand_size);
        msg.set_data("opponent_reserves", opponent.reserve_count);
    }
    msg
}

pub(crate) fn game_over_message(room: &str, winner: &str, reason: Option<&str>) -> Message {
    let mut msg = Message::new(MessageType::GameOver)
        .with_room(room)
        .with_data("winner", winner)
        .with_data("status", "game_over");
    if let Some(reason) = reason {
        msg.set_data("reason", reason);
    }
    msg
}

pub(crate) fn room_left_message(room: &str, player: &str) -> Message {
    Message::new(MessageType::RoomLeft)
        .with_player(player)
        .with_room(room)
        .with_data("status", "left")
}

pub(crate) fn player_disconnected_message(room: &str, player: &str, status: &str) -> Message {
    Message::new(MessageType::PlayerDisconnected)
        .with_player(player)
        .with_room(room)
        .with_data("disconnected_player", player)
        .with_data("status", status)
}
