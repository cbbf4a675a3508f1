//! Heartbeat supervisor.
//!
//! One thread wakes every `heartbeat_check_interval` and scans the player
//! registry for two deadlines: ping timeouts (active player stops sending
//! PING → temporarily disconnected) and grace expiries (temporarily
//! disconnected player never came back → session destroyed, opponent wins).
//! All registry and room mutations happen first; the collected notifications
//! are sent only after every lock has been released.

use std::sync::Arc;

use crate::game::GamePhase;
use crate::net::messages::{Message, MessageType};

use super::connection::send_to_player;
use super::router;
use super::SharedState;

pub(crate) fn run(state: Arc<SharedState>) {
    let interval = state.config.heartbeat_check_interval;
    tracing::info!(
        timeout_secs = state.config.player_timeout.as_secs(),
        interval_secs = interval.as_secs(),
        grace_secs = state.config.grace_period.as_secs(),
        "heartbeat supervisor started"
    );
    while state.is_running() {
        // The condition variable wait doubles as the tick timer; shutdown
        // notifies it so the supervisor drains immediately.
        state.wait_for_shutdown(interval);
        if !state.is_running() {
            break;
        }
        tick(&state);
    }
    tracing::debug!("heartbeat supervisor stopped");
}

fn tick(state: &SharedState) {
    let mut outbox: Vec<(String, Message)> = Vec::new();
    check_ping_timeouts(state, &mut outbox);
    check_grace_expiries(state, &mut outbox);
    for (member, message) in outbox {
        send_to_player(state, &member, &message);
    }
}

/// Deadline one: connected players that stopped pinging move to the
/// temporarily-disconnected state, keeping their session and room.
fn check_ping_timeouts(state: &SharedState, outbox: &mut Vec<(String, Message)>) {
    for name in state.players.timed_out(state.config.player_timeout) {
        tracing::info!(player = %name, "ping timeout");
        state.players.mark_temp_disconnected(&name);

        let room = state.players.room_of(&name);
        if room.is_empty() {
            continue;
        }
        let notice = router::player_disconnected_message(&room, &name, "timed_out");
        for member in state.rooms.members_of(&room) {
            if member != name {
                outbox.push((member, notice.clone()));
            }
        }
    }
}

/// Deadline two: temporarily disconnected players whose absence outlived the
/// grace window lose their session. An active game ends with the remaining
/// member as winner and the room is destroyed.
fn check_grace_expiries(state: &SharedState, outbox: &mut Vec<(String, Message)>) {
    for name in state.players.grace_expired(state.config.grace_period) {
        tracing::info!(player = %name, "grace period expired");

        let room = state.players.room_of(&name);
        if !room.is_empty() {
            let room_view = state
                .rooms
                .with_room(&room, |r| (r.game().phase(), r.members().to_vec()));
            if let Some((phase, members)) = room_view {
                let remaining: Vec<String> =
                    members.into_iter().filter(|m| m != &name).collect();

                if phase == GamePhase::Active && !remaining.is_empty() {
                    let winner = remaining[0].clone();
                    for member in &remaining {
                        outbox.push((
                            member.clone(),
                            router::game_over_message(&room, &winner, Some("opponent_disconnect")),
                        ));
                        outbox.push((member.clone(), router::room_left_message(&room, member)));
                    }
                    for member in state.rooms.destroy(&room) {
                        state.players.clear_room(&member);
                    }
                } else {
                    // No game to decide; the absentee simply leaves the room
                    // (destroying it when empty) and any remaining member is
                    // told.
                    let _left = state.rooms.leave(&name, &room);
                    state.players.clear_room(&name);
                    for member in &remaining {
                        outbox.push((
                            member.clone(),
                            Message::new(MessageType::RoomLeft)
                                .with_player(&name)
                                .with_room(&room)
                                .with_data("status", "left")
                                .with_data("broadcast_type", "room_notification"),
                        ));
                    }
                }
            }
        }

        state.players.remove(&name);
    }
}
