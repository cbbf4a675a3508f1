//! Runs a complete bot-vs-bot match against an in-process server.
//!
//! Usage: `cargo run --example bot_match`
//!
//! Starts a server on an ephemeral port, connects two naive bots, and plays
//! until someone sheds their last card, printing each turn.

use std::thread;

use anyhow::{bail, Error};
use shed::messages::{Message, MessageType};
use shed::{Client, Server, ServerConfig};

struct View {
    hand: Vec<String>,
    reserves: usize,
    top_card: String,
    your_turn: bool,
    must_play_low: bool,
    discard_pile_size: usize,
    deck_size: usize,
}

impl View {
    fn from(msg: &Message) -> Self {
        Self {
            hand: msg
                .data("hand")
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            reserves: msg.data("reserves").unwrap_or("0").parse().unwrap_or(0),
            top_card: msg.data("top_card").unwrap_or_default().to_string(),
            your_turn: msg.data("your_turn") == Some("true"),
            must_play_low: msg.data("must_play_low") == Some("true"),
            discard_pile_size: msg
                .data("discard_pile_size")
                .unwrap_or("0")
                .parse()
                .unwrap_or(0),
            deck_size: msg.data("deck_size").unwrap_or("0").parse().unwrap_or(0),
        }
    }
}

fn card_value(card: &str) -> u8 {
    match &card[..card.len() - 1] {
        "A" => 1,
        "J" => 11,
        "Q" => 12,
        "K" => 13,
        n => n.parse().unwrap_or(0),
    }
}

fn is_playable(card: &str, view: &View) -> bool {
    if view.discard_pile_size == 0 {
        return true;
    }
    let value = card_value(card);
    let top = card_value(&view.top_card);
    if value == 2 || top == 2 {
        return true;
    }
    if view.must_play_low {
        return value <= 7;
    }
    value == 10 || value >= top
}

/// Lowest playable card, the blind reserve when the hand is out, or a pile
/// pickup when stuck.
fn act(client: &mut Client, view: &View) -> Result<(), Error> {
    if view.hand.is_empty() && view.reserves > 0 {
        println!("{} flips a reserve card", client.name);
        return client.play_cards(&["RESERVE"]);
    }
    let mut playable: Vec<&String> = view.hand.iter().filter(|c| is_playable(c, view)).collect();
    playable.sort_by_key(|c| card_value(c));
    match playable.first() {
        Some(card) => {
            println!(
                "{} plays {card} on {} (deck {})",
                client.name, view.top_card, view.deck_size
            );
            client.play_cards(&[card.as_str()])
        }
        None => {
            println!(
                "{} picks up {} cards",
                client.name, view.discard_pile_size
            );
            client.pickup_pile()
        }
    }
}

fn main() -> Result<(), Error> {
    let server = Server::bind(ServerConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    })?;
    let addr = server.local_addr()?;
    thread::spawn(move || server.run());

    let mut alice = Client::connect("Alice", &addr)?;
    let mut bob = Client::connect("Bob", &addr)?;

    alice.join_room()?;
    alice.recv_expect(MessageType::RoomJoined)?;
    bob.join_room()?;
    bob.recv_expect(MessageType::RoomJoined)?;
    alice.recv_expect(MessageType::RoomJoined)?;

    alice.start_game()?;
    alice.recv_expect(MessageType::GameStarted)?;
    let mut alice_view = View::from(&alice.recv_expect(MessageType::GameState)?);
    bob.recv_expect(MessageType::GameStarted)?;
    let mut bob_view = View::from(&bob.recv_expect(MessageType::GameState)?);

    for turn in 1.. {
        let alice_acts = alice_view.your_turn;
        let (actor, view, other) = if alice_acts {
            (&mut alice, &alice_view, &mut bob)
        } else {
            (&mut bob, &bob_view, &mut alice)
        };

        act(actor, view)?;
        actor.recv_expect(MessageType::TurnResult)?;

        let next = actor.recv()?;
        if next.msg_type == MessageType::GameOver {
            println!(
                "== {} wins after {turn} turns ==",
                next.data("winner").unwrap_or_default()
            );
            actor.recv_expect(MessageType::RoomLeft)?;
            other.recv_expect(MessageType::GameOver)?;
            other.recv_expect(MessageType::RoomLeft)?;
            return Ok(());
        }
        if next.msg_type != MessageType::GameState {
            bail!("unexpected message: {}", next.serialize());
        }

        let actor_next = View::from(&next);
        let other_next = View::from(&other.recv_expect(MessageType::GameState)?);
        if alice_acts {
            alice_view = actor_next;
            bob_view = other_next;
        } else {
            bob_view = actor_next;
            alice_view = other_next;
        }
    }
    Ok(())
}
