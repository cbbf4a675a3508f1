/// Integration tests for game flow scenarios.
///
/// These verify the dealt game state, turn handling over the wire, and the
/// end-of-game paths (played out and opponent-disconnect), with a real
/// server on an ephemeral port and two blocking clients.
use std::{net::SocketAddr, thread, time::Duration};

use shed::messages::{Message, MessageType};
use shed::{Client, Server, ServerConfig};

fn test_config() -> ServerConfig {
    ServerConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

/// Connects Alice and Bob, pairs them into ROOM_1, starts the game, and
/// returns both clients with their initial game views.
fn setup_game(addr: &SocketAddr) -> (Client, View, Client, View) {
    let mut alice = Client::connect("Alice", addr).unwrap();
    let mut bob = Client::connect("Bob", addr).unwrap();

    alice.join_room().unwrap();
    alice.recv_expect(MessageType::RoomJoined).unwrap();
    bob.join_room().unwrap();
    bob.recv_expect(MessageType::RoomJoined).unwrap();
    alice.recv_expect(MessageType::RoomJoined).unwrap();

    alice.start_game().unwrap();
    alice.recv_expect(MessageType::GameStarted).unwrap();
    let alice_view = View::from(&alice.recv_expect(MessageType::GameState).unwrap());
    bob.recv_expect(MessageType::GameStarted).unwrap();
    let bob_view = View::from(&bob.recv_expect(MessageType::GameState).unwrap());

    (alice, alice_view, bob, bob_view)
}

/// One player's parsed GAME_STATE.
#[derive(Clone, Debug)]
struct View {
    hand: Vec<String>,
    reserves: usize,
    top_card: String,
    current_player: String,
    your_turn: bool,
    must_play_low: bool,
    deck_size: usize,
    discard_pile_size: usize,
}

impl View {
    fn from(msg: &Message) -> Self {
        let hand: Vec<String> = msg
            .data("hand")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            hand,
            reserves: msg.data("reserves").unwrap().parse().unwrap(),
            top_card: msg.data("top_card").unwrap().to_string(),
            current_player: msg.data("current_player").unwrap().to_string(),
            your_turn: msg.data("your_turn").unwrap() == "true",
            must_play_low: msg.data("must_play_low").unwrap() == "true",
            deck_size: msg.data("deck_size").unwrap().parse().unwrap(),
            discard_pile_size: msg.data("discard_pile_size").unwrap().parse().unwrap(),
        }
    }
}

fn card_value(card: &str) -> u8 {
    match &card[..card.len() - 1] {
        "A" => 1,
        "J" => 11,
        "Q" => 12,
        "K" => 13,
        n => n.parse().unwrap(),
    }
}

/// Client-side mirror of the play rule, used to pick a legal move.
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
    if value == 10 {
        return true;
    }
    value >= top
}

enum Move {
    Play(String),
    Reserve,
    Pickup,
}

fn choose_move(view: &View) -> Move {
    if view.hand.is_empty() {
        return if view.reserves > 0 {
            Move::Reserve
        } else {
            // Should have won already.
            Move::Pickup
        };
    }
    let mut playable: Vec<&String> = view.hand.iter().filter(|c| is_playable(c, view)).collect();
    playable.sort_by_key(|c| card_value(c));
    match playable.first() {
        Some(card) => Move::Play((*card).clone()),
        None => Move::Pickup,
    }
}

#[test]
fn game_start_deals_full_views() {
    let addr = start_server(test_config());
    let (_alice, alice_view, _bob, bob_view) = setup_game(&addr);

    for view in [&alice_view, &bob_view] {
        assert_eq!(view.hand.len(), 3);
        assert_eq!(view.reserves, 3);
        // 52 cards minus two deals of 3+3 minus the flipped top card.
        assert_eq!(view.deck_size, 39);
        assert_eq!(view.discard_pile_size, 1);
        assert!(!view.top_card.is_empty());
        assert_eq!(view.current_player, "Alice");
        assert!(!view.must_play_low);
    }
    assert!(alice_view.your_turn);
    assert!(!bob_view.your_turn);
}

#[test]
fn picking_up_the_flip_card() {
    let addr = start_server(test_config());
    let (mut alice, _, mut bob, _) = setup_game(&addr);

    // Alice moves first; picking up the single flipped card is always legal.
    alice.pickup_pile().unwrap();
    let result = alice.recv_expect(MessageType::TurnResult).unwrap();
    assert_eq!(result.data("result"), Some("pickup_success"));
    assert_eq!(result.data("status"), Some("success"));

    let alice_view = View::from(&alice.recv_expect(MessageType::GameState).unwrap());
    let bob_view = View::from(&bob.recv_expect(MessageType::GameState).unwrap());

    // No draw on pickup: the hand absorbed the pile.
    assert_eq!(alice_view.hand.len(), 4);
    assert_eq!(alice_view.discard_pile_size, 0);
    assert_eq!(alice_view.top_card, "1S");
    assert_eq!(alice_view.deck_size, 39);
    assert!(!alice_view.your_turn);
    assert_eq!(bob_view.current_player, "Bob");
    assert!(bob_view.your_turn);
}

#[test]
fn playing_out_of_turn_is_rejected() {
    let addr = start_server(test_config());
    let (_alice, _, mut bob, bob_view) = setup_game(&addr);

    bob.play_cards(&[&bob_view.hand[0]]).unwrap();
    let error = bob.recv_error().unwrap();
    assert_eq!(error, "not your turn");
}

#[test]
fn claiming_a_card_not_in_hand_is_rejected() {
    let addr = start_server(test_config());
    let (mut alice, alice_view, _bob, _) = setup_game(&addr);

    // Find some card Alice does not hold.
    let suits = ["H", "D", "C", "S"];
    let ranks = ["A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K"];
    let absent = suits
        .iter()
        .flat_map(|s| ranks.iter().map(move |r| format!("{r}{s}")))
        .find(|card| !alice_view.hand.contains(card))
        .unwrap();

    alice.play_cards(&[&absent]).unwrap();
    let error = alice.recv_error().unwrap();
    assert_eq!(error, "cards not in hand");
}

#[test]
fn a_full_game_plays_to_completion() {
    let addr = start_server(test_config());
    let (mut alice, alice_view, mut bob, bob_view) = setup_game(&addr);
    let mut views = (alice_view, bob_view);

    for _turn in 0..2000 {
        let alice_acts = views.0.your_turn;
        assert_ne!(views.0.your_turn, views.1.your_turn);

        let (actor, actor_view, other) = if alice_acts {
            (&mut alice, &views.0, &mut bob)
        } else {
            (&mut bob, &views.1, &mut alice)
        };

        match choose_move(actor_view) {
            Move::Play(card) => actor.play_cards(&[&card]).unwrap(),
            Move::Reserve => actor.play_cards(&["RESERVE"]).unwrap(),
            Move::Pickup => actor.pickup_pile().unwrap(),
        }
        let result = actor.recv_expect(MessageType::TurnResult).unwrap();
        assert_eq!(result.data("status"), Some("success"));

        let next = actor.recv().unwrap();
        if next.msg_type == MessageType::GameOver {
            let winner = next.data("winner").unwrap().to_string();
            assert_eq!(winner, actor.name);
            actor.recv_expect(MessageType::RoomLeft).unwrap();

            let game_over = other.recv_expect(MessageType::GameOver).unwrap();
            assert_eq!(game_over.data("winner"), Some(winner.as_str()));
            other.recv_expect(MessageType::RoomLeft).unwrap();

            // The room is gone; the winner can queue up for a fresh one.
            alice.join_room().unwrap();
            let joined = alice.recv_expect(MessageType::RoomJoined).unwrap();
            assert_ne!(joined.room, "ROOM_1");
            return;
        }

        assert_eq!(next.msg_type, MessageType::GameState);
        let actor_next = View::from(&next);
        let other_next = View::from(&other.recv_expect(MessageType::GameState).unwrap());
        views = if alice_acts {
            (actor_next, other_next)
        } else {
            (other_next, actor_next)
        };
    }
    panic!("game did not finish within the turn bound");
}

#[test]
fn reconnect_resumes_an_active_game() {
    let addr = start_server(test_config());
    let (alice, alice_view, mut bob, _) = setup_game(&addr);

    drop(alice);
    let notice = bob.recv_expect(MessageType::PlayerDisconnected).unwrap();
    assert_eq!(notice.data("disconnected_player"), Some("Alice"));

    let mut alice = Client::reconnect("Alice", &addr).unwrap();
    let snapshot = View::from(&alice.recv_expect(MessageType::GameState).unwrap());
    assert_eq!(snapshot.hand, alice_view.hand);
    assert_eq!(snapshot.reserves, 3);
    assert!(snapshot.your_turn);

    let notice = bob.recv_expect(MessageType::PlayerReconnected).unwrap();
    assert_eq!(notice.data("reconnected_player"), Some("Alice"));
}

#[test]
fn grace_expiry_hands_the_win_to_the_remaining_player() {
    let config = ServerConfig {
        heartbeat_check_interval: Duration::from_millis(50),
        grace_period: Duration::from_millis(150),
        ..test_config()
    };
    let addr = start_server(config);
    let (alice, _, mut bob, _) = setup_game(&addr);

    // Alice's socket dies mid-game and she never comes back.
    drop(alice);
    bob.recv_expect(MessageType::PlayerDisconnected).unwrap();

    let game_over = bob.recv_expect(MessageType::GameOver).unwrap();
    assert_eq!(game_over.data("winner"), Some("Bob"));
    assert_eq!(game_over.data("reason"), Some("opponent_disconnect"));
    bob.recv_expect(MessageType::RoomLeft).unwrap();

    // Alice's record is gone: her name is free again and RECONNECT fails.
    assert!(Client::reconnect("Alice", &addr).is_err());
    let _new_alice = Client::connect("Alice", &addr).unwrap();

    // Bob is back in the lobby.
    bob.join_room().unwrap();
    let joined = bob.recv_expect(MessageType::RoomJoined).unwrap();
    assert_ne!(joined.room, "ROOM_1");
}
