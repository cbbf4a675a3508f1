//! Shed game engine - card model, rules, and per-room state machine.
//!
//! The game is a two-player shed variant: each player holds a hand topped up
//! to three cards and three face-down reserve cards. Cards are played onto a
//! shared discard pile against an equal-or-higher rule, with three special
//! ranks: 2 is wild, 7 forces the next play to be seven or lower, and 10
//! burns the pile. The first player to empty both hand and reserves wins.

pub mod engine;
pub mod entities;
pub mod rules;

pub use engine::{GameState, ReserveOutcome, Snapshot};
pub use entities::{Card, Deck, PlayerHand, Suit};

/// Lifecycle phase of a room's game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GamePhase {
    Waiting,
    Active,
    Finished,
}

/// Errors surfaced by game operations. Each maps to a one-shot ERROR reply;
/// none of them tear down the connection.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("cards not in hand")]
    CardsNotInHand,
    #[error("discard pile is empty")]
    EmptyPile,
    #[error("game already in progress")]
    GameAlreadyStarted,
    #[error("hand must be empty to play from reserves")]
    HandNotEmpty,
    #[error("play not allowed on current pile")]
    InvalidPlay,
    #[error("cards must share a rank")]
    MixedRanks,
    #[error("no cards specified")]
    NoCards,
    #[error("no reserves left")]
    NoReserves,
    #[error("game not in progress")]
    NotActive,
    #[error("need 2+ players")]
    NotEnoughPlayers,
    #[error("not your turn")]
    OutOfTurn,
    #[error("player already seated")]
    PlayerAlreadySeated,
    #[error("unknown player")]
    UnknownPlayer,
}
