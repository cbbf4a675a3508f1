//! Per-room game state machine.
//!
//! A `GameState` is owned by exactly one room and mutated only under the room
//! registry lock. Operations validate the acting player's turn, apply the
//! rules from [`super::rules`], and leave the state consistent: the multiset
//! deck ∪ discard ∪ hands ∪ reserves ∪ burned is always the full 52-card
//! deck once a game has started.

use super::entities::{Card, Deck, PlayerHand};
use super::rules;
use super::{GameError, GamePhase};

/// Hand size players are topped up to after each play while the deck lasts.
const HAND_SIZE: usize = 3;

/// Face-down cards dealt to each player at game start.
const RESERVE_SIZE: usize = 3;

/// Result of revealing a reserve card.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReserveOutcome {
    /// The revealed card beat the pile and was played.
    Played(Card),
    /// The revealed card was invalid; the player absorbed the pile plus the
    /// revealed card.
    PickedUp(Card),
}

/// Opponent summary visible to other players.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpponentInfo {
    pub name: String,
    pub hand_size: usize,
    pub reserve_count: usize,
}

/// A single player's view of the game, used to build GAME_STATE messages.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub hand: Vec<Card>,
    pub reserve_count: usize,
    pub top_card: Option<Card>,
    pub current_player: String,
    pub your_turn: bool,
    pub must_play_low: bool,
    pub deck_size: usize,
    pub discard_pile_size: usize,
    pub opponents: Vec<OpponentInfo>,
}

pub struct GameState {
    deck: Deck,
    discard_pile: Vec<Card>,
    burned: Vec<Card>,
    players: Vec<PlayerHand>,
    current_index: usize,
    phase: GamePhase,
    must_play_low: bool,
    deck_exhausted: bool,
    winner: Option<String>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            deck: Deck::new(),
            discard_pile: Vec::new(),
            burned: Vec::new(),
            players: Vec::new(),
            current_index: 0,
            phase: GamePhase::Waiting,
            must_play_low: false,
            deck_exhausted: false,
            winner: None,
        }
    }

    /// Seats a player. Only possible before the game starts; seating order is
    /// turn order.
    pub fn add_player(&mut self, name: &str) -> Result<(), GameError> {
        if self.phase != GamePhase::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(GameError::PlayerAlreadySeated);
        }
        self.players.push(PlayerHand::new(name));
        Ok(())
    }

    /// Unseats a player before the game starts. Returns whether the player
    /// was seated.
    pub fn remove_player(&mut self, name: &str) -> bool {
        if self.phase != GamePhase::Waiting {
            return false;
        }
        let before = self.players.len();
        self.players.retain(|p| p.name != name);
        self.players.len() != before
    }

    /// Shuffles a fresh deck and deals: reserves to each player in seating
    /// order, then hands, then one card onto the discard pile.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        let mut deck = Deck::new();
        deck.shuffle();
        self.begin_with_deck(deck);
        Ok(())
    }

    fn begin_with_deck(&mut self, deck: Deck) {
        self.deck = deck;
        self.discard_pile.clear();
        self.burned.clear();
        for player in &mut self.players {
            player.hand.clear();
            player.reserves.clear();
        }
        for i in 0..self.players.len() {
            for _ in 0..RESERVE_SIZE {
                if let Some(card) = self.deck.deal() {
                    self.players[i].reserves.push(card);
                }
            }
        }
        for i in 0..self.players.len() {
            for _ in 0..HAND_SIZE {
                if let Some(card) = self.deck.deal() {
                    self.players[i].hand.push(card);
                }
            }
        }
        if let Some(card) = self.deck.deal() {
            self.discard_pile.push(card);
        }
        self.current_index = 0;
        self.phase = GamePhase::Active;
        self.must_play_low = false;
        self.deck_exhausted = false;
        self.winner = None;
    }

    /// Plays `cards` from the current player's hand onto the pile.
    pub fn play_cards(&mut self, name: &str, cards: &[Card]) -> Result<(), GameError> {
        let index = self.turn_index(name)?;
        if cards.is_empty() {
            return Err(GameError::NoCards);
        }
        if !holds_all(&self.players[index].hand, cards) {
            return Err(GameError::CardsNotInHand);
        }
        if !rules::same_rank(cards) {
            return Err(GameError::MixedRanks);
        }
        if !rules::is_valid_play(cards, self.top_card(), self.must_play_low) {
            return Err(GameError::InvalidPlay);
        }

        remove_cards(&mut self.players[index].hand, cards);
        self.discard_pile.extend_from_slice(cards);
        rules::apply_special_effects(
            cards,
            &mut self.discard_pile,
            &mut self.burned,
            &mut self.must_play_low,
        );
        self.draw_to_hand(index);
        if self.has_won(index) {
            self.finish(index);
        } else {
            self.advance_turn();
        }
        Ok(())
    }

    /// Reveals the current player's last reserve card. Valid reveals are
    /// played as a normal play; invalid ones land on the pile first, then the
    /// whole pile moves into the player's hand.
    pub fn play_from_reserve(&mut self, name: &str) -> Result<ReserveOutcome, GameError> {
        let index = self.turn_index(name)?;
        if !self.players[index].hand.is_empty() {
            return Err(GameError::HandNotEmpty);
        }
        let Some(revealed) = self.players[index].reserves.pop() else {
            return Err(GameError::NoReserves);
        };

        if rules::is_valid_play(&[revealed], self.top_card(), self.must_play_low) {
            self.discard_pile.push(revealed);
            rules::apply_special_effects(
                &[revealed],
                &mut self.discard_pile,
                &mut self.burned,
                &mut self.must_play_low,
            );
            self.draw_to_hand(index);
            if self.has_won(index) {
                self.finish(index);
            } else {
                self.advance_turn();
            }
            Ok(ReserveOutcome::Played(revealed))
        } else {
            self.discard_pile.push(revealed);
            let pile = std::mem::take(&mut self.discard_pile);
            self.players[index].hand.extend(pile);
            self.must_play_low = false;
            self.advance_turn();
            Ok(ReserveOutcome::PickedUp(revealed))
        }
    }

    /// Moves the whole discard pile into the current player's hand.
    pub fn pickup_pile(&mut self, name: &str) -> Result<(), GameError> {
        let index = self.turn_index(name)?;
        if self.discard_pile.is_empty() {
            return Err(GameError::EmptyPile);
        }
        let pile = std::mem::take(&mut self.discard_pile);
        self.players[index].hand.extend(pile);
        self.must_play_low = false;
        self.advance_turn();
        Ok(())
    }

    /// Builds the game view for one player. `None` if the viewer is not
    /// seated.
    pub fn snapshot(&self, viewer: &str) -> Option<Snapshot> {
        let player = self.players.iter().find(|p| p.name == viewer)?;
        let current_player = self.current_player().unwrap_or_default().to_string();
        let opponents = self
            .players
            .iter()
            .filter(|p| p.name != viewer)
            .map(|p| OpponentInfo {
                name: p.name.clone(),
                hand_size: p.hand.len(),
                reserve_count: p.reserves.len(),
            })
            .collect();
        Some(Snapshot {
            hand: player.hand.clone(),
            reserve_count: player.reserves.len(),
            top_card: self.top_card(),
            your_turn: current_player == viewer,
            current_player,
            must_play_low: self.must_play_low,
            deck_size: self.deck.len(),
            discard_pile_size: self.discard_pile.len(),
            opponents,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn current_player(&self) -> Option<&str> {
        self.players.get(self.current_index).map(|p| p.name.as_str())
    }

    pub fn top_card(&self) -> Option<Card> {
        self.discard_pile.last().copied()
    }

    pub fn deck_size(&self) -> usize {
        self.deck.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_seated(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    fn turn_index(&self, name: &str) -> Result<usize, GameError> {
        if self.phase != GamePhase::Active {
            return Err(GameError::NotActive);
        }
        if !self.is_seated(name) {
            return Err(GameError::UnknownPlayer);
        }
        if self.current_player() != Some(name) {
            return Err(GameError::OutOfTurn);
        }
        Ok(self.current_index)
    }

    fn draw_to_hand(&mut self, index: usize) {
        if self.deck_exhausted {
            return;
        }
        while self.players[index].hand.len() < HAND_SIZE {
            match self.deck.deal() {
                Some(card) => self.players[index].hand.push(card),
                None => {
                    self.deck_exhausted = true;
                    break;
                }
            }
        }
    }

    fn has_won(&self, index: usize) -> bool {
        let player = &self.players[index];
        player.hand.is_empty() && player.reserves.is_empty()
    }

    fn finish(&mut self, winner_index: usize) {
        self.phase = GamePhase::Finished;
        self.winner = Some(self.players[winner_index].name.clone());
    }

    fn advance_turn(&mut self) {
        if !self.players.is_empty() {
            self.current_index = (self.current_index + 1) % self.players.len();
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiset containment check: every requested card must be matched by a
/// distinct card in the hand.
fn holds_all(hand: &[Card], cards: &[Card]) -> bool {
    let mut remaining = hand.to_vec();
    for card in cards {
        match remaining.iter().position(|c| c == card) {
            Some(i) => {
                remaining.swap_remove(i);
            }
            None => return false,
        }
    }
    true
}

/// Removes one matching hand card per requested card, preserving hand order.
fn remove_cards(hand: &mut Vec<Card>, cards: &[Card]) {
    for card in cards {
        if let Some(i) = hand.iter().position(|c| c == card) {
            hand.remove(i);
        }
    }
}
