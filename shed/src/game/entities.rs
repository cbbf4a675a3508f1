use rand::{seq::SliceRandom, thread_rng};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    fn letter(self) -> char {
        match self {
            Self::Hearts => 'H',
            Self::Diamonds => 'D',
            Self::Clubs => 'C',
            Self::Spades => 'S',
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'H' => Some(Self::Hearts),
            'D' => Some(Self::Diamonds),
            'C' => Some(Self::Clubs),
            'S' => Some(Self::Spades),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Card values: ace is 1, face cards run jack=11 through king=13.
pub type Value = u8;

/// A card is a tuple of a value and a suit. Textual form is the rank token
/// followed by the suit letter, e.g. `AH`, `10S`, `QC`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Card(pub Value, pub Suit);

impl Card {
    pub fn value(self) -> Value {
        self.0
    }

    pub fn suit(self) -> Suit {
        self.1
    }

    /// Special ranks carry side effects when played: 2 (wild), 7 (forces
    /// low), 10 (burns the pile).
    pub fn is_special(self) -> bool {
        matches!(self.0, 2 | 7 | 10)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.0 {
            1 => "A".to_string(),
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            v => v.to_string(),
        };
        write!(f, "{rank}{}", self.1)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid card: {0}")]
pub struct ParseCardError(pub String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseCardError(s.to_string());
        if !s.is_ascii() || s.len() < 2 {
            return Err(invalid());
        }
        // Suit is always the final character, rank is everything before it.
        let (rank_str, suit_str) = s.split_at(s.len() - 1);
        let suit = suit_str
            .chars()
            .next()
            .and_then(Suit::from_letter)
            .ok_or_else(invalid)?;
        let value = match rank_str {
            "A" => 1,
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            n => match n.parse::<Value>() {
                Ok(v @ 2..=10) => v,
                _ => return Err(invalid()),
            },
        };
        Ok(Card(value, suit))
    }
}

/// An ordered draw pile. A fresh deck holds all 52 cards; `deal` removes and
/// returns the last card.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for value in 1..=13 {
                cards.push(Card(value, suit));
            }
        }
        Self { cards }
    }

    /// Builds a deck with a fixed card order. `deal` returns cards starting
    /// from the end, which makes scripted game tests deterministic.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut thread_rng());
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// A player's in-game holdings: the open hand and the face-down reserves.
#[derive(Clone, Debug)]
pub struct PlayerHand {
    pub name: String,
    pub hand: Vec<Card>,
    pub reserves: Vec<Card>,
}

impl PlayerHand {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hand: Vec::new(),
            reserves: Vec::new(),
        }
    }
}
