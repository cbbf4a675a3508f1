//! Play-validity rules and special-card side effects.
//!
//! Pure functions over the card model; the engine owns all state and calls
//! into these when resolving a turn.

use super::entities::Card;

/// A 2 can be played on anything, and anything can be played on a 2.
pub fn is_wild(card: Card) -> bool {
    card.value() == 2
}

/// A 7 forces the next play to be seven or lower.
pub fn forces_low(card: Card) -> bool {
    card.value() == 7
}

/// A 10 burns the discard pile, removing it (and itself) from the game.
pub fn is_burn(card: Card) -> bool {
    card.value() == 10
}

/// Multi-card plays must consist of a single rank.
pub fn same_rank(cards: &[Card]) -> bool {
    match cards.split_first() {
        Some((first, rest)) => rest.iter().all(|c| c.value() == first.value()),
        None => true,
    }
}

/// Whether `card` may be placed on `top`. The must-play-low window takes
/// precedence over the burn exemption, so a 10 is not an escape from a 7.
pub fn can_play_on(card: Card, top: Card, must_play_low: bool) -> bool {
    if is_wild(card) || is_wild(top) {
        return true;
    }
    if must_play_low {
        return card.value() <= 7;
    }
    if is_burn(card) {
        return true;
    }
    card.value() >= top.value()
}

/// Full validity check for a claimed play. `top` is `None` when the discard
/// pile is empty, in which case any single-rank set is valid.
pub fn is_valid_play(cards: &[Card], top: Option<Card>, must_play_low: bool) -> bool {
    if cards.is_empty() {
        return false;
    }
    if !same_rank(cards) {
        return false;
    }
    match top {
        Some(top) => cards.iter().all(|&c| can_play_on(c, top, must_play_low)),
        None => true,
    }
}

/// Applies special-card effects after an accepted play has been appended to
/// the discard pile. Resets the must-play-low window, then walks the played
/// cards in order: a 7 re-arms it, a 10 moves the whole pile (played cards
/// included) onto the burned stack.
pub fn apply_special_effects(
    played: &[Card],
    discard_pile: &mut Vec<Card>,
    burned: &mut Vec<Card>,
    must_play_low: &mut bool,
) {
    *must_play_low = false;
    for &card in played {
        if forces_low(card) {
            *must_play_low = true;
        }
        if is_burn(card) {
            burned.append(discard_pile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit;

    fn card(value: u8) -> Card {
        Card(value, Suit::Hearts)
    }

    #[test]
    fn wild_two_plays_on_anything() {
        assert!(can_play_on(card(2), card(13), false));
        assert!(can_play_on(card(2), card(13), true));
    }

    #[test]
    fn anything_plays_on_a_two() {
        assert!(can_play_on(card(3), card(2), false));
        assert!(can_play_on(card(13), card(2), true));
    }

    #[test]
    fn must_play_low_blocks_high_cards() {
        assert!(!can_play_on(card(9), card(7), true));
        assert!(can_play_on(card(4), card(7), true));
        assert!(can_play_on(card(7), card(7), true));
        // The burn exemption does not apply inside the low window.
        assert!(!can_play_on(card(10), card(7), true));
    }

    #[test]
    fn burn_ten_plays_on_anything_outside_low_window() {
        assert!(can_play_on(card(10), card(13), false));
    }

    #[test]
    fn equal_or_higher_rule() {
        assert!(can_play_on(card(5), card(5), false));
        assert!(can_play_on(card(6), card(5), false));
        assert!(!can_play_on(card(4), card(5), false));
    }

    #[test]
    fn multi_card_plays_require_one_rank() {
        let pair = [Card(5, Suit::Hearts), Card(5, Suit::Clubs)];
        let mixed = [Card(5, Suit::Hearts), Card(6, Suit::Clubs)];
        assert!(is_valid_play(&pair, Some(card(3)), false));
        assert!(!is_valid_play(&mixed, Some(card(3)), false));
    }

    #[test]
    fn empty_pile_accepts_anything() {
        assert!(is_valid_play(&[card(3)], None, false));
        assert!(is_valid_play(&[card(13)], None, false));
        assert!(!is_valid_play(&[], None, false));
    }

    #[test]
    fn seven_arms_low_window() {
        let mut pile = vec![card(3), card(7)];
        let mut burned = Vec::new();
        let mut low = false;
        apply_special_effects(&[card(7)], &mut pile, &mut burned, &mut low);
        assert!(low);
        assert_eq!(pile.len(), 2);
        assert!(burned.is_empty());
    }

    #[test]
    fn next_valid_play_clears_low_window() {
        let mut pile = vec![card(7), card(4)];
        let mut burned = Vec::new();
        let mut low = true;
        apply_special_effects(&[card(4)], &mut pile, &mut burned, &mut low);
        assert!(!low);
    }

    #[test]
    fn ten_burns_pile_including_itself() {
        let mut pile = vec![card(3), card(9), card(10)];
        let mut burned = Vec::new();
        let mut low = false;
        apply_special_effects(&[card(10)], &mut pile, &mut burned, &mut low);
        assert!(pile.is_empty());
        assert_eq!(burned.len(), 3);
    }
}
