//! Deck construction from perfect difference sets.
//!
//! A deck with `k` symbols per card is the projective plane of order
//! `q = k - 1`: the `m = k^2 - k + 1` cyclic translates of a perfect
//! difference set modulo `m`, so any two cards share exactly one symbol.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::card::{Card, SymbolId, SymbolPlacement};
use crate::rules::GameRules;

/// Size of the shipped symbol art alphabet.
pub const SYMBOL_ALPHABET: u32 = 91;

/// Perfect difference sets for the supported plane orders. Order 6 does not
/// exist, so 7 symbols per card is skipped. Conway-polynomial search for
/// these is expensive, hence a lookup table.
struct DifferenceSet {
    symbols_per_card: u32,
    modulus: u32,
    residues: &'static [u32],
}

const DIFFERENCE_SETS: &[DifferenceSet] = &[
    DifferenceSet {
        symbols_per_card: 5,
        modulus: 21,
        residues: &[0, 1, 4, 14, 16],
    },
    DifferenceSet {
        symbols_per_card: 6,
        modulus: 31,
        residues: &[0, 1, 3, 8, 12, 18],
    },
    DifferenceSet {
        symbols_per_card: 8,
        modulus: 57,
        residues: &[0, 1, 3, 13, 32, 36, 43, 52],
    },
    DifferenceSet {
        symbols_per_card: 9,
        modulus: 73,
        residues: &[0, 1, 3, 7, 15, 31, 36, 54, 63],
    },
    DifferenceSet {
        symbols_per_card: 10,
        modulus: 91,
        residues: &[0, 1, 3, 9, 27, 49, 56, 61, 77, 81],
    },
];

/// The (symbols-per-card, deck-modulus) pair a rule set resolves to: the
/// smallest supported plane that covers both the configured card count and
/// the configured player cap.
pub fn deck_parameters(rules: &GameRules) -> (u32, u32) {
    let set = select_set(rules);
    (set.symbols_per_card, set.modulus)
}

fn select_set(rules: &GameRules) -> &'static DifferenceSet {
    DIFFERENCE_SETS
        .iter()
        .find(|s| s.symbols_per_card >= rules.max_players && s.modulus >= rules.card_count)
        .unwrap_or(&DIFFERENCE_SETS[DIFFERENCE_SETS.len() - 1])
}

/// Build a shuffled deck of `rules.card_count` cards. A random displacement
/// keeps symbol ids inside the art alphabet while varying which glyphs a
/// given game uses.
pub fn build_deck<R: Rng + ?Sized>(rules: &GameRules, rng: &mut R) -> Vec<Card> {
    let set = select_set(rules);
    let displacement = rng.random_range(0..=(SYMBOL_ALPHABET - set.modulus));

    let mut cards: Vec<Card> = (0..set.modulus)
        .map(|translate| {
            let symbols: Vec<SymbolId> = set
                .residues
                .iter()
                .map(|&r| (r + translate) % set.modulus)
                .collect();
            let mut card = Card::new(place_symbols(&symbols, rng));
            card.shift_symbols(displacement);
            card
        })
        .collect();

    cards.shuffle(rng);
    cards.truncate(rules.card_count as usize);
    cards
}

/// Lay symbols out on the 150x150 card face: one in the middle, the rest on
/// a ring. Browsers ship their own packed layouts; this keeps snapshots
/// renderable on their own.
fn place_symbols<R: Rng + ?Sized>(symbols: &[SymbolId], rng: &mut R) -> Vec<SymbolPlacement> {
    let ring = symbols.len().saturating_sub(1).max(1) as f64;
    symbols
        .iter()
        .enumerate()
        .map(|(slot, &symbol)| {
            let (vertical, horizontal) = if slot == 0 {
                (75, 75)
            } else {
                let angle = (slot - 1) as f64 / ring * std::f64::consts::TAU;
                (
                    75 + (50.0 * angle.sin()).round() as i32,
                    75 + (50.0 * angle.cos()).round() as i32,
                )
            };
            SymbolPlacement {
                symbol,
                size: (150 / (symbols.len() + 1)) as u32,
                vertical,
                horizontal,
                rotation: rng.random_range(0.0..360.0),
            }
        })
        .collect()
}
