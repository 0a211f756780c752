//! Per-round deck state and first-correct-answer arbitration.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use glyphmatch_core::card::{Card, SymbolId};
use glyphmatch_core::deck;
use glyphmatch_core::rules::GameRules;

use crate::fair_queue::FairQueue;

/// Outcome of one submitted answer. Exactly one caller per round receives
/// `Won`; the master card it matched rides along so the point transfer is
/// race-free with the next draw.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Won(Card),
    Miss,
    Late,
}

pub struct GameProgress {
    /// Serializes answer checks in submission order, keyed by player id.
    answers: FairQueue,
    /// Set once a round is claimed; no further answer may win it.
    closed: AtomicBool,
    deck: Mutex<VecDeque<Card>>,
    current: Mutex<Option<Card>>,
}

impl GameProgress {
    pub fn new(rules: &GameRules) -> Self {
        let deck = deck::build_deck(rules, &mut rand::rng());
        Self {
            answers: FairQueue::new(),
            closed: AtomicBool::new(true),
            deck: Mutex::new(deck.into()),
            current: Mutex::new(None),
        }
    }

    /// Take one card off the deck for a player's starting hand.
    pub fn deal(&self) -> Option<Card> {
        self.deck.lock().unwrap().pop_front()
    }

    pub fn current_card(&self) -> Option<Card> {
        self.current.lock().unwrap().clone()
    }

    pub fn remaining_cards(&self) -> usize {
        self.deck.lock().unwrap().len()
    }

    pub fn round_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Expose the next master card and open the round. Returns false when
    /// the deck is exhausted; the round stays closed in that case.
    pub fn open_round(&self) -> bool {
        let next = self.deck.lock().unwrap().pop_front();
        let has_more = next.is_some();
        *self.current.lock().unwrap() = next;
        self.closed.store(!has_more, Ordering::Release);
        has_more
    }

    /// Wait until every in-flight answer check has been served.
    pub async fn await_answers(&self) {
        self.answers.drain().await;
    }

    /// Check a submitted symbol against the master card.
    ///
    /// Answers that arrive after the round closed are rejected immediately
    /// without taking a ticket; the outcome is already decided, so ordering
    /// does not matter for them. Everything else is served in submission
    /// order: the closed flag is re-read once the caller's turn comes up,
    /// and a caller that lost the race to an earlier ticket gets `Miss`.
    pub async fn check_symbol(&self, symbol: SymbolId, player_id: &str) -> MatchOutcome {
        if self.closed.load(Ordering::Acquire) {
            return MatchOutcome::Late;
        }

        self.answers
            .run(player_id, || {
                if self.closed.load(Ordering::Acquire) {
                    return MatchOutcome::Miss;
                }
                let current = self.current.lock().unwrap();
                match current.as_ref() {
                    Some(card) if card.contains(symbol) => {
                        self.closed.store(true, Ordering::Release);
                        MatchOutcome::Won(card.clone())
                    },
                    Some(_) => MatchOutcome::Miss,
                    None => MatchOutcome::Miss,
                }
            })
            .await
    }
}
