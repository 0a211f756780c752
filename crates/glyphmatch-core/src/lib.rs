pub mod card;
pub mod deck;
pub mod net;
pub mod player;
pub mod rules;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::Player;
    use crate::rules::GameRules;

    /// Create `n` test players with ids `p1..pn`.
    pub fn make_players(n: usize) -> Vec<Player> {
        (1..=n)
            .map(|i| Player::new(format!("p{i}"), format!("Player{i}")))
            .collect()
    }

    /// Rules with the given caps and everything else defaulted.
    pub fn make_rules(max_players: u32, card_count: u32) -> GameRules {
        GameRules {
            max_players,
            card_count,
            ..GameRules::default()
        }
    }
}
