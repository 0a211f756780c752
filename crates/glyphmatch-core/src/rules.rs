use serde::{Deserialize, Serialize};

/// How winning answers are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    /// Free-for-all: the first correct answer on the shared card scores.
    #[default]
    FirstComeFirstServed,
    /// Pass-the-card variant; needs at least two connected players.
    HotPotato,
}

/// Client-side art theme preference, carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTheme(pub String);

impl Default for SymbolTheme {
    fn default() -> Self {
        Self("classic".to_string())
    }
}

/// Rules of the game in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameRules {
    pub max_players: u32,
    pub card_count: u32,
    pub game_type: GameType,
    pub symbol_type: SymbolTheme,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_players: 8,
            card_count: 55,
            game_type: GameType::default(),
            symbol_type: SymbolTheme::default(),
        }
    }
}

/// Bounds follow the shipped symbol alphabet: at most 10 symbols per card,
/// hence at most 91 cards per deck.
pub const MAX_PLAYERS_LIMIT: u32 = 10;
pub const MAX_CARD_COUNT: u32 = 91;
pub const MIN_CARD_COUNT: u32 = 2;

#[derive(Debug, PartialEq, Eq)]
pub enum RulesError {
    MaxPlayersOutOfRange(u32),
    CardCountOutOfRange(u32),
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxPlayersOutOfRange(n) => {
                write!(f, "max players {n} outside 1..={MAX_PLAYERS_LIMIT}")
            },
            Self::CardCountOutOfRange(n) => {
                write!(f, "card count {n} outside {MIN_CARD_COUNT}..={MAX_CARD_COUNT}")
            },
        }
    }
}

impl std::error::Error for RulesError {}

impl GameRules {
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.max_players == 0 || self.max_players > MAX_PLAYERS_LIMIT {
            return Err(RulesError::MaxPlayersOutOfRange(self.max_players));
        }
        if self.card_count < MIN_CARD_COUNT || self.card_count > MAX_CARD_COUNT {
            return Err(RulesError::CardCountOutOfRange(self.card_count));
        }
        Ok(())
    }
}
