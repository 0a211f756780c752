use serde::{Deserialize, Serialize};

use crate::card::Card;

/// A participant in a room. The id is supplied by the browser and persisted
/// client-side, so the same logical player survives reconnects; `sources`
/// counts how many live connections currently represent that identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub score: u32,
    pub connected: bool,
    pub sources: u32,
    pub current_card: Option<Card>,
}

impl Player {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            score: 0,
            connected: true,
            sources: 1,
            current_card: None,
        }
    }

    pub fn from_data(data: PlayerData) -> Self {
        Self::new(data.id, data.username)
    }

    /// Award a point: the winner's card is replaced by the master card they
    /// just matched against.
    pub fn award_point(&mut self, master_card: Card) {
        self.current_card = Some(master_card);
        self.score += 1;
    }

    /// Clear score and card after a game ends.
    pub fn reset(&mut self) {
        self.score = 0;
        self.current_card = None;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            username: self.username.clone(),
            score: self.score,
            connected: self.connected,
            current_card: self.current_card.clone(),
        }
    }
}

/// Player payload as the browser sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

pub const MAX_PLAYER_ID_LEN: usize = 64;
pub const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, PartialEq, Eq)]
pub enum UserDataError {
    EmptyId,
    IdTooLong(usize),
    UsernameTooLong(usize),
    ControlCharacters,
}

impl std::fmt::Display for UserDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "player id is empty"),
            Self::IdTooLong(n) => write!(f, "player id is {n} chars (max {MAX_PLAYER_ID_LEN})"),
            Self::UsernameTooLong(n) => {
                write!(f, "username is {n} chars (max {MAX_USERNAME_LEN})")
            },
            Self::ControlCharacters => write!(f, "control characters are not allowed"),
        }
    }
}

impl std::error::Error for UserDataError {}

impl PlayerData {
    pub fn validate(&self) -> Result<(), UserDataError> {
        if self.id.trim().is_empty() {
            return Err(UserDataError::EmptyId);
        }
        if self.id.chars().count() > MAX_PLAYER_ID_LEN {
            return Err(UserDataError::IdTooLong(self.id.chars().count()));
        }
        if self.username.chars().count() > MAX_USERNAME_LEN {
            return Err(UserDataError::UsernameTooLong(self.username.chars().count()));
        }
        if self.id.chars().chain(self.username.chars()).any(char::is_control) {
            return Err(UserDataError::ControlCharacters);
        }
        Ok(())
    }
}

/// Player as rooms expose it to browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub username: String,
    pub score: u32,
    pub connected: bool,
    pub current_card: Option<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, SymbolPlacement};

    fn card() -> Card {
        Card::new(vec![SymbolPlacement {
            symbol: 1,
            size: 40,
            vertical: 75,
            horizontal: 75,
            rotation: 0.0,
        }])
    }

    #[test]
    fn award_point_swaps_card_and_scores() {
        let mut player = Player::new("p1", "Alice");
        player.award_point(card());
        assert_eq!(player.score, 1);
        assert!(player.current_card.is_some());
    }

    #[test]
    fn reset_clears_score_and_card() {
        let mut player = Player::new("p1", "Alice");
        player.award_point(card());
        player.reset();
        assert_eq!(player.score, 0);
        assert!(player.current_card.is_none());
    }

    #[test]
    fn empty_id_rejected() {
        let data = PlayerData {
            id: "  ".to_string(),
            username: "Alice".to_string(),
        };
        assert_eq!(data.validate(), Err(UserDataError::EmptyId));
    }

    #[test]
    fn control_characters_rejected() {
        let data = PlayerData {
            id: "p1".to_string(),
            username: "Al\x07ce".to_string(),
        };
        assert_eq!(data.validate(), Err(UserDataError::ControlCharacters));
    }

    #[test]
    fn long_username_rejected() {
        let data = PlayerData {
            id: "p1".to_string(),
            username: "x".repeat(MAX_USERNAME_LEN + 1),
        };
        assert!(matches!(
            data.validate(),
            Err(UserDataError::UsernameTooLong(_))
        ));
    }
}
