//! One game session: roster, rules, host, phase, and the active round.

use std::sync::{Arc, Mutex};

use rand::Rng;

use glyphmatch_core::card::SymbolId;
use glyphmatch_core::net::messages::RoomSnapshot;
use glyphmatch_core::player::{Player, PlayerData};
use glyphmatch_core::rules::{GameRules, GameType};

use crate::progress::{GameProgress, MatchOutcome};

/// Room ids are short public codes, typed by hand between friends.
pub const ROOM_ID_LEN: usize = 6;
/// Client-supplied ids are clamped to this length before use.
pub const MAX_ROOM_ID_LEN: usize = 15;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a room code. Not guaranteed unique; the registry checks the
/// result against live rooms.
pub fn generate_room_id() -> String {
    let mut rng = rand::rng();
    (0..ROOM_ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    InProgress,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    NotHost,
    /// The selected game type needs more connected players.
    NotEnoughPlayers,
    /// The deck cannot cover a card per player plus a master card.
    DeckTooSmall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// A new master card is exposed.
    Continued,
    /// The deck ran out; the room moved to the summary screen.
    RoundsExhausted,
    /// No game is running.
    NotStarted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RulesUpdate {
    Updated,
    RejectedInProgress,
}

pub struct Room {
    id: String,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    phase: RoomPhase,
    rules: GameRules,
    host_id: String,
    players: Vec<Player>,
    spectators: Vec<Player>,
    progress: Option<Arc<GameProgress>>,
}

impl Room {
    pub fn new(host: Player, id: Option<String>, rules: Option<GameRules>) -> Self {
        let host_id = host.id.clone();
        Self {
            id: id.unwrap_or_else(generate_room_id),
            inner: Mutex::new(RoomInner {
                phase: RoomPhase::Lobby,
                rules: rules.unwrap_or_default(),
                host_id,
                players: vec![host],
                spectators: Vec::new(),
                progress: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn host_id(&self) -> String {
        self.inner.lock().unwrap().host_id.clone()
    }

    /// A room stays alive while anyone is actually there: a connected
    /// player, or a spectator (spectators hold live connections and can
    /// inherit the host role).
    pub fn is_valid(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        Self::valid(&inner)
    }

    fn valid(inner: &RoomInner) -> bool {
        inner.players.iter().any(|p| p.connected) || !inner.spectators.is_empty()
    }

    /// Add a participant. Returns true when peers should be told: a fused
    /// reconnect to an already-connected identity is silent so multiple
    /// tabs do not spam the room.
    pub fn join(&self, player: Player) -> bool {
        let inner = &mut *self.inner.lock().unwrap();

        if inner.phase != RoomPhase::Lobby {
            // A known identity reattaches to its seat, cards and score
            // intact; anyone else watches from the side.
            if let Some(known) = inner.players.iter_mut().find(|p| p.id == player.id) {
                known.username = player.username;
                if known.connected {
                    known.sources += 1;
                    return false;
                }
                known.connected = true;
                return true;
            }
            if let Some(known) = inner.spectators.iter_mut().find(|p| p.id == player.id) {
                known.username = player.username;
                known.sources += 1;
                return false;
            }
            inner.spectators.push(player);
            return true;
        }

        if let Some(known) = inner
            .players
            .iter_mut()
            .chain(inner.spectators.iter_mut())
            .find(|p| p.id == player.id)
        {
            known.sources += 1;
            known.connected = true;
            return false;
        }

        if (inner.players.len() as u32) < inner.rules.max_players {
            inner.players.push(player);
        } else {
            inner.spectators.push(player);
        }
        true
    }

    /// Remove one connection of a participant. Only when its last source
    /// goes away does the identity actually leave: removed outright in
    /// lobby/summary, marked disconnected mid-game so it can rejoin.
    /// Returns whether the room is still valid afterwards.
    pub fn leave(&self, player_id: &str) -> bool {
        let inner = &mut *self.inner.lock().unwrap();

        if let Some(idx) = inner.spectators.iter().position(|p| p.id == player_id) {
            if inner.spectators[idx].sources > 1 {
                inner.spectators[idx].sources -= 1;
                return Self::valid(inner);
            }
            inner.spectators.remove(idx);
            if inner.host_id == player_id {
                Self::elect_host(inner);
            }
            return Self::valid(inner);
        }

        if let Some(player) = inner.players.iter_mut().find(|p| p.id == player_id) {
            if player.sources > 1 {
                player.sources -= 1;
                return Self::valid(inner);
            }
            player.sources = 0;
            if inner.phase == RoomPhase::InProgress {
                player.connected = false;
            } else {
                inner.players.retain(|p| p.id != player_id);
            }
        } else {
            return Self::valid(inner);
        }

        let valid = Self::valid(inner);
        if inner.host_id == player_id && valid {
            Self::elect_host(inner);
        }

        // A round with nobody left to answer ends early.
        if inner.phase == RoomPhase::InProgress && !inner.players.iter().any(|p| p.connected) {
            Self::to_summary(inner);
        }

        if inner.phase != RoomPhase::InProgress && !inner.spectators.is_empty() {
            let cap = inner.rules.max_players;
            Self::promote_spectators(inner, cap);
        }

        valid
    }

    /// First connected player, else first spectator.
    fn elect_host(inner: &mut RoomInner) {
        if let Some(player) = inner.players.iter().find(|p| p.connected) {
            inner.host_id = player.id.clone();
        } else if let Some(spectator) = inner.spectators.first() {
            inner.host_id = spectator.id.clone();
        }
    }

    fn to_summary(inner: &mut RoomInner) {
        inner.progress = None;
        inner.phase = RoomPhase::Summary;
    }

    /// Host-only. Builds a fresh deck, deals every player a card, and opens
    /// the first round.
    pub fn start_game(&self, player_id: &str) -> StartOutcome {
        let inner = &mut *self.inner.lock().unwrap();

        if inner.host_id != player_id {
            return StartOutcome::NotHost;
        }
        let connected = inner.players.iter().filter(|p| p.connected).count();
        if inner.rules.game_type == GameType::HotPotato && connected < 2 {
            return StartOutcome::NotEnoughPlayers;
        }
        if inner.rules.card_count as usize <= inner.players.len() {
            return StartOutcome::DeckTooSmall;
        }

        let progress = Arc::new(GameProgress::new(&inner.rules));
        for player in &mut inner.players {
            player.current_card = progress.deal();
        }
        progress.open_round();
        inner.progress = Some(progress);
        inner.phase = RoomPhase::InProgress;
        StartOutcome::Started
    }

    /// Rename a roster or spectator entry. Returns false if the id is
    /// unknown to this room.
    pub fn update_player(&self, data: PlayerData) -> bool {
        let inner = &mut *self.inner.lock().unwrap();
        match inner
            .players
            .iter_mut()
            .chain(inner.spectators.iter_mut())
            .find(|p| p.id == data.id)
        {
            Some(player) => {
                player.username = data.username;
                true
            },
            None => false,
        }
    }

    /// Replace the rules. Rejected mid-game. Shrinking the player cap spills
    /// the newest players into the spectator queue; growing it promotes
    /// waiting spectators in join order.
    pub fn update_rules(&self, rules: GameRules) -> RulesUpdate {
        let inner = &mut *self.inner.lock().unwrap();
        if inner.phase == RoomPhase::InProgress {
            return RulesUpdate::RejectedInProgress;
        }

        if rules.max_players < inner.rules.max_players {
            Self::demote_players(inner, rules.max_players);
        } else if rules.max_players > inner.rules.max_players {
            Self::promote_spectators(inner, rules.max_players);
        }
        inner.rules = rules;
        RulesUpdate::Updated
    }

    fn demote_players(inner: &mut RoomInner, cap: u32) {
        if inner.players.len() as u32 > cap {
            let overflow = inner.players.split_off(cap as usize);
            inner.spectators.extend(overflow);
        }
    }

    fn promote_spectators(inner: &mut RoomInner, cap: u32) {
        let free = (cap as usize).saturating_sub(inner.players.len());
        let take = free.min(inner.spectators.len());
        inner.players.extend(inner.spectators.drain(..take));
    }

    /// Submit an answer for the open round. A win immediately transfers the
    /// master card to the winner and bumps their score.
    pub async fn check_result(&self, symbol: SymbolId, player_id: &str) -> MatchOutcome {
        let progress = {
            let inner = self.inner.lock().unwrap();
            match inner.progress.as_ref() {
                Some(progress) => Arc::clone(progress),
                None => return MatchOutcome::Late,
            }
        };

        let outcome = progress.check_symbol(symbol, player_id).await;
        if let MatchOutcome::Won(master) = &outcome {
            let inner = &mut *self.inner.lock().unwrap();
            if let Some(winner) = inner.players.iter_mut().find(|p| p.id == player_id) {
                winner.award_point(master.clone());
            }
        }
        outcome
    }

    /// Wait out in-flight answers, then expose the next master card. Moves
    /// the room to the summary screen when the deck is spent.
    pub async fn continue_round(&self) -> ContinueOutcome {
        let progress = {
            let inner = self.inner.lock().unwrap();
            match inner.progress.as_ref() {
                Some(progress) => Arc::clone(progress),
                None => return ContinueOutcome::NotStarted,
            }
        };

        progress.await_answers().await;
        if progress.open_round() {
            ContinueOutcome::Continued
        } else {
            let inner = &mut *self.inner.lock().unwrap();
            Self::to_summary(inner);
            ContinueOutcome::RoundsExhausted
        }
    }

    /// Host-only. Back to the lobby: disconnected players are dropped,
    /// scores and cards cleared, waiting spectators seated.
    pub fn end_game(&self, player_id: &str) -> bool {
        let inner = &mut *self.inner.lock().unwrap();
        if inner.host_id != player_id {
            return false;
        }

        inner.progress = None;
        inner.phase = RoomPhase::Lobby;
        inner.players.retain(|p| p.connected);
        for player in &mut inner.players {
            player.reset();
        }
        let cap = inner.rules.max_players;
        Self::promote_spectators(inner, cap);

        // The host may have been a promoted spectator; make sure the role
        // still points at someone present.
        let host_present = inner
            .players
            .iter()
            .chain(inner.spectators.iter())
            .any(|p| p.id == inner.host_id);
        if !host_present {
            Self::elect_host(inner);
        }
        true
    }

    /// Pure read-only projection for the REST collaborator.
    pub fn snapshot(&self) -> RoomSnapshot {
        let inner = self.inner.lock().unwrap();
        RoomSnapshot {
            id: self.id.clone(),
            players: inner.players.iter().map(Player::snapshot).collect(),
            spectators: inner.spectators.iter().map(Player::snapshot).collect(),
            current_card: inner.progress.as_ref().and_then(|p| p.current_card()),
            in_progress: inner.phase == RoomPhase::InProgress,
            in_summary: inner.phase == RoomPhase::Summary,
            game_rules: inner.rules.clone(),
            host_id: inner.host_id.clone(),
        }
    }
}
