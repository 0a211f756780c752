use serde::{Deserialize, Serialize};

use crate::card::{Card, SymbolId};
use crate::player::{PlayerData, PlayerSnapshot};
use crate::rules::GameRules;

/// The closed set of remote calls a browser may invoke on the hub. Player
/// and rules payloads arrive as JSON-encoded strings inside the envelope,
/// mirroring what the browser client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    CreateRoom {
        host: PlayerData,
        rules: GameRules,
        room_id: Option<String>,
    },
    JoinRoom {
        player: PlayerData,
        room_id: String,
    },
    UpdatePlayerData {
        player: PlayerData,
        room_id: String,
    },
    UpdateGameRules {
        rules: GameRules,
        room_id: String,
    },
    CheckResult {
        symbol: SymbolId,
        room_id: String,
        player_id: String,
    },
    ContinueRound {
        room_id: String,
    },
    /// Ask the server to re-broadcast `Update` to the room.
    SendUpdateCommand {
        room_id: String,
    },
    StartGame,
    EndGame,
    LeaveRoom,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "CreateRoom",
            Self::JoinRoom { .. } => "JoinRoom",
            Self::UpdatePlayerData { .. } => "UpdatePlayerData",
            Self::UpdateGameRules { .. } => "UpdateGameRules",
            Self::CheckResult { .. } => "CheckResult",
            Self::ContinueRound { .. } => "ContinueRound",
            Self::SendUpdateCommand { .. } => "SendUpdateCommand",
            Self::StartGame => "StartGame",
            Self::EndGame => "EndGame",
            Self::LeaveRoom => "LeaveRoom",
        }
    }
}

/// Typed failure reported back to the originating connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    GameNotStarted,
    InvalidData,
    InvalidUserData,
    NotFound,
    NotAHost,
    RoomIdInUse,
}

/// Verdict on a submitted answer. `Late` is a first-class outcome, not an
/// error: the round was already claimed when the answer arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerVerdict {
    Valid,
    Invalid,
    Late,
}

/// Payload of a `WebSocketResponse` reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerReply {
    #[serde(rename_all = "camelCase")]
    RoomCode { room_id: String },
    Answer { answer: AnswerVerdict },
    Error { error: ErrorKind },
}

/// Broadcast signals sent to a room's whole group as bare text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Roster, rules or phase changed; clients re-fetch the room snapshot.
    Update,
    /// A new master card is exposed; clients refresh scores and cards.
    Score,
    /// The open round was claimed; clients block further answers.
    Suspend,
    /// The game started; clients enter play mode.
    Started,
}

impl Signal {
    pub fn as_frame(&self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::Score => "Score",
            Self::Suspend => "Suspend",
            Self::Started => "Started",
        }
    }
}

/// Read-only projection of a room, served by `GET /api/room/{roomId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    pub players: Vec<PlayerSnapshot>,
    pub spectators: Vec<PlayerSnapshot>,
    pub current_card: Option<Card>,
    pub in_progress: bool,
    pub in_summary: bool,
    pub game_rules: GameRules,
    pub host_id: String,
}
