//! Process-wide room directory.
//!
//! Room creation and removal are serialized through a fairness queue keyed
//! by the acting connection (or the room id for teardown), nested inside a
//! reader/writer guard over the room map: lookups run concurrently, map
//! mutation is exclusive. Each room's own state is guarded by the room, so
//! no operation here ever holds one room's lock while touching another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use glyphmatch_core::card::SymbolId;
use glyphmatch_core::net::messages::RoomSnapshot;
use glyphmatch_core::player::{Player, PlayerData};
use glyphmatch_core::rules::GameRules;

use crate::fair_queue::FairQueue;
use crate::progress::MatchOutcome;
use crate::room::{
    ContinueOutcome, MAX_ROOM_ID_LEN, Room, RulesUpdate, StartOutcome, generate_room_id,
};

/// Which room and player a connection is acting for.
#[derive(Debug, Clone)]
struct SessionRef {
    room_id: String,
    player_id: String,
    /// Whether this connection brought the room into existence.
    created: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CreateRoomError {
    IdInUse,
}

impl std::fmt::Display for CreateRoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdInUse => write!(f, "room id already in use"),
        }
    }
}

impl std::error::Error for CreateRoomError {}

/// How a join request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomJoin {
    /// Joined an existing room; `notify` is false for fused reconnects.
    Joined { room_id: String, notify: bool },
    /// The id was unknown, so the joiner now hosts a fresh room.
    Created { room_id: String },
}

/// What happened to the room a connection departed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The room lives on; peers should be told.
    Left { room_id: String },
    /// The departure invalidated the room and it was removed.
    RoomRemoved { room_id: String },
    /// The connection was not inside any room.
    NotTracked,
}

pub struct RoomManager {
    /// Serializes room creation/removal so a teardown cannot race a join
    /// that resurrects the same id.
    registry_queue: FairQueue,
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    connections: Mutex<HashMap<Uuid, SessionRef>>,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            registry_queue: FairQueue::new(),
            rooms: RwLock::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn clamp_room_id(id: &str) -> String {
        id.chars().take(MAX_ROOM_ID_LEN).collect()
    }

    fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().unwrap().get(room_id).cloned()
    }

    fn session(&self, connection_id: Uuid) -> Option<(String, String)> {
        self.connections
            .lock()
            .unwrap()
            .get(&connection_id)
            .map(|s| (s.room_id.clone(), s.player_id.clone()))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }

    /// Create a room, optionally under a caller-chosen id. Fails if that id
    /// is already live. A connection hosts at most one room: creating a new
    /// one evicts whichever room the connection previously created.
    pub async fn create_room(
        &self,
        rules: GameRules,
        host: Player,
        connection_id: Uuid,
        requested_id: Option<String>,
    ) -> Result<String, CreateRoomError> {
        let requested = requested_id.map(|id| Self::clamp_room_id(&id));
        self.registry_queue
            .run(&connection_id.to_string(), || {
                let mut rooms = self.rooms.write().unwrap();
                let id = match requested {
                    Some(id) => {
                        if rooms.contains_key(&id) {
                            return Err(CreateRoomError::IdInUse);
                        }
                        id
                    },
                    None => loop {
                        let id = generate_room_id();
                        if !rooms.contains_key(&id) {
                            break id;
                        }
                    },
                };

                let mut connections = self.connections.lock().unwrap();
                if let Some(previous) = connections.get(&connection_id)
                    && previous.created
                {
                    rooms.remove(&previous.room_id);
                    tracing::info!(
                        room_id = %previous.room_id,
                        "Evicted creator's previous room"
                    );
                }
                connections.insert(
                    connection_id,
                    SessionRef {
                        room_id: id.clone(),
                        player_id: host.id.clone(),
                        created: true,
                    },
                );
                rooms.insert(id.clone(), Arc::new(Room::new(host, Some(id.clone()), Some(rules))));
                tracing::info!(room_id = %id, "Room created");
                Ok(id)
            })
            .await
    }

    /// Join a room by id; an unknown id creates the room with the joiner as
    /// host, so a typed link always leads somewhere.
    pub async fn join_room(
        &self,
        player: Player,
        room_id: &str,
        connection_id: Uuid,
    ) -> RoomJoin {
        let id = Self::clamp_room_id(room_id);
        self.registry_queue
            .run(&connection_id.to_string(), || {
                let player_id = player.id.clone();
                {
                    let rooms = self.rooms.read().unwrap();
                    if let Some(room) = rooms.get(&id) {
                        let notify = room.join(player);
                        self.connections.lock().unwrap().insert(
                            connection_id,
                            SessionRef {
                                room_id: id.clone(),
                                player_id,
                                created: false,
                            },
                        );
                        return RoomJoin::Joined {
                            room_id: id.clone(),
                            notify,
                        };
                    }
                }

                let mut rooms = self.rooms.write().unwrap();
                self.connections.lock().unwrap().insert(
                    connection_id,
                    SessionRef {
                        room_id: id.clone(),
                        player_id,
                        created: true,
                    },
                );
                rooms.insert(id.clone(), Arc::new(Room::new(player, Some(id.clone()), None)));
                tracing::info!(room_id = %id, "Room created by first join");
                RoomJoin::Created {
                    room_id: id.clone(),
                }
            })
            .await
    }

    /// Rename a player. False if the room or player is unknown.
    pub fn update_player(&self, data: PlayerData, room_id: &str) -> bool {
        match self.room(room_id) {
            Some(room) => room.update_player(data),
            None => false,
        }
    }

    pub fn update_rules(&self, rules: GameRules, room_id: &str) -> Option<RulesUpdate> {
        self.room(room_id).map(|room| room.update_rules(rules))
    }

    pub async fn check_result(
        &self,
        symbol: SymbolId,
        room_id: &str,
        player_id: &str,
    ) -> Option<MatchOutcome> {
        let room = self.room(room_id)?;
        Some(room.check_result(symbol, player_id).await)
    }

    pub async fn continue_round(&self, room_id: &str) -> Option<ContinueOutcome> {
        let room = self.room(room_id)?;
        Some(room.continue_round().await)
    }

    /// Start the game in the room this connection belongs to.
    pub fn start_game(&self, connection_id: Uuid) -> Option<(String, StartOutcome)> {
        let (room_id, player_id) = self.session(connection_id)?;
        let room = self.room(&room_id)?;
        Some((room_id, room.start_game(&player_id)))
    }

    /// End the game in the room this connection belongs to. The bool is
    /// false when the caller is not the host.
    pub fn end_game(&self, connection_id: Uuid) -> Option<(String, bool)> {
        let (room_id, player_id) = self.session(connection_id)?;
        let room = self.room(&room_id)?;
        Some((room_id, room.end_game(&player_id)))
    }

    /// Detach a connection from its room. When the leave invalidates the
    /// room, removal from the registry is serialized through the fairness
    /// queue keyed by the room id and re-checked under the write section,
    /// so a concurrent rejoin to the same id cannot be deleted from under
    /// itself.
    pub async fn disconnect(&self, connection_id: Uuid) -> Departure {
        let session = self.connections.lock().unwrap().remove(&connection_id);
        let Some(session) = session else {
            return Departure::NotTracked;
        };

        let Some(room) = self.room(&session.room_id) else {
            return Departure::NotTracked;
        };

        if room.leave(&session.player_id) {
            return Departure::Left {
                room_id: session.room_id,
            };
        }

        let room_id = session.room_id;
        self.registry_queue
            .run(&room_id, || {
                let mut rooms = self.rooms.write().unwrap();
                if let Some(room) = rooms.get(&room_id)
                    && !room.is_valid()
                {
                    rooms.remove(&room_id);
                    tracing::info!(room_id = %room_id, "Room removed");
                }
            })
            .await;
        Departure::RoomRemoved { room_id }
    }

    /// Read-only projection for the REST surface.
    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.room(room_id).map(|room| room.snapshot())
    }

    #[cfg(test)]
    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.read().unwrap().contains_key(room_id)
    }
}
