use std::sync::Arc;

use crate::config::ServerConfig;
use crate::connections::{ConnectionRegistry, GroupRegistry};
use crate::room_manager::RoomManager;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomManager>,
    pub connections: Arc<ConnectionRegistry>,
    pub groups: Arc<GroupRegistry>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: Arc::new(RoomManager::new()),
            connections: Arc::new(ConnectionRegistry::new()),
            groups: Arc::new(GroupRegistry::new()),
            config: Arc::new(config),
        }
    }
}
