//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::session::{GameServer, ServerHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub server: ServerHandle,
}

impl AppState {
    /// Build the state and the session loop it talks to. The caller spawns
    /// [`GameServer::run`].
    pub fn new(config: Config) -> (Self, GameServer) {
        let (server, handle) = GameServer::new(&config);
        let state = Self {
            config: Arc::new(config),
            server: handle,
        };
        (state, server)
    }
}
