//! Test harness: a directory, gateway and scheduler with captured outbound queues

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::{DeferredAction, Scheduler};
use crate::matchmaking::service::Assignment;
use crate::matchmaking::Matchmaker;
use crate::ws::protocol::ServerMsg;

use super::{BroadcastGateway, SessionDirectory};

pub struct Arena {
    pub directory: SessionDirectory,
    pub gateway: BroadcastGateway,
    pub scheduler: Scheduler,
    pub deferred: mpsc::Receiver<DeferredAction>,
    outbound: HashMap<Uuid, mpsc::Receiver<ServerMsg>>,
}

impl Arena {
    pub fn new() -> Self {
        let (scheduler, deferred) = Scheduler::new();
        Self {
            directory: SessionDirectory::new(),
            gateway: BroadcastGateway::new(),
            scheduler,
            deferred,
            outbound: HashMap::new(),
        }
    }

    /// Open an outbound channel without registering a player
    pub fn connect(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(256);
        self.gateway.connect(id, tx);
        self.outbound.insert(id, rx);
        id
    }

    /// Connect and register a player
    pub fn join(&mut self, is_human: bool) -> Uuid {
        let id = self.connect();
        let name = format!("player-{}", self.outbound.len());
        self.directory.register(id, name, is_human).unwrap();
        id
    }

    pub fn matchmake(&mut self) -> Option<Assignment> {
        Matchmaker::try_assign(&mut self.directory, &self.gateway)
    }

    /// Two humans in an active 1v1: (humans side, rogue side, match id).
    /// Outbound queues are drained afterwards.
    pub fn duel(&mut self) -> (Uuid, Uuid, Uuid) {
        let a = self.join(true);
        let b = self.join(true);
        let Some(Assignment::Created { match_id, .. }) = self.matchmake() else {
            panic!("expected a new match");
        };
        self.events(a);
        self.events(b);
        (a, b, match_id)
    }

    /// Everything queued for a connection since the last call
    pub fn events(&mut self, id: Uuid) -> Vec<ServerMsg> {
        let rx = self.outbound.get_mut(&id).expect("connected in this arena");
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            events.push(msg);
        }
        events
    }

    pub fn event_names(&mut self, id: Uuid) -> Vec<&'static str> {
        self.events(id).iter().map(event_name).collect()
    }
}

pub fn event_name(msg: &ServerMsg) -> &'static str {
    match msg {
        ServerMsg::Welcome { .. } => "welcome",
        ServerMsg::PlayerJoin { .. } => "player:join",
        ServerMsg::PlayerLeave { .. } => "player:leave",
        ServerMsg::PlayerMove { .. } => "player:move",
        ServerMsg::PlayerShoot { .. } => "player:shoot",
        ServerMsg::PlayerHit { .. } => "player:hit",
        ServerMsg::PlayerDie { .. } => "player:die",
        ServerMsg::PlayerRespawn { .. } => "player:respawn",
        ServerMsg::GameStart { .. } => "game:start",
        ServerMsg::GameEnd { .. } => "game:end",
        ServerMsg::GameUpdate { .. } => "game:update",
        ServerMsg::Pong { .. } => "pong",
    }
}
