//! Session loop - the single writer over the session directory
//!
//! Connections post [`Command`]s through a [`ServerHandle`]; the loop applies
//! them one at a time together with deferred reload/respawn completions and
//! the periodic `game:update` tick.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::snapshot::SnapshotBuilder;
use crate::game::{CombatResolver, DeferredAction, Scheduler};
use crate::matchmaking::Matchmaker;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::{BroadcastGateway, SessionDirectory};

/// Inbound command queue capacity
const COMMAND_BUFFER: usize = 1024;

/// Work for the session loop
#[derive(Debug)]
pub enum Command {
    /// A socket opened; attach its outbound channel
    Connect {
        connection_id: Uuid,
        outbound: mpsc::Sender<ServerMsg>,
    },
    /// A parsed client message
    Intent {
        connection_id: Uuid,
        msg: ClientMsg,
        received_at: u64,
    },
    /// The socket closed
    Disconnect { connection_id: Uuid, reason: String },
    /// Counters for the health endpoint
    Stats { reply: oneshot::Sender<ServerStats> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub active_matches: usize,
    pub active_players: usize,
    pub queue_size: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("Session loop has stopped")]
pub struct ServerClosed;

/// Cloneable sender side of the session loop
#[derive(Clone, Debug)]
pub struct ServerHandle {
    tx: mpsc::Sender<Command>,
}

impl ServerHandle {
    pub async fn send(&self, command: Command) -> Result<(), ServerClosed> {
        self.tx.send(command).await.map_err(|_| ServerClosed)
    }

    pub async fn stats(&self) -> Result<ServerStats, ServerClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| ServerClosed)
    }
}

/// Owns every piece of session state
pub struct GameServer {
    directory: SessionDirectory,
    gateway: BroadcastGateway,
    scheduler: Scheduler,
    deferred: mpsc::Receiver<DeferredAction>,
    commands: mpsc::Receiver<Command>,
    respawn_delay: Duration,
    game_update_interval: Duration,
}

impl GameServer {
    pub fn new(config: &Config) -> (Self, ServerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (scheduler, deferred) = Scheduler::new();

        let server = Self {
            directory: SessionDirectory::new(),
            gateway: BroadcastGateway::new(),
            scheduler,
            deferred,
            commands,
            respawn_delay: config.respawn_delay,
            game_update_interval: config.game_update_interval,
        };
        (server, ServerHandle { tx })
    }

    /// Run until every [`ServerHandle`] is dropped
    pub async fn run(mut self) {
        let mut updates = tokio::time::interval(self.game_update_interval);
        updates.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Session loop started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(action) = self.deferred.recv() => self.handle_deferred(action),
                _ = updates.tick() => self.tick(),
            }
        }
        info!("Session loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                connection_id,
                outbound,
            } => {
                debug!(connection_id = %connection_id, "Connection attached");
                self.gateway.connect(connection_id, outbound);
            }
            Command::Intent {
                connection_id,
                msg,
                received_at,
            } => self.handle_intent(connection_id, msg, received_at),
            Command::Disconnect {
                connection_id,
                reason,
            } => {
                self.leave(connection_id, reason);
                self.gateway.disconnect(connection_id);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn handle_intent(&mut self, connection_id: Uuid, msg: ClientMsg, received_at: u64) {
        match msg {
            ClientMsg::Join { name, is_human } => self.join(connection_id, name, is_human),
            ClientMsg::Move {
                position,
                rotation,
                velocity,
            } => {
                CombatResolver::handle_move(
                    &mut self.directory,
                    &self.gateway,
                    connection_id,
                    position,
                    rotation,
                    velocity,
                );
            }
            ClientMsg::Shoot { direction } => {
                CombatResolver::handle_shoot(
                    &mut self.directory,
                    &self.gateway,
                    &self.scheduler,
                    connection_id,
                    direction,
                    received_at,
                );
            }
            ClientMsg::Hit { target_id } => {
                CombatResolver::handle_hit(
                    &mut self.directory,
                    &self.gateway,
                    &self.scheduler,
                    connection_id,
                    target_id,
                    self.respawn_delay,
                );
            }
            ClientMsg::RespawnRequest => {
                CombatResolver::handle_respawn_request(
                    &self.directory,
                    &self.gateway,
                    connection_id,
                );
            }
            ClientMsg::Leave { reason } => {
                self.leave(connection_id, reason.unwrap_or_else(|| "left".to_string()));
            }
            ClientMsg::SwitchWeapon { index } => {
                CombatResolver::handle_switch_weapon(&mut self.directory, connection_id, index);
            }
            ClientMsg::Reload => {
                CombatResolver::handle_reload(&mut self.directory, &self.scheduler, connection_id);
            }
            ClientMsg::Ping { t } => {
                self.gateway.to_connection(connection_id, ServerMsg::Pong { t });
            }
        }
    }

    fn join(&mut self, connection_id: Uuid, name: String, is_human: bool) {
        // A finished match keeps its roster until someone leaves; joining
        // again releases the old slot and starts a fresh record.
        if self
            .directory
            .match_of(connection_id)
            .is_some_and(|game| game.is_ended())
        {
            self.leave(connection_id, "rejoin".to_string());
        }

        if let Err(e) = self.directory.register(connection_id, name, is_human) {
            warn!(connection_id = %connection_id, error = %e, "Join rejected");
            return;
        }
        Matchmaker::try_assign(&mut self.directory, &self.gateway);
    }

    /// Unregister a player and tell whoever is left in its match
    fn leave(&mut self, connection_id: Uuid, reason: String) {
        let Some(departure) = self.directory.unregister(connection_id) else {
            return;
        };

        if let Some(match_id) = departure.match_id.filter(|_| !departure.removed_match) {
            let msg = ServerMsg::PlayerLeave {
                player_id: connection_id,
                reason,
            };
            self.gateway.to_match(&self.directory, match_id, &msg);

            if departure.ended_match {
                if let Some(game) = self.directory.get_match(match_id) {
                    let end = SnapshotBuilder::game_end(game);
                    self.gateway.to_match(&self.directory, match_id, &end);
                }
            }
        }

        Matchmaker::try_assign(&mut self.directory, &self.gateway);
    }

    fn handle_deferred(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::ReloadComplete {
                connection_id,
                weapon_index,
                task_id,
            } => {
                CombatResolver::complete_reload(
                    &mut self.directory,
                    &self.gateway,
                    connection_id,
                    weapon_index,
                    task_id,
                );
            }
            DeferredAction::Respawn {
                connection_id,
                task_id,
            } => {
                CombatResolver::complete_respawn(
                    &mut self.directory,
                    &self.gateway,
                    connection_id,
                    task_id,
                );
            }
        }
    }

    /// Periodic `game:update` for every running match, plus a matchmaking pass
    /// for anyone still queued.
    fn tick(&mut self) {
        let running: Vec<Uuid> = self
            .directory
            .matches()
            .filter(|game| !game.is_ended())
            .map(|game| game.id)
            .collect();

        for match_id in running {
            if let Some(update) = SnapshotBuilder::game_update(&self.directory, match_id) {
                self.gateway.to_match(&self.directory, match_id, &update);
            }
        }

        Matchmaker::try_assign(&mut self.directory, &self.gateway);
    }

    fn stats(&self) -> ServerStats {
        ServerStats {
            active_matches: self
                .directory
                .matches()
                .filter(|game| !game.is_ended())
                .count(),
            active_players: self.directory.player_count(),
            queue_size: self.directory.queue().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::event_name;
    use crate::ws::protocol::{MatchStatus, Team};

    struct Client {
        id: Uuid,
        rx: mpsc::Receiver<ServerMsg>,
    }

    impl Client {
        fn names(&mut self) -> Vec<&'static str> {
            let mut names = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                names.push(event_name(&msg));
            }
            names
        }
    }

    fn server() -> GameServer {
        GameServer::new(&Config::default()).0
    }

    fn connect(server: &mut GameServer) -> Client {
        let id = Uuid::new_v4();
        let (outbound, rx) = mpsc::channel(256);
        server.handle_command(Command::Connect {
            connection_id: id,
            outbound,
        });
        Client { id, rx }
    }

    fn send(server: &mut GameServer, client: &Client, msg: ClientMsg) {
        server.handle_command(Command::Intent {
            connection_id: client.id,
            msg,
            received_at: 0,
        });
    }

    fn join(server: &mut GameServer, client: &Client, name: &str) {
        send(
            server,
            client,
            ClientMsg::Join {
                name: name.to_string(),
                is_human: true,
            },
        );
    }

    #[test]
    fn two_joins_start_a_match() {
        let mut server = server();
        let mut a = connect(&mut server);
        let mut b = connect(&mut server);

        join(&mut server, &a, "a");
        assert!(a.names().is_empty(), "waiting for an opponent");
        join(&mut server, &b, "b");

        let game = server.directory.match_of(a.id).unwrap();
        assert_eq!(game.status(), MatchStatus::Active);
        assert_eq!(game.roster(Team::Humans), &[a.id]);
        assert_eq!(game.roster(Team::RogueAi), &[b.id]);
        assert_eq!(a.names(), vec!["game:start"]);
        assert_eq!(b.names(), vec!["game:start"]);
    }

    #[test]
    fn duplicate_join_is_ignored() {
        let mut server = server();
        let a = connect(&mut server);
        join(&mut server, &a, "first");
        join(&mut server, &a, "second");

        assert_eq!(server.directory.player_of(a.id).unwrap().name, "first");
        assert_eq!(server.directory.queue().len(), 1);
    }

    #[test]
    fn disconnect_notifies_the_match_and_ends_it() {
        let mut server = server();
        let mut a = connect(&mut server);
        let b = connect(&mut server);
        join(&mut server, &a, "a");
        join(&mut server, &b, "b");
        a.names();
        let match_id = server.directory.match_id_of(a.id).unwrap();

        server.handle_command(Command::Disconnect {
            connection_id: b.id,
            reason: "closed".to_string(),
        });

        assert_eq!(a.names(), vec!["player:leave", "game:end"]);
        assert!(server.directory.player_of(b.id).is_none());
        assert_eq!(server.gateway.connection_count(), 1);
        assert_eq!(
            server.directory.get_match(match_id).unwrap().status(),
            MatchStatus::Ended
        );

        send(&mut server, &a, ClientMsg::Leave { reason: None });
        assert!(server.directory.get_match(match_id).is_none(), "drained match collected");
        assert_eq!(server.gateway.connection_count(), 1, "leave keeps the socket");
    }

    #[test]
    fn leaving_player_can_rejoin_on_the_same_socket() {
        let mut server = server();
        let a = connect(&mut server);
        join(&mut server, &a, "a");
        send(&mut server, &a, ClientMsg::Leave { reason: None });
        assert!(server.directory.player_of(a.id).is_none());

        join(&mut server, &a, "again");
        assert_eq!(server.directory.player_of(a.id).unwrap().name, "again");
    }

    #[test]
    fn ping_is_answered_without_joining() {
        let mut server = server();
        let mut a = connect(&mut server);
        send(&mut server, &a, ClientMsg::Ping { t: 42 });
        assert!(matches!(a.rx.try_recv(), Ok(ServerMsg::Pong { t: 42 })));
    }

    #[test]
    fn players_of_an_ended_match_can_join_again() {
        let mut server = server();
        let mut a = connect(&mut server);
        let mut b = connect(&mut server);
        join(&mut server, &a, "a");
        join(&mut server, &b, "b");
        let old_match = server.directory.match_id_of(a.id).unwrap();
        let game = server.directory.get_match_mut(old_match).unwrap();
        for _ in 0..game.kills_to_win() {
            game.add_score(Team::Humans);
        }
        assert!(game.is_ended());
        a.names();
        b.names();

        join(&mut server, &b, "b again");
        assert_eq!(server.directory.player_of(b.id).unwrap().name, "b again");
        assert!(server.directory.queue().contains(b.id));
        assert_eq!(a.names(), vec!["player:leave"]);

        join(&mut server, &a, "a again");
        assert!(server.directory.get_match(old_match).is_none(), "drained match collected");
        let new_match = server.directory.match_id_of(a.id).unwrap();
        assert_ne!(new_match, old_match);
        assert_eq!(server.directory.match_id_of(b.id), Some(new_match));
        assert_eq!(a.names(), vec!["game:start"]);
        assert_eq!(b.names(), vec!["game:start"]);
    }

    #[test]
    fn join_while_in_a_running_match_is_still_rejected() {
        let mut server = server();
        let a = connect(&mut server);
        let b = connect(&mut server);
        join(&mut server, &a, "a");
        join(&mut server, &b, "b");
        let match_id = server.directory.match_id_of(a.id).unwrap();

        join(&mut server, &a, "a again");
        assert_eq!(server.directory.player_of(a.id).unwrap().name, "a");
        assert_eq!(server.directory.match_id_of(a.id), Some(match_id));
    }

    #[test]
    fn tick_updates_running_matches_only() {
        let mut server = server();
        let mut clients: Vec<Client> = (0..4).map(|_| connect(&mut server)).collect();
        for (i, client) in clients.iter().enumerate() {
            join(&mut server, client, &format!("p{i}"));
        }
        let ended = server.directory.match_id_of(clients[0].id).unwrap();
        let running = server.directory.match_id_of(clients[2].id).unwrap();
        assert_ne!(ended, running);

        let game = server.directory.get_match_mut(ended).unwrap();
        for _ in 0..game.kills_to_win() {
            game.add_score(Team::RogueAi);
        }
        for client in &mut clients {
            client.names();
        }

        server.tick();

        assert!(clients[0].names().is_empty());
        assert!(clients[1].names().is_empty());
        assert_eq!(clients[2].names(), vec!["game:update"]);
        assert_eq!(clients[3].names(), vec!["game:update"]);
    }

    #[tokio::test(start_paused = true)]
    async fn session_loop_sends_game_update_every_interval() {
        let config = Config::default();
        let interval = config.game_update_interval;
        let (server, handle) = GameServer::new(&config);
        tokio::spawn(server.run());

        let mut clients = Vec::new();
        for name in ["a", "b"] {
            let id = Uuid::new_v4();
            let (outbound, rx) = mpsc::channel(256);
            handle
                .send(Command::Connect {
                    connection_id: id,
                    outbound,
                })
                .await
                .unwrap();
            handle
                .send(Command::Intent {
                    connection_id: id,
                    msg: ClientMsg::Join {
                        name: name.to_string(),
                        is_human: true,
                    },
                    received_at: 0,
                })
                .await
                .unwrap();
            clients.push(Client { id, rx });
        }
        assert_eq!(handle.stats().await.unwrap().active_matches, 1);
        // the interval's immediate first tick may land on either side of the joins
        for client in &mut clients {
            assert!(client.names().contains(&"game:start"));
        }

        tokio::time::sleep(interval + Duration::from_millis(1)).await;
        for client in &mut clients {
            assert_eq!(client.names(), vec!["game:update"]);
        }

        tokio::time::sleep(interval).await;
        for client in &mut clients {
            assert_eq!(client.names(), vec!["game:update"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_cancels_a_pending_respawn() {
        let mut server = server();
        let a = connect(&mut server);
        let b = connect(&mut server);
        join(&mut server, &a, "a");
        join(&mut server, &b, "b");

        for _ in 0..4 {
            send(&mut server, &a, ClientMsg::Hit { target_id: b.id });
        }
        assert!(server.directory.player_of(b.id).unwrap().respawn_pending());

        server.handle_command(Command::Disconnect {
            connection_id: b.id,
            reason: "closed".to_string(),
        });
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(server.deferred.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn session_loop_applies_respawns_and_reports_stats() {
        let (server, handle) = GameServer::new(&Config::default());
        tokio::spawn(server.run());

        let mut clients = Vec::new();
        for name in ["a", "b"] {
            let id = Uuid::new_v4();
            let (outbound, rx) = mpsc::channel(256);
            handle
                .send(Command::Connect {
                    connection_id: id,
                    outbound,
                })
                .await
                .unwrap();
            handle
                .send(Command::Intent {
                    connection_id: id,
                    msg: ClientMsg::Join {
                        name: name.to_string(),
                        is_human: true,
                    },
                    received_at: 0,
                })
                .await
                .unwrap();
            clients.push(Client { id, rx });
        }

        let stats = handle.stats().await.unwrap();
        assert_eq!(
            stats,
            ServerStats {
                active_matches: 1,
                active_players: 2,
                queue_size: 0,
            }
        );

        let (a, b) = (clients[0].id, clients[1].id);
        for _ in 0..4 {
            handle
                .send(Command::Intent {
                    connection_id: a,
                    msg: ClientMsg::Hit { target_id: b },
                    received_at: 0,
                })
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_secs(6)).await;

        let names: Vec<&str> = clients[1]
            .names()
            .into_iter()
            .filter(|name| *name != "game:update")
            .collect();
        assert_eq!(
            names,
            vec![
                "game:start",
                "player:hit",
                "player:hit",
                "player:hit",
                "player:hit",
                "player:die",
                "player:respawn",
            ]
        );
    }
}
