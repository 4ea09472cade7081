//! Matchmaking pass - places queued connections into matches
//!
//! Runs after every join and leave. Existing matches that are short a player
//! are filled before a new match is opened, one assignment per pass.

use tracing::{info, warn};
use uuid::Uuid;

use crate::game::snapshot::SnapshotBuilder;
use crate::game::MatchError;
use crate::session::{BroadcastGateway, SessionDirectory, SessionError};
use crate::ws::protocol::{MatchStatus, ServerMsg, Team};

/// Players placed in a new match at creation
const NEW_MATCH_SIZE: usize = 2;

/// Result of a matchmaking pass that placed someone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// One queued connection joined an existing match
    Joined {
        connection_id: Uuid,
        match_id: Uuid,
        team: Team,
    },
    /// A new match was opened with these connections
    Created { match_id: Uuid, players: Vec<Uuid> },
}

/// Matchmaking rules
pub struct Matchmaker;

impl Matchmaker {
    /// Run one matchmaking pass. Does nothing with fewer than two queued.
    pub fn try_assign(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
    ) -> Option<Assignment> {
        if directory.queue().len() < 2 {
            return None;
        }

        if let Some(assignment) = Self::fill_existing(directory, gateway) {
            return Some(assignment);
        }
        Self::open_match(directory, gateway)
    }

    /// Place the head of the queue into the first open match that is short a player
    fn fill_existing(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
    ) -> Option<Assignment> {
        let connection_id = directory.queue().front()?.connection_id;
        let candidates: Vec<Uuid> = directory
            .matches()
            .filter(|game| {
                matches!(game.status(), MatchStatus::Waiting | MatchStatus::Active)
                    && game.has_room()
            })
            .map(|game| game.id)
            .collect();

        for match_id in candidates {
            let team = match directory.assign(connection_id, match_id) {
                Ok(team) => team,
                Err(SessionError::Match(MatchError::TeamFull(_))) => continue,
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "Cannot place queued player");
                    return None;
                }
            };

            if let Some(queued) = directory.queue_mut().pop_front() {
                info!(
                    connection_id = %connection_id,
                    match_id = %match_id,
                    team = ?team,
                    waited_ms = queued.wait_time().as_millis() as u64,
                    "Player joined existing match"
                );
            }

            if let Some(player) = directory.player_of(connection_id) {
                let joined = ServerMsg::PlayerJoin {
                    player: player.snapshot(),
                };
                gateway.to_match(directory, match_id, &joined);
            }
            if let Some(start) = SnapshotBuilder::game_start(directory, match_id) {
                gateway.to_connection(connection_id, start);
            }

            return Some(Assignment::Joined {
                connection_id,
                match_id,
                team,
            });
        }

        None
    }

    /// Open a new match for the next queued connections
    fn open_match(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
    ) -> Option<Assignment> {
        if directory.queue().len() < NEW_MATCH_SIZE {
            return None;
        }

        let match_id = directory.create_match();
        let mut players = Vec::with_capacity(NEW_MATCH_SIZE);

        for _ in 0..NEW_MATCH_SIZE {
            let Some(queued) = directory.queue_mut().pop_front() else {
                break;
            };
            match directory.assign(queued.connection_id, match_id) {
                Ok(_) => players.push(queued.connection_id),
                Err(e) => {
                    warn!(
                        connection_id = %queued.connection_id,
                        error = %e,
                        "Cannot place queued player in new match"
                    );
                    directory.queue_mut().requeue_front(queued);
                    break;
                }
            }
        }

        if let Some(start) = SnapshotBuilder::game_start(directory, match_id) {
            gateway.to_match(directory, match_id, &start);
        }

        info!(
            match_id = %match_id,
            player_count = players.len(),
            "Match opened"
        );

        Some(Assignment::Created { match_id, players })
    }
}
