//! Session directory: the single source of truth for who is connected,
//! which match they are in and who is waiting for one.
//!
//! Owned exclusively by the session loop; nothing here locks.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::game::{Match, MatchError, PlayerRecord};
use crate::matchmaking::MatchmakingQueue;
use crate::ws::protocol::Team;

/// Directory errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connection {0} is already registered")]
    DuplicateConnection(Uuid),

    #[error("Unknown connection {0}")]
    UnknownConnection(Uuid),

    #[error("Unknown match {0}")]
    UnknownMatch(Uuid),

    #[error("Connection {0} already belongs to a match")]
    AlreadyAssigned(Uuid),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// What an unregister removed, for the caller to broadcast
#[derive(Debug)]
pub struct Departure {
    pub player: PlayerRecord,
    /// Match the player was on, if any
    pub match_id: Option<Uuid>,
    /// The removal emptied a roster and ended the match
    pub ended_match: bool,
    /// The match was ended and drained, and has been dropped
    pub removed_match: bool,
}

/// Process-wide registry of players and matches
#[derive(Debug, Default)]
pub struct SessionDirectory {
    players: HashMap<Uuid, PlayerRecord>,
    player_matches: HashMap<Uuid, Uuid>,
    matches: HashMap<Uuid, Match>,
    /// Creation order, so matchmaking scans oldest first
    match_order: Vec<Uuid>,
    queue: MatchmakingQueue,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the player record for a connection and queue it for matchmaking
    pub fn register(
        &mut self,
        connection_id: Uuid,
        name: String,
        is_human: bool,
    ) -> Result<&PlayerRecord, SessionError> {
        match self.players.entry(connection_id) {
            Entry::Occupied(_) => Err(SessionError::DuplicateConnection(connection_id)),
            Entry::Vacant(slot) => {
                info!(connection_id = %connection_id, name = %name, is_human, "Player registered");
                self.queue.enqueue(connection_id);
                Ok(slot.insert(PlayerRecord::new(connection_id, name, is_human)))
            }
        }
    }

    /// Remove a connection's player, queue entry and roster slot.
    /// Returns `None` for unknown connections.
    pub fn unregister(&mut self, connection_id: Uuid) -> Option<Departure> {
        let mut player = self.players.remove(&connection_id)?;
        player.cancel_pending();
        self.queue.dequeue(connection_id);

        let match_id = self.player_matches.remove(&connection_id);
        let mut ended_match = false;
        let mut removed_match = false;

        if let Some(match_id) = match_id {
            if let Some(game) = self.matches.get_mut(&match_id) {
                let was_ended = game.is_ended();
                game.remove_player(connection_id);
                ended_match = !was_ended && game.is_ended();
            }
            removed_match = self.collect_if_drained(match_id);
        }

        info!(
            connection_id = %connection_id,
            match_id = ?match_id,
            "Player unregistered"
        );

        Some(Departure {
            player,
            match_id,
            ended_match,
            removed_match,
        })
    }

    /// Drop a match once it has ended and nobody is left on it
    fn collect_if_drained(&mut self, match_id: Uuid) -> bool {
        let drained = self
            .matches
            .get(&match_id)
            .is_some_and(|game| game.is_ended() && game.player_count() == 0);

        if drained {
            self.matches.remove(&match_id);
            self.match_order.retain(|id| *id != match_id);
            info!(match_id = %match_id, "Match removed from directory");
        }
        drained
    }

    /// Open a new, empty match
    pub fn create_match(&mut self) -> Uuid {
        let match_id = Uuid::new_v4();
        self.matches.insert(match_id, Match::new(match_id));
        self.match_order.push(match_id);
        info!(match_id = %match_id, "Created new match");
        match_id
    }

    /// Put a registered, unassigned connection on a match roster
    pub fn assign(&mut self, connection_id: Uuid, match_id: Uuid) -> Result<Team, SessionError> {
        if self.player_matches.contains_key(&connection_id) {
            return Err(SessionError::AlreadyAssigned(connection_id));
        }
        let player = self
            .players
            .get_mut(&connection_id)
            .ok_or(SessionError::UnknownConnection(connection_id))?;
        let game = self
            .matches
            .get_mut(&match_id)
            .ok_or(SessionError::UnknownMatch(match_id))?;

        let team = game.add_player(connection_id, player.is_human())?;
        player.team = Some(team);
        self.player_matches.insert(connection_id, match_id);
        Ok(team)
    }

    pub fn player_of(&self, connection_id: Uuid) -> Option<&PlayerRecord> {
        self.players.get(&connection_id)
    }

    pub fn player_of_mut(&mut self, connection_id: Uuid) -> Option<&mut PlayerRecord> {
        self.players.get_mut(&connection_id)
    }

    pub fn match_id_of(&self, connection_id: Uuid) -> Option<Uuid> {
        self.player_matches.get(&connection_id).copied()
    }

    pub fn match_of(&self, connection_id: Uuid) -> Option<&Match> {
        self.match_id_of(connection_id)
            .and_then(|match_id| self.matches.get(&match_id))
    }

    pub fn get_match(&self, match_id: Uuid) -> Option<&Match> {
        self.matches.get(&match_id)
    }

    pub fn get_match_mut(&mut self, match_id: Uuid) -> Option<&mut Match> {
        self.matches.get_mut(&match_id)
    }

    /// Matches in creation order
    pub fn matches(&self) -> impl Iterator<Item = &Match> + '_ {
        self.match_order
            .iter()
            .filter_map(|match_id| self.matches.get(match_id))
    }

    /// Connection ids currently on a match's rosters
    pub fn members(&self, match_id: Uuid) -> Vec<Uuid> {
        self.matches
            .get(&match_id)
            .map(|game| game.members().collect())
            .unwrap_or_default()
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MatchmakingQueue {
        &mut self.queue
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}
