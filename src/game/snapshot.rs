//! Snapshot building for match-wide messages

use uuid::Uuid;

use crate::session::SessionDirectory;
use crate::ws::protocol::{PlayerSnapshot, ServerMsg};

use super::Match;

/// Builds the full match + roster messages
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Player snapshots for everyone on the match's rosters
    pub fn roster(directory: &SessionDirectory, game: &Match) -> Vec<PlayerSnapshot> {
        game.members()
            .filter_map(|id| directory.player_of(id))
            .map(|player| player.snapshot())
            .collect()
    }

    /// `game:start` for a match
    pub fn game_start(directory: &SessionDirectory, match_id: Uuid) -> Option<ServerMsg> {
        let game = directory.get_match(match_id)?;
        Some(ServerMsg::GameStart {
            game: game.snapshot(),
            players: Self::roster(directory, game),
        })
    }

    /// `game:update` for a match
    pub fn game_update(directory: &SessionDirectory, match_id: Uuid) -> Option<ServerMsg> {
        let game = directory.get_match(match_id)?;
        Some(ServerMsg::GameUpdate {
            game: game.snapshot(),
            players: Self::roster(directory, game),
        })
    }

    /// `game:end` carrying the final match state
    pub fn game_end(game: &Match) -> ServerMsg {
        ServerMsg::GameEnd {
            game: game.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::MatchStatus;

    #[test]
    fn game_start_carries_roster_snapshots() {
        let mut directory = SessionDirectory::new();
        let [a, b] = [Uuid::new_v4(), Uuid::new_v4()];
        directory.register(a, "a".to_string(), true).unwrap();
        directory.register(b, "b".to_string(), false).unwrap();
        let match_id = directory.create_match();
        directory.assign(a, match_id).unwrap();
        directory.assign(b, match_id).unwrap();

        let Some(ServerMsg::GameStart { game, players }) =
            SnapshotBuilder::game_start(&directory, match_id)
        else {
            panic!("expected game:start");
        };
        assert_eq!(game.status, MatchStatus::Active);
        assert_eq!(game.teams.humans, vec![a]);
        assert_eq!(game.teams.rogue_ai, vec![b]);
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn snapshot_is_detached_from_live_state() {
        let mut directory = SessionDirectory::new();
        let a = Uuid::new_v4();
        directory.register(a, "a".to_string(), true).unwrap();
        let match_id = directory.create_match();
        directory.assign(a, match_id).unwrap();

        let before = directory.get_match(match_id).unwrap().snapshot();
        directory.player_of_mut(a).unwrap().take_damage(40);
        directory.get_match_mut(match_id).unwrap().add_score(crate::ws::protocol::Team::Humans);

        assert_eq!(before.scores.humans, 0);
        assert!(SnapshotBuilder::game_update(&directory, Uuid::new_v4()).is_none());
    }
}
