//! Match state: two team rosters, scores and the lifecycle state machine
//!
//! `Waiting -> Active -> Ended`. A match activates once both rosters reach
//! the minimum size and ends when either roster empties or a team reaches
//! the kill threshold. Once ended, further calls are recorded but fire no
//! transition.

use tracing::info;
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{MatchSnapshot, MatchStatus, Team, TeamRosters, TeamScores};

use super::{BASE_KILLS_TO_WIN, MAX_PLAYERS_PER_TEAM, MIN_PLAYERS_PER_TEAM};

/// Roster mutation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Team {0:?} is full")]
    TeamFull(Team),

    #[error("Player is already on a roster in this match")]
    AlreadyInMatch,
}

/// One bounded two-team session
#[derive(Debug)]
pub struct Match {
    pub id: Uuid,
    humans: Vec<Uuid>,
    rogue_ai: Vec<Uuid>,
    scores: TeamScores,
    kills_to_win: u32,
    start_time: u64,
    end_time: Option<u64>,
    status: MatchStatus,
}

impl Match {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            humans: Vec::new(),
            rogue_ai: Vec::new(),
            scores: TeamScores::default(),
            kills_to_win: BASE_KILLS_TO_WIN,
            start_time: unix_millis(),
            end_time: None,
            status: MatchStatus::Waiting,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.status == MatchStatus::Ended
    }

    pub fn kills_to_win(&self) -> u32 {
        self.kills_to_win
    }

    #[cfg(test)]
    pub fn scores(&self) -> TeamScores {
        self.scores
    }

    pub fn roster(&self, team: Team) -> &[Uuid] {
        match team {
            Team::Humans => &self.humans,
            Team::RogueAi => &self.rogue_ai,
        }
    }

    fn roster_mut(&mut self, team: Team) -> &mut Vec<Uuid> {
        match team {
            Team::Humans => &mut self.humans,
            Team::RogueAi => &mut self.rogue_ai,
        }
    }

    pub fn team_of(&self, player_id: Uuid) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|team| self.roster(*team).contains(&player_id))
    }

    pub fn contains(&self, player_id: Uuid) -> bool {
        self.team_of(player_id).is_some()
    }

    /// Members of both rosters, humans first
    pub fn members(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.humans.iter().chain(self.rogue_ai.iter()).copied()
    }

    pub fn player_count(&self) -> usize {
        self.humans.len() + self.rogue_ai.len()
    }

    fn larger_roster(&self) -> usize {
        self.humans.len().max(self.rogue_ai.len())
    }

    /// Whether matchmaking may place another player here: the rosters are
    /// below twice the larger team's size, i.e. one side is short.
    pub fn has_room(&self) -> bool {
        self.status != MatchStatus::Ended
            && self.player_count() < 2 * self.larger_roster()
            && self.player_count() < 2 * MAX_PLAYERS_PER_TEAM
    }

    /// Team-balance rule: non-human players always join the rogue team;
    /// humans join the smaller roster, ties going to the humans.
    pub fn pick_team(&self, is_human: bool) -> Team {
        if !is_human || self.humans.len() > self.rogue_ai.len() {
            Team::RogueAi
        } else {
            Team::Humans
        }
    }

    /// Place a player on the team chosen by [`pick_team`](Self::pick_team)
    pub fn add_player(&mut self, player_id: Uuid, is_human: bool) -> Result<Team, MatchError> {
        if self.contains(player_id) {
            return Err(MatchError::AlreadyInMatch);
        }

        let team = self.pick_team(is_human);
        if self.roster(team).len() >= MAX_PLAYERS_PER_TEAM {
            return Err(MatchError::TeamFull(team));
        }
        self.roster_mut(team).push(player_id);
        self.recompute_kills_to_win();

        if self.status == MatchStatus::Waiting
            && self.humans.len() >= MIN_PLAYERS_PER_TEAM
            && self.rogue_ai.len() >= MIN_PLAYERS_PER_TEAM
        {
            self.status = MatchStatus::Active;
            info!(match_id = %self.id, "Match active");
        }

        Ok(team)
    }

    /// Remove a player from whichever roster holds it. Returns the team it
    /// was on, or `None` if it was not in this match.
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Team> {
        let team = self.team_of(player_id)?;
        self.roster_mut(team).retain(|id| *id != player_id);
        self.recompute_kills_to_win();

        if self.humans.is_empty() || self.rogue_ai.is_empty() {
            self.end();
        }
        Some(team)
    }

    /// Count a kill for `team`, ending the match at the threshold
    pub fn add_score(&mut self, team: Team) {
        match team {
            Team::Humans => self.scores.humans += 1,
            Team::RogueAi => self.scores.rogue_ai += 1,
        }

        if self.scores.get(team) >= self.kills_to_win {
            self.end();
        }
    }

    fn end(&mut self) {
        if self.status == MatchStatus::Ended {
            return;
        }
        self.status = MatchStatus::Ended;
        self.end_time = Some(unix_millis());
        info!(
            match_id = %self.id,
            humans = self.scores.humans,
            rogue_ai = self.scores.rogue_ai,
            "Match ended"
        );
    }

    /// Scale the threshold with the larger roster. While the match runs it
    /// never drops to or below the leading score, so a roster change alone
    /// cannot decide the match; only the next kill is checked against it.
    fn recompute_kills_to_win(&mut self) {
        if self.status == MatchStatus::Ended {
            return;
        }
        let scaled = BASE_KILLS_TO_WIN * self.larger_roster().max(1) as u32;
        let leading = self.scores.humans.max(self.scores.rogue_ai);
        self.kills_to_win = scaled.max(leading + 1);
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            teams: TeamRosters {
                humans: self.humans.clone(),
                rogue_ai: self.rogue_ai.clone(),
            },
            scores: self.scores,
            kills_to_win: self.kills_to_win,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
        }
    }
}
